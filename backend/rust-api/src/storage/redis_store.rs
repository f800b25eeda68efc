use redis::{Client, Connection, RedisError};

use super::{KeyValueStore, StorageError};

const SCAN_BATCH: usize = 100;

/// Redis-backed store. The quota is the server's `maxmemory`: writes it
/// refuses with an OOM reply surface as [`StorageError::QuotaExceeded`].
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    pub fn open(redis_uri: &str) -> Result<Self, StorageError> {
        let client = Client::open(redis_uri).map_err(map_redis_error)?;
        Ok(Self { client })
    }

    fn connection(&self) -> Result<Connection, StorageError> {
        self.client.get_connection().map_err(map_redis_error)
    }
}

fn map_redis_error(err: RedisError) -> StorageError {
    classify_error_message(&err.to_string())
}

fn classify_error_message(message: &str) -> StorageError {
    if message.contains("OOM") || message.contains("maxmemory") {
        StorageError::QuotaExceeded
    } else {
        StorageError::Backend(message.to_string())
    }
}

/// Escapes glob metacharacters so the prefix matches literally in SCAN
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl KeyValueStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.connection()?;
        redis::cmd("GET")
            .arg(key)
            .query::<Option<String>>(&mut conn)
            .map_err(map_redis_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.connection()?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query::<()>(&mut conn)
            .map_err(map_redis_error)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection()?;
        redis::cmd("DEL")
            .arg(key)
            .query::<()>(&mut conn)
            .map_err(map_redis_error)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.connection()?;
        let pattern = format!("{}*", escape_glob(prefix));
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query(&mut conn)
                .map_err(map_redis_error)?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.connection()?;
        redis::cmd("PING")
            .query::<String>(&mut conn)
            .map(|_| ())
            .map_err(map_redis_error)
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}
