//! Persistence of quiz sessions on top of a [`KeyValueStore`].
//!
//! Nothing here returns an error to the caller: quota pressure is handled by
//! evicting the least recently active sessions and retrying once, corrupted
//! records are removed and reported as absent, and any other backend failure
//! is logged and swallowed. Losing saved progress is acceptable; failing an
//! answer submission is not.

use serde_json::Value;
use std::sync::Arc;

use crate::metrics::{track_storage_operation, STORAGE_CORRUPTIONS_TOTAL, STORAGE_EVICTIONS_TOTAL};
use crate::models::QuizSessionState;
use crate::storage::keys::{namespace_prefix, session_key, video_id_from_key};
use crate::storage::{KeyValueStore, StorageError};

/// Sessions kept when eviction runs
pub const DEFAULT_MAX_RETAINED_SESSIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// First write hit the quota; succeeded after eviction
    SavedAfterEviction,
    /// Not persisted; already logged
    Dropped,
}

#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    namespace: String,
    max_retained: usize,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            max_retained: DEFAULT_MAX_RETAINED_SESSIONS,
        }
    }

    pub fn with_max_retained(mut self, max_retained: usize) -> Self {
        self.max_retained = max_retained.max(1);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    pub fn key(&self, video_id: &str) -> String {
        session_key(&self.namespace, video_id)
    }

    pub fn save(&self, state: &QuizSessionState) -> SaveOutcome {
        let key = self.key(&state.video_id);
        let payload = match serde_json::to_string(state) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize session {}: {}", state.video_id, e);
                return SaveOutcome::Dropped;
            }
        };

        match self.write(&key, &payload) {
            Ok(()) => SaveOutcome::Saved,
            Err(StorageError::QuotaExceeded) => {
                tracing::warn!(
                    "Storage quota exceeded saving session {}, evicting stale sessions",
                    state.video_id
                );
                let evicted = self.evict_stale(&key);

                match self.write(&key, &payload) {
                    Ok(()) => {
                        tracing::info!(
                            "Session {} saved after evicting {} sessions",
                            state.video_id,
                            evicted
                        );
                        SaveOutcome::SavedAfterEviction
                    }
                    Err(e) => {
                        tracing::error!(
                            "Dropping save of session {} after eviction retry: {}",
                            state.video_id,
                            e
                        );
                        SaveOutcome::Dropped
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to save session {}: {}", state.video_id, e);
                SaveOutcome::Dropped
            }
        }
    }

    /// Stored session for `video_id`, or `None` when absent or unusable.
    pub fn restore(&self, video_id: &str) -> Option<QuizSessionState> {
        match self.load(video_id) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Failed to read session {}: {}", video_id, e);
                None
            }
        }
    }

    /// Like [`restore`](Self::restore), but a backend read failure is
    /// returned instead of being reported as absent. Corrupted records are
    /// still discarded and yield `Ok(None)`.
    pub fn load(&self, video_id: &str) -> Result<Option<QuizSessionState>, StorageError> {
        let key = self.key(video_id);

        let raw = match track_storage_operation("get", || self.backend.get(&key))? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match serde_json::from_str::<QuizSessionState>(&raw) {
            Ok(state) if state.video_id == video_id => Ok(Some(state)),
            Ok(state) => {
                tracing::warn!(
                    "Session record under {} belongs to video {}, discarding",
                    key,
                    state.video_id
                );
                self.discard_corrupt(&key);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Corrupted session record under {}: {}", key, e);
                self.discard_corrupt(&key);
                Ok(None)
            }
        }
    }

    pub fn clear(&self, video_id: &str) {
        let key = self.key(video_id);
        if let Err(e) = track_storage_operation("remove", || self.backend.remove(&key)) {
            tracing::warn!("Failed to clear session {}: {}", video_id, e);
        }
    }

    /// Makes room for `incoming_key`: deletes the least recently active
    /// other sessions until at most `max_retained - 1` remain, so the write
    /// that follows leaves `max_retained` sessions including the incoming
    /// one. Returns how many were removed.
    pub fn evict_stale(&self, incoming_key: &str) -> usize {
        let prefix = namespace_prefix(&self.namespace);
        let keys = match track_storage_operation("scan", || self.backend.keys_with_prefix(&prefix))
        {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("Failed to enumerate sessions for eviction: {}", e);
                return 0;
            }
        };

        let others: Vec<String> = keys.into_iter().filter(|k| k != incoming_key).collect();
        let room = self.max_retained - 1;
        if others.len() <= room {
            return 0;
        }

        let mut ranked: Vec<(i64, String)> = others
            .into_iter()
            .map(|key| (self.recency(&key), key))
            .collect();
        ranked.sort();

        let excess = ranked.len() - room;
        let mut evicted = 0;
        for (recency, key) in ranked.into_iter().take(excess) {
            match track_storage_operation("remove", || self.backend.remove(&key)) {
                Ok(()) => {
                    evicted += 1;
                    STORAGE_EVICTIONS_TOTAL.inc();
                    tracing::info!(
                        "Evicted session {} (last activity {})",
                        video_id_from_key(&self.namespace, &key).unwrap_or(&key),
                        recency
                    );
                }
                Err(e) => tracing::warn!("Failed to evict {}: {}", key, e),
            }
        }

        evicted
    }

    fn write(&self, key: &str, payload: &str) -> Result<(), StorageError> {
        track_storage_operation("set", || self.backend.set(key, payload))
    }

    /// Timestamp of the last attempt in the raw record, 0 when missing or
    /// unreadable. Reads loosely so corrupted records still rank (first).
    fn recency(&self, key: &str) -> i64 {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            _ => return 0,
        };

        serde_json::from_str::<Value>(&raw)
            .ok()
            .as_ref()
            .and_then(|v| v.get("answers"))
            .and_then(Value::as_array)
            .and_then(|answers| answers.last())
            .and_then(|last| last.get("timestamp"))
            .and_then(|ts| ts.as_i64().or_else(|| ts.as_f64().map(|f| f as i64)))
            .unwrap_or(0)
    }

    fn discard_corrupt(&self, key: &str) {
        STORAGE_CORRUPTIONS_TOTAL.inc();
        if let Err(e) = track_storage_operation("remove", || self.backend.remove(key)) {
            tracing::warn!("Failed to remove corrupted record {}: {}", key, e);
        }
    }
}
