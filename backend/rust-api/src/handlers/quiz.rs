use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    models::SubmitAnswerRequest,
    services::{
        quiz_service::{BatchOptions, QuizServiceError},
        session_controller::SubmitError,
        AppState,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionQuery {
    pub chapter_id: Option<String>,
    pub language: Option<String>,
}

fn error_response(e: QuizServiceError) -> (StatusCode, String) {
    let status = match &e {
        QuizServiceError::Submit(SubmitError::UnknownQuestion(_)) => StatusCode::NOT_FOUND,
        QuizServiceError::Submit(SubmitError::AlreadyAnswered(_)) => StatusCode::CONFLICT,
        QuizServiceError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    Query(query): Query<OpenSessionQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Opening quiz session for video: {}", video_id);

    let options = BatchOptions {
        chapter_id: query.chapter_id,
        language: query.language,
    };

    match state.quiz.open_session(&video_id, options).await {
        Ok(view) => Ok((StatusCode::OK, Json(view))),
        Err(e) => {
            tracing::error!("Failed to open session for video {}: {}", video_id, e);
            Err(error_response(e))
        }
    }
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Submitting answer for video: {}, question: {}",
        video_id,
        req.question_id
    );

    match state
        .quiz
        .submit_answer(&video_id, req.question_id, req.answer)
        .await
    {
        Ok(outcome) => Ok((StatusCode::OK, Json(outcome))),
        Err(e) => {
            tracing::warn!("Answer rejected for video {}: {}", video_id, e);
            Err(error_response(e))
        }
    }
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.quiz.summary(&video_id).await {
        Ok(summary) => Ok((StatusCode::OK, Json(summary))),
        Err(e) => {
            tracing::error!("Failed to summarize session for video {}: {}", video_id, e);
            Err(error_response(e))
        }
    }
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Resetting quiz session for video: {}", video_id);

    match state.quiz.reset(&video_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            tracing::error!("Failed to reset session for video {}: {}", video_id, e);
            Err(error_response(e))
        }
    }
}
