//! SessionAdmin: request/response endpoints over the session lifecycle,
//! used by hosts and lobby screens outside the message channel.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use trivium::data::{
    ActionResponse, CreateSessionRequest, CreateSessionResponse, JoinOutcome, JoinSessionRequest,
    JoinSessionResponse, NewSession, ParticipantsResponse, SessionField, SessionResponse,
    SessionSnapshot, SessionStatus, ValidateResponse,
};
use trivium::errors::SessionError;
use trivium::id::{SessionCode, UserId};
use trivium::log;

use super::super::ApiError;

/// Handler to create a new session for an existing quiz.
pub async fn create(
    State(state): State<Arc<crate::AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let quiz = state
        .quizzes
        .find_by_id(&request.quiz_id)
        .await?
        .ok_or_else(SessionError::quiz_not_found)?;

    let session = state
        .store
        .create(NewSession {
            quiz_id: request.quiz_id,
            host_id: request.host_id,
            mode: request.mode,
            per_question_time_limit: request
                .per_question_time_limit
                .unwrap_or(state.config.question_time_seconds),
            quiz_title: quiz.title.clone(),
            total_questions: quiz.questions.len() as u32,
        })
        .await?;

    log::info!(
        "Created session {} for quiz {} ({} questions)",
        session.code,
        session.quiz_id,
        session.total_questions
    );

    Ok(Json(CreateSessionResponse {
        success: true,
        message: format!(
            "Live session created successfully. Session code: {}",
            session.code
        ),
        session_code: session.code,
    }))
}

/// Handler to get a session snapshot by code.
pub async fn get(
    State(state): State<Arc<crate::AppState>>,
    Path(code): Path<SessionCode>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.store.get(&code).await?;
    Ok(Json(SessionResponse {
        success: true,
        session: SessionSnapshot::from(&session),
    }))
}

/// Handler to list a session's participants.
pub async fn participants(
    State(state): State<Arc<crate::AppState>>,
    Path(code): Path<SessionCode>,
) -> Result<Json<ParticipantsResponse>, ApiError> {
    let session = state.store.get(&code).await?;
    let participants = session.participants_list();
    Ok(Json(ParticipantsResponse {
        success: true,
        session_code: session.code.clone(),
        participant_count: participants.len(),
        participants,
        mode: session.mode,
        is_started: session.status == SessionStatus::Active,
    }))
}

/// Handler for the idempotent HTTP join (alternative to the channel
/// `join`). Reconnects succeed at any status; new joins only while waiting.
pub async fn join(
    State(state): State<Arc<crate::AppState>>,
    Path(code): Path<SessionCode>,
    Json(request): Json<JoinSessionRequest>,
) -> Result<Json<JoinSessionResponse>, ApiError> {
    let outcome = state
        .store
        .upsert_participant(&code, &request.user_id, &request.username)
        .await?;

    match outcome {
        JoinOutcome::Added | JoinOutcome::Reconnected => {}
        JoinOutcome::RejectedHost => {
            return Err(SessionError::Forbidden(
                "Host cannot join their own session as a participant".to_string(),
            )
            .into());
        }
        JoinOutcome::RejectedClosed => {
            return Err(SessionError::Conflict("Quiz has already started".to_string()).into());
        }
        JoinOutcome::RejectedFull => {
            return Err(SessionError::Conflict("Session is full".to_string()).into());
        }
    }

    let session = state.store.get(&code).await?;
    Ok(Json(JoinSessionResponse {
        success: true,
        message: "Successfully joined the session".to_string(),
        session_code: session.code,
        participant_count: session.participants.len(),
        quiz_id: session.quiz_id,
    }))
}

async fn require_host(
    state: &crate::AppState,
    code: &SessionCode,
    host_id: &UserId,
    action: &str,
) -> Result<(), SessionError> {
    if state.store.is_host(code, host_id).await? {
        Ok(())
    } else {
        Err(SessionError::Forbidden(format!("Only host can {action}")))
    }
}

/// Handler for the out-of-band status transition to `active`.
pub async fn start(
    State(state): State<Arc<crate::AppState>>,
    Path(code): Path<SessionCode>,
    Json(request): Json<trivium::data::SessionActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    require_host(&state, &code, &request.host_id, "start").await?;
    state
        .store
        .set_field(&code, SessionField::Status(SessionStatus::Active))
        .await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "Quiz started successfully".to_string(),
        session_code: code,
    }))
}

/// Handler for the out-of-band status transition to `completed`.
pub async fn end(
    State(state): State<Arc<crate::AppState>>,
    Path(code): Path<SessionCode>,
    Json(request): Json<trivium::data::SessionActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    require_host(&state, &code, &request.host_id, "end").await?;
    state
        .store
        .set_field(&code, SessionField::Status(SessionStatus::Completed))
        .await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "Quiz session ended".to_string(),
        session_code: code,
    }))
}

/// Handler to validate a session code. A missing session is reported in
/// the body rather than as an HTTP error.
pub async fn validate(
    State(state): State<Arc<crate::AppState>>,
    Path(code): Path<SessionCode>,
) -> Result<Json<ValidateResponse>, ApiError> {
    match state.store.get(&code).await {
        Ok(session) => Ok(Json(ValidateResponse {
            success: true,
            valid: true,
            session_code: Some(session.code.clone()),
            status: Some(session.status),
            quiz_title: Some(session.quiz_title.clone()),
            participant_count: Some(session.participants.len()),
            message: None,
        })),
        Err(SessionError::NotFound(_)) => Ok(Json(ValidateResponse {
            success: false,
            valid: false,
            session_code: None,
            status: None,
            quiz_title: None,
            participant_count: None,
            message: Some("Session not found".to_string()),
        })),
        Err(other) => Err(other.into()),
    }
}
