use axum::{
    extract::{Extension, State},
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::auth::CurrentSession,
    models::session::{DeviceMeta, DeviceSession, SessionStatus},
    services::{admission::RegisterOutcome, authenticator::AuthSubject},
    state::AppState,
};

/// Optional header carrying a friendly device label at registration.
pub const DEVICE_NAME_HEADER: &str = "x-device-name";

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: String,
    pub subject_id: String,
    pub device_name: String,
    pub user_agent: String,
    pub status: SessionStatus,
    pub issued_at: i64,
    pub is_current: bool,
}

impl SessionResponse {
    fn from_session(session: DeviceSession, current_id: Option<&str>) -> Self {
        let is_current = current_id.map(|id| id == session.id).unwrap_or(false);
        Self {
            id: session.id,
            subject_id: session.subject_id,
            device_name: session.device_name,
            user_agent: session.user_agent,
            status: session.status,
            issued_at: session.issued_at,
            is_current,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Outcome of a registration attempt. `session_id` is set on
/// admission, `candidate` when the device was parked over quota;
/// `sessions` always carries the subject's full list for the UI.
pub struct RegisterResponse {
    pub overquota: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    pub sessions: Vec<SessionResponse>,
}

impl RegisterResponse {
    fn from_outcome(outcome: RegisterOutcome) -> Self {
        match outcome {
            RegisterOutcome::Admitted { session, sessions } => Self {
                overquota: false,
                session_id: Some(session.id),
                candidate: None,
                sessions: to_responses(sessions, None),
            },
            RegisterOutcome::OverQuota {
                candidate,
                sessions,
            } => Self {
                overquota: true,
                session_id: None,
                candidate: Some(candidate.id),
                sessions: to_responses(sessions, None),
            },
        }
    }
}

fn to_responses(sessions: Vec<DeviceSession>, current_id: Option<&str>) -> Vec<SessionResponse> {
    sessions
        .into_iter()
        .map(|session| SessionResponse::from_session(session, current_id))
        .collect()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SessionActionRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForceActivateRequest {
    /// Pending session to promote.
    #[validate(length(min = 1))]
    pub candidate_id: String,
    /// Active session to revoke in its favour.
    #[validate(length(min = 1))]
    pub target_id: String,
}

/// Registers the calling device as a new session for the subject.
/// Device metadata comes from the `X-Device-Name` and `User-Agent`
/// headers; both are optional.
pub async fn register_session(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    headers: HeaderMap,
) -> Result<Json<RegisterResponse>, AppError> {
    let meta = DeviceMeta {
        device_name: header_string(&headers, DEVICE_NAME_HEADER),
        user_agent: header_string(&headers, USER_AGENT.as_str()),
    };

    let outcome = state
        .admission
        .register(
            &subject.subject_id,
            meta,
            state.config.max_active_sessions,
        )
        .await?;

    Ok(Json(RegisterResponse::from_outcome(outcome)))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    Extension(CurrentSession(current)): Extension<CurrentSession>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    let sessions = state.admission.list(&subject.subject_id).await?;
    Ok(Json(to_responses(sessions, Some(current.id.as_str()))))
}

/// Revokes an owned session whatever its status. Revoking an already
/// revoked session succeeds; only a missing or unowned id is an error.
pub async fn logout_session(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    Json(payload): Json<SessionActionRequest>,
) -> Result<Json<Value>, AppError> {
    payload.validate()?;

    let revoked = state
        .admission
        .logout(&subject.subject_id, &payload.session_id)
        .await?;
    if !revoked {
        return Err(AppError::NotFound("Session not found".into()));
    }

    Ok(Json(json!({
        "status": "logged_out",
        "session_id": payload.session_id
    })))
}

/// Deletes a pending session the subject no longer wants to admit.
pub async fn cancel_session(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    Json(payload): Json<SessionActionRequest>,
) -> Result<Json<Value>, AppError> {
    payload.validate()?;

    let cancelled = state
        .admission
        .cancel(&subject.subject_id, &payload.session_id)
        .await?;
    if !cancelled {
        return Err(AppError::BadRequest(
            "Unable to cancel session (not found or not pending)".into(),
        ));
    }

    Ok(Json(json!({
        "status": "cancelled",
        "session_id": payload.session_id
    })))
}

/// Swaps an admitted slot: revokes the active target and promotes the
/// pending candidate in one atomic unit.
pub async fn force_activate_session(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    Json(payload): Json<ForceActivateRequest>,
) -> Result<Json<Value>, AppError> {
    payload.validate()?;

    state
        .admission
        .force_activate(
            &subject.subject_id,
            &payload.candidate_id,
            &payload.target_id,
        )
        .await?;

    Ok(Json(json!({
        "status": "activated",
        "session_id": payload.candidate_id,
        "revoked": payload.target_id
    })))
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
