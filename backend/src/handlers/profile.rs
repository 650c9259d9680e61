use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::{
    middleware::auth::CurrentSession, services::authenticator::AuthSubject, state::AppState,
};

/// Liveness probe; also tells a misconfigured frontend which origin
/// the backend expects.
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "msg": "gatekeeper backend up",
        "env": { "frontend_origin": state.config.frontend_origin }
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub session_id: String,
}

/// The authenticated subject and the session this request runs under.
pub async fn me(
    Extension(subject): Extension<AuthSubject>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Json<MeResponse> {
    Json(MeResponse {
        sub: subject.subject_id,
        name: subject.name,
        phone_number: subject.phone_number,
        session_id: session.id,
    })
}
