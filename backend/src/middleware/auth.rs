use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::{
    models::session::{DeviceSession, SessionStatus},
    repositories::session as session_repo,
    services::authenticator::AuthSubject,
    state::AppState,
};

/// Header naming the device session a protected request acts under.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// The session a request is operating under, resolved by
/// [`auth_session`] from the `X-Session-ID` header.
#[derive(Clone, Debug)]
pub struct CurrentSession(pub DeviceSession);

/// Verifies the bearer token and exposes the subject to handlers.
///
/// Used by routes a device must reach before it has an admitted
/// session: registration, cancellation, and force-activation.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let subject = authenticate_request(request.headers(), &state).await?;
    request.extensions_mut().insert(subject);
    Ok(next.run(request).await)
}

/// Verifies the bearer token and additionally requires an owned,
/// active session named by `X-Session-ID`.
pub async fn auth_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let subject = authenticate_request(request.headers(), &state).await?;

    let session_id = request
        .headers()
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            tracing::warn!(subject_id = %subject.subject_id, "Missing X-Session-ID header");
            StatusCode::UNAUTHORIZED
        })?;

    let session = session_repo::find_session_by_id(&state.pool, session_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "Session lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            tracing::warn!(session_id, "Unknown session id");
            StatusCode::UNAUTHORIZED
        })?;

    if session.subject_id != subject.subject_id {
        tracing::warn!(
            session_id,
            subject_id = %subject.subject_id,
            "Session does not belong to the token subject"
        );
        return Err(StatusCode::UNAUTHORIZED);
    }
    match session.status {
        SessionStatus::Active => {}
        SessionStatus::Revoked | SessionStatus::Pending => {
            tracing::info!(session_id, status = session.status.as_str(), "Session not usable");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    request.extensions_mut().insert(subject);
    request.extensions_mut().insert(CurrentSession(session));
    Ok(next.run(request).await)
}

async fn authenticate_request(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<AuthSubject, StatusCode> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    state.authenticator.authenticate(raw).await.map_err(|err| {
        tracing::warn!(error = %err, "Bearer token rejected");
        StatusCode::UNAUTHORIZED
    })
}
