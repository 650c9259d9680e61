#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    handlers::{
        profile::MeResponse,
        sessions::{
            ForceActivateRequest, RegisterResponse, SessionActionRequest, SessionResponse,
        },
    },
    models::session::SessionStatus,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        register_doc,
        list_sessions_doc,
        logout_doc,
        cancel_doc,
        force_activate_doc,
        me_doc
    ),
    components(
        schemas(
            SessionResponse,
            SessionStatus,
            RegisterResponse,
            SessionActionRequest,
            ForceActivateRequest,
            MeResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Sessions", description = "Device session registration, listing and admission control"),
        (name = "Profile", description = "Authenticated subject info")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());
        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));

        components.add_security_scheme(
            "SessionHeader",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Session-ID"))),
        );
    }
}

#[utoipa::path(
    post,
    path = "/api/sessions/register",
    responses(
        (status = 200, description = "Session created; admitted or parked pending over quota", body = RegisterResponse),
        (status = 401, description = "Bearer token rejected")
    ),
    tag = "Sessions"
)]
fn register_doc() {}

#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "All sessions owned by the subject, oldest first", body = [SessionResponse]),
        (status = 401, description = "Bearer token or session header rejected")
    ),
    tag = "Sessions",
    security(("BearerAuth" = []), ("SessionHeader" = []))
)]
fn list_sessions_doc() {}

#[utoipa::path(
    post,
    path = "/api/sessions/logout",
    request_body = SessionActionRequest,
    responses(
        (status = 200, description = "Session revoked"),
        (status = 404, description = "Session not found or not owned")
    ),
    tag = "Sessions"
)]
fn logout_doc() {}

#[utoipa::path(
    post,
    path = "/api/sessions/cancel",
    request_body = SessionActionRequest,
    responses(
        (status = 200, description = "Pending session removed"),
        (status = 400, description = "Session not found or not pending")
    ),
    tag = "Sessions"
)]
fn cancel_doc() {}

#[utoipa::path(
    post,
    path = "/api/sessions/force-activate",
    request_body = ForceActivateRequest,
    responses(
        (status = 200, description = "Target revoked, candidate activated"),
        (status = 400, description = "Candidate not pending or target not active"),
        (status = 409, description = "A concurrent mutation won the race; re-read and retry")
    ),
    tag = "Sessions"
)]
fn force_activate_doc() {}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Subject identity and current session", body = MeResponse),
        (status = 401, description = "Bearer token or session header rejected")
    ),
    tag = "Profile",
    security(("BearerAuth" = []), ("SessionHeader" = []))
)]
fn me_doc() {}
