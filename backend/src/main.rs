use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use gatekeeper_backend::{
    config::Config,
    db::connection::create_pool,
    docs::ApiDoc,
    handlers,
    middleware::auth as auth_middleware,
    services::{admission::AdmissionService, authenticator::JwtAuthenticator},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        auth_domain = %config.auth_domain,
        api_audience = %config.api_audience,
        max_active_sessions = config.max_active_sessions,
        frontend_origin = %config.frontend_origin,
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    sqlx::migrate!("./migrations").run(pool.as_ref()).await?;

    let authenticator = Arc::new(JwtAuthenticator::new(&config));
    let admission = Arc::new(AdmissionService::new(pool.as_ref().clone()));
    let state = AppState::new(pool, config.clone(), authenticator, admission);

    // Public routes (no auth)
    let public_routes = Router::new().route("/", get(handlers::profile::root));

    // Routes a device reaches on its bearer token alone; a pending
    // device has no usable session yet but must still be able to
    // register, cancel itself, or complete a swap.
    let token_routes = Router::new()
        .route(
            "/api/sessions/register",
            post(handlers::sessions::register_session),
        )
        .route(
            "/api/sessions/cancel",
            post(handlers::sessions::cancel_session),
        )
        .route(
            "/api/sessions/force-activate",
            post(handlers::sessions::force_activate_session),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth,
        ));

    // Routes that additionally require an owned active session
    let session_routes = Router::new()
        .route("/api/sessions", get(handlers::sessions::list_sessions))
        .route(
            "/api/sessions/logout",
            post(handlers::sessions::logout_session),
        )
        .route("/api/me", get(handlers::profile::me))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth_session,
        ));

    let cors_origin = config.frontend_origin.parse::<HeaderValue>()?;
    let app = Router::new()
        .merge(public_routes)
        .merge(token_routes)
        .merge(session_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(cors_origin)
                        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                        .allow_headers([
                            axum::http::header::AUTHORIZATION,
                            axum::http::header::CONTENT_TYPE,
                            axum::http::HeaderName::from_static("x-session-id"),
                            axum::http::HeaderName::from_static("x-device-name"),
                        ])
                        .allow_credentials(true)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
