use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    /// Issuer host, e.g. `dev-tenant.us.auth0.com`.
    pub auth_domain: String,
    /// Audience the access token must be minted for.
    pub api_audience: String,
    /// Prefix under which the issuer namespaces identity claims.
    pub claims_namespace: String,
    /// Seconds of leeway applied to `exp`/`iat` validation.
    pub jwt_leeway_seconds: u64,
    /// Maximum active sessions per subject.
    pub max_active_sessions: u32,
    /// Origin allowed by CORS; the deployed UI.
    pub frontend_origin: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/gatekeeper".to_string());

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let auth_domain =
            env::var("AUTH_DOMAIN").unwrap_or_else(|_| "dev-tenant.us.auth0.com".to_string());

        let api_audience =
            env::var("API_AUDIENCE").unwrap_or_else(|_| "https://gatekeeper-api".to_string());

        let claims_namespace =
            env::var("CLAIMS_NAMESPACE").unwrap_or_else(|_| "https://gatekeeper.app/".to_string());

        let jwt_leeway_seconds = env::var("JWT_LEEWAY_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let max_active_sessions: u32 = env::var("MAX_ACTIVE_SESSIONS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);
        if max_active_sessions == 0 {
            return Err(anyhow!("MAX_ACTIVE_SESSIONS must be a positive integer"));
        }

        let frontend_origin =
            env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Config {
            database_url,
            db_max_connections,
            bind_addr,
            auth_domain,
            api_audience,
            claims_namespace,
            jwt_leeway_seconds,
            max_active_sessions,
            frontend_origin,
        })
    }

    /// URL of the issuer's published key set.
    pub fn jwks_url(&self) -> String {
        format!("https://{}/.well-known/jwks.json", self.auth_domain)
    }

    /// Expected `iss` claim value.
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.auth_domain)
    }
}
