//! Bearer-token authentication against the issuer's remote key set.
//!
//! Tokens are RS256 JWTs signed by keys published in the issuer's JWKS
//! document. The key set is cached process-wide and fetched lazily; an
//! unknown `kid` invalidates the cache and triggers exactly one
//! refetch before the token is rejected.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::utils::jwt::{canonicalize_token, looks_like_jwt, Claims};

#[derive(Debug, Clone)]
/// The authenticated caller, as derived from a verified access token.
pub struct AuthSubject {
    /// Stable subject identifier (the token's `sub` claim).
    pub subject_id: String,
    /// Display name, when the issuer supplies one.
    pub name: Option<String>,
    /// Phone number, when the issuer supplies one.
    pub phone_number: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token format")]
    Malformed,
    #[error("Token missing 'kid' header")]
    MissingKeyId,
    #[error("No signing key found for kid '{0}'")]
    UnknownKeyId(String),
    #[error("Token expired")]
    Expired,
    #[error("Token not yet valid; check clock skew or raise the configured leeway")]
    NotYetValid,
    #[error("Invalid token issuer")]
    InvalidIssuer,
    #[error("Invalid audience in token (expected '{expected}')")]
    InvalidAudience { expected: String },
    #[error("Token verification failed: {0}")]
    Verification(#[source] jsonwebtoken::errors::Error),
    #[error("Invalid JWK material: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),
    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(#[from] reqwest::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubjectAuthenticator: Send + Sync {
    /// Verifies a bearer credential and returns the subject it names.
    async fn authenticate(&self, token: &str) -> Result<AuthSubject, AuthError>;
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: Option<String>,
    /// RSA modulus, base64url.
    n: String,
    /// RSA public exponent, base64url.
    e: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct JwkSet {
    #[serde(default)]
    keys: Vec<Jwk>,
}

impl JwkSet {
    fn key_for(&self, kid: &str) -> Option<&Jwk> {
        self.keys
            .iter()
            .find(|key| key.kid.as_deref() == Some(kid))
    }
}

pub struct JwtAuthenticator {
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    claims_namespace: String,
    leeway_seconds: u64,
    keys: RwLock<Option<JwkSet>>,
}

impl JwtAuthenticator {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_url: config.jwks_url(),
            issuer: config.issuer(),
            audience: config.api_audience.clone(),
            claims_namespace: config.claims_namespace.clone(),
            leeway_seconds: config.jwt_leeway_seconds,
            keys: RwLock::new(None),
        }
    }

    /// Drops the cached key set; the next lookup refetches.
    pub async fn invalidate_keys(&self) {
        *self.keys.write().await = None;
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");
        let jwks: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(keys = jwks.keys.len(), "Fetched JWKS");
        Ok(jwks)
    }

    /// Resolves the decoding key for `kid`, refetching the key set once
    /// when the kid is unknown (rotation) before giving up.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.keys.read().await;
            if let Some(jwk) = cached.as_ref().and_then(|set| set.key_for(kid)) {
                return DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
                    .map_err(AuthError::InvalidKey);
            }
        }

        let fresh = self.fetch_keys().await?;
        let mut cached = self.keys.write().await;
        *cached = Some(fresh);
        match cached.as_ref().and_then(|set| set.key_for(kid)) {
            Some(jwk) => {
                DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(AuthError::InvalidKey)
            }
            None => Err(AuthError::UnknownKeyId(kid.to_string())),
        }
    }

    fn verify_claims(&self, token: &str, key: &DecodingKey) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.leeway_seconds;
        validation.set_issuer(&[&self.issuer]);
        // aud may be a string or an array; checked manually below.
        validation.validate_aud = false;

        let data = decode::<Claims>(token, key, &validation).map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::ImmatureSignature => AuthError::NotYetValid,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                _ => AuthError::Verification(err),
            }
        })?;

        if !data.claims.has_audience(&self.audience) {
            return Err(AuthError::InvalidAudience {
                expected: self.audience.clone(),
            });
        }
        Ok(data.claims)
    }
}

#[async_trait]
impl SubjectAuthenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthSubject, AuthError> {
        let token = canonicalize_token(token);
        if !looks_like_jwt(token) {
            return Err(AuthError::Malformed);
        }

        let header = decode_header(token).map_err(|_| AuthError::Malformed)?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let key = self.decoding_key(&kid).await?;
        let claims = self.verify_claims(token, &key)?;

        tracing::debug!(sub = %claims.sub, "Verified access token");
        Ok(AuthSubject {
            name: claims.display_claim(&self.claims_namespace, "name"),
            phone_number: claims.display_claim(&self.claims_namespace, "phone_number"),
            subject_id: claims.sub,
        })
    }
}
