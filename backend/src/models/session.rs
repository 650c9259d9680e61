//! Models for device sessions and their admission lifecycle.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Device label recorded when the client does not send `X-Device-Name`.
pub const DEFAULT_DEVICE_NAME: &str = "Browser";
/// User agent recorded when the client does not send `User-Agent`.
pub const DEFAULT_USER_AGENT: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Database representation of a device session.
pub struct DeviceSession {
    /// Unique identifier for the session record.
    pub id: String,
    /// Subject (authenticated user identity) that owns the session.
    pub subject_id: String,
    /// Label identifying the client/device.
    pub device_name: String,
    /// User agent string reported by the client.
    pub user_agent: String,
    /// Current admission status.
    pub status: SessionStatus,
    /// Creation time as epoch seconds.
    pub issued_at: i64,
    /// Insertion sequence; breaks `issued_at` ties when listing.
    pub seq: i64,
}

impl DeviceSession {
    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema, Default)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
/// Admission status of a device session as stored in the database.
///
/// A fourth logical state, "absent", is deletion from the table; only
/// pending sessions reach it, via cancellation.
pub enum SessionStatus {
    /// Admitted; counts against the subject's quota.
    #[default]
    Active,
    /// Created over quota, waiting for the user to cancel it or evict
    /// an active session in its favour.
    Pending,
    /// Terminally deactivated; kept as history.
    Revoked,
}

impl SessionStatus {
    /// Returns the canonical lowercase representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Pending => "pending",
            SessionStatus::Revoked => "revoked",
        }
    }
}

impl Serialize for SessionStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "active" => Ok(SessionStatus::Active),
            "pending" => Ok(SessionStatus::Pending),
            "revoked" => Ok(SessionStatus::Revoked),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["active", "pending", "revoked"],
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Descriptive device metadata captured at registration.
///
/// Both fields are optional on the wire; missing values fall back to
/// [`DEFAULT_DEVICE_NAME`] / [`DEFAULT_USER_AGENT`] when persisted.
pub struct DeviceMeta {
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
}

impl DeviceMeta {
    pub fn device_name(&self) -> &str {
        self.device_name.as_deref().unwrap_or(DEFAULT_DEVICE_NAME)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}
