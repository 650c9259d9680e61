//! Admission control for device sessions.
//!
//! Each subject may hold at most `quota` concurrently active sessions.
//! Registration over the quota parks the new session as pending; the
//! user then either cancels it or force-activates it by evicting one
//! active session. Registration and force-activation run inside a
//! transaction holding the subject's advisory lock, so the quota
//! invariant holds under any interleaving of calls for one subject.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::session::{DeviceMeta, DeviceSession, SessionStatus},
    repositories::{session as session_repo, transaction},
};

#[derive(Debug)]
/// Result of a registration attempt. Both variants carry the subject's
/// full ordered session list, which clients render directly.
pub enum RegisterOutcome {
    /// The new session was admitted within quota and is active.
    Admitted {
        session: DeviceSession,
        sessions: Vec<DeviceSession>,
    },
    /// The quota was exhausted; the new session is parked as pending
    /// until the user cancels it or evicts an active session.
    OverQuota {
        candidate: DeviceSession,
        sessions: Vec<DeviceSession>,
    },
}

#[async_trait]
pub trait AdmissionServiceTrait: Send + Sync {
    /// Creates a session for the subject, admitting it when the active
    /// count stays within `quota` and parking it as pending otherwise.
    async fn register(
        &self,
        subject_id: &str,
        meta: DeviceMeta,
        quota: u32,
    ) -> Result<RegisterOutcome, AppError>;

    /// All sessions owned by the subject, ordered by issue time.
    async fn list(&self, subject_id: &str) -> Result<Vec<DeviceSession>, AppError>;

    /// Revokes an owned session regardless of its prior status.
    /// Returns false when the session is missing or not owned.
    async fn logout(&self, subject_id: &str, session_id: &str) -> Result<bool, AppError>;

    /// Deletes an owned session while it is still pending. Returns
    /// false when the session is missing, not owned, or not pending.
    async fn cancel(&self, subject_id: &str, session_id: &str) -> Result<bool, AppError>;

    /// Atomically revokes the active `target_id` and promotes the
    /// pending `candidate_id`, leaving the active count unchanged.
    async fn force_activate(
        &self,
        subject_id: &str,
        candidate_id: &str,
        target_id: &str,
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct AdmissionService {
    pool: PgPool,
}

impl AdmissionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdmissionServiceTrait for AdmissionService {
    async fn register(
        &self,
        subject_id: &str,
        meta: DeviceMeta,
        quota: u32,
    ) -> Result<RegisterOutcome, AppError> {
        let mut tx = transaction::begin_transaction(&self.pool).await?;
        session_repo::lock_subject(&mut tx, subject_id).await?;

        let issued_at = Utc::now().timestamp();
        let session = session_repo::insert_session(&mut tx, subject_id, &meta, issued_at).await?;

        let active_count = session_repo::count_active_sessions(&mut tx, subject_id).await?;
        let over_quota = active_count > i64::from(quota);

        let session = if over_quota {
            // The row is created active and demoted here in the same
            // locked transaction; the intermediate state is never
            // visible to a serialized reader.
            session_repo::update_session_status(
                &mut tx,
                &session.id,
                None,
                SessionStatus::Pending,
            )
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(anyhow::anyhow!(
                    "session {} vanished during registration",
                    session.id
                ))
            })?
        } else {
            session
        };

        transaction::commit_transaction(tx).await?;

        let sessions = session_repo::list_sessions_for_subject(&self.pool, subject_id).await?;
        if over_quota {
            tracing::info!(
                subject_id,
                candidate_id = %session.id,
                active_count,
                quota,
                "Registration over quota, session parked as pending"
            );
            Ok(RegisterOutcome::OverQuota {
                candidate: session,
                sessions,
            })
        } else {
            tracing::info!(subject_id, session_id = %session.id, "Session registered");
            Ok(RegisterOutcome::Admitted { session, sessions })
        }
    }

    async fn list(&self, subject_id: &str) -> Result<Vec<DeviceSession>, AppError> {
        let sessions = session_repo::list_sessions_for_subject(&self.pool, subject_id).await?;
        Ok(sessions)
    }

    async fn logout(&self, subject_id: &str, session_id: &str) -> Result<bool, AppError> {
        let revoked = session_repo::revoke_session(&self.pool, subject_id, session_id).await?;
        if revoked {
            tracing::info!(subject_id, session_id, "Session revoked");
        }
        Ok(revoked)
    }

    async fn cancel(&self, subject_id: &str, session_id: &str) -> Result<bool, AppError> {
        let deleted =
            session_repo::delete_pending_session(&self.pool, subject_id, session_id).await?;
        if deleted {
            tracing::info!(subject_id, session_id, "Pending session cancelled");
        }
        Ok(deleted)
    }

    async fn force_activate(
        &self,
        subject_id: &str,
        candidate_id: &str,
        target_id: &str,
    ) -> Result<(), AppError> {
        let mut tx = transaction::begin_transaction(&self.pool).await?;
        session_repo::lock_subject(&mut tx, subject_id).await?;

        let candidate = session_repo::find_session_in_tx(&mut tx, subject_id, candidate_id).await?;
        match candidate {
            Some(ref session) if session.status == SessionStatus::Pending => {}
            _ => {
                transaction::rollback_transaction(tx).await?;
                return Err(AppError::InvalidState(
                    "Candidate session not found or not pending".to_string(),
                ));
            }
        }

        let target = session_repo::find_session_in_tx(&mut tx, subject_id, target_id).await?;
        match target {
            Some(ref session) if session.status == SessionStatus::Active => {}
            _ => {
                transaction::rollback_transaction(tx).await?;
                return Err(AppError::InvalidState(
                    "Target session not found or not active".to_string(),
                ));
            }
        }

        // Both writes are guarded; logout takes no subject lock, so a
        // racing revoke can still invalidate a row between the reads
        // above and the writes below. A guard miss rolls the whole
        // swap back and surfaces as a retryable conflict.
        let revoked = session_repo::update_session_status(
            &mut tx,
            target_id,
            Some(SessionStatus::Active),
            SessionStatus::Revoked,
        )
        .await?;
        if revoked.is_none() {
            transaction::rollback_transaction(tx).await?;
            return Err(AppError::Conflict(
                "Target session was modified concurrently".to_string(),
            ));
        }

        let promoted = session_repo::update_session_status(
            &mut tx,
            candidate_id,
            Some(SessionStatus::Pending),
            SessionStatus::Active,
        )
        .await?;
        if promoted.is_none() {
            transaction::rollback_transaction(tx).await?;
            return Err(AppError::Conflict(
                "Candidate session was modified concurrently".to_string(),
            ));
        }

        transaction::commit_transaction(tx).await?;
        tracing::info!(
            subject_id,
            candidate_id,
            target_id,
            "Pending session promoted, target revoked"
        );
        Ok(())
    }
}
