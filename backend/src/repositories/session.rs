use sqlx::postgres::PgTransaction;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::session::{DeviceMeta, DeviceSession, SessionStatus};

const SELECT_COLUMNS: &str = "id, subject_id, device_name, user_agent, status, issued_at, seq";

/// Fixed first key of the two-key advisory lock, so session admission
/// locks cannot collide with other advisory-lock users of the database.
const ADMISSION_LOCK_CLASS: i32 = 0x5e55;

/// Takes the per-subject admission lock for the duration of the
/// transaction. Released automatically at commit or rollback.
///
/// Serializes the insert-count-demote sequence of registration and the
/// two-row swap of force-activation for one subject; distinct subjects
/// never contend.
pub async fn lock_subject(tx: &mut PgTransaction<'_>, subject_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, hashtext($2))")
        .bind(ADMISSION_LOCK_CLASS)
        .bind(subject_id)
        .execute(tx.as_mut())
        .await
        .map(|_| ())
}

pub async fn insert_session(
    tx: &mut PgTransaction<'_>,
    subject_id: &str,
    meta: &DeviceMeta,
    issued_at: i64,
) -> Result<DeviceSession, sqlx::Error> {
    let session_id = Uuid::new_v4().to_string();

    let query = format!(
        "INSERT INTO device_sessions (id, subject_id, device_name, user_agent, status, issued_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {}",
        SELECT_COLUMNS
    );
    sqlx::query_as::<_, DeviceSession>(&query)
        .bind(&session_id)
        .bind(subject_id)
        .bind(meta.device_name())
        .bind(meta.user_agent())
        .bind(SessionStatus::Active.as_str())
        .bind(issued_at)
        .fetch_one(tx.as_mut())
        .await
}

pub async fn count_active_sessions(
    tx: &mut PgTransaction<'_>,
    subject_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM device_sessions WHERE subject_id = $1 AND status = $2",
    )
    .bind(subject_id)
    .bind(SessionStatus::Active.as_str())
    .fetch_one(tx.as_mut())
    .await
}

pub async fn find_session_in_tx(
    tx: &mut PgTransaction<'_>,
    subject_id: &str,
    session_id: &str,
) -> Result<Option<DeviceSession>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM device_sessions WHERE id = $1 AND subject_id = $2",
        SELECT_COLUMNS
    );
    sqlx::query_as::<_, DeviceSession>(&query)
        .bind(session_id)
        .bind(subject_id)
        .fetch_optional(tx.as_mut())
        .await
}

/// Guarded status update. When `expected` is given, the write only
/// applies if the row still holds that status (compare-and-swap);
/// `None` updates unconditionally. Returns the updated row, or `None`
/// when the guard missed.
pub async fn update_session_status(
    tx: &mut PgTransaction<'_>,
    session_id: &str,
    expected: Option<SessionStatus>,
    new_status: SessionStatus,
) -> Result<Option<DeviceSession>, sqlx::Error> {
    let query = match expected {
        Some(_) => format!(
            "UPDATE device_sessions SET status = $1 WHERE id = $2 AND status = $3 RETURNING {}",
            SELECT_COLUMNS
        ),
        None => format!(
            "UPDATE device_sessions SET status = $1 WHERE id = $2 RETURNING {}",
            SELECT_COLUMNS
        ),
    };

    let mut q = sqlx::query_as::<_, DeviceSession>(&query)
        .bind(new_status.as_str())
        .bind(session_id);
    if let Some(expected) = expected {
        q = q.bind(expected.as_str());
    }
    q.fetch_optional(tx.as_mut()).await
}

pub async fn find_session_by_id(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<DeviceSession>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM device_sessions WHERE id = $1",
        SELECT_COLUMNS
    );
    sqlx::query_as::<_, DeviceSession>(&query)
        .bind(session_id)
        .fetch_optional(pool)
        .await
}

/// Lists every session owned by the subject, oldest first. Ties on
/// `issued_at` (epoch-second resolution) fall back to insertion order.
pub async fn list_sessions_for_subject(
    pool: &PgPool,
    subject_id: &str,
) -> Result<Vec<DeviceSession>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM device_sessions WHERE subject_id = $1 ORDER BY issued_at ASC, seq ASC",
        SELECT_COLUMNS
    );
    sqlx::query_as::<_, DeviceSession>(&query)
        .bind(subject_id)
        .fetch_all(pool)
        .await
}

/// Marks an owned session revoked, whatever its prior status.
/// Returns false when no owned row matched.
pub async fn revoke_session(
    pool: &PgPool,
    subject_id: &str,
    session_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE device_sessions SET status = $1 WHERE id = $2 AND subject_id = $3",
    )
    .bind(SessionStatus::Revoked.as_str())
    .bind(session_id)
    .bind(subject_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes an owned session only while it is still pending.
/// Returns false when the row is missing, unowned, or not pending.
pub async fn delete_pending_session(
    pool: &PgPool,
    subject_id: &str,
    session_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM device_sessions WHERE id = $1 AND subject_id = $2 AND status = $3",
    )
    .bind(session_id)
    .bind(subject_id)
    .bind(SessionStatus::Pending.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
