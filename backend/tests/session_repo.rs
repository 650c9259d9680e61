use gatekeeper_backend::{
    models::session::{DeviceMeta, SessionStatus},
    repositories::session as session_repo,
};
use std::sync::OnceLock;
use tokio::sync::Mutex;

#[path = "support/mod.rs"]
mod support;

async fn integration_guard() -> tokio::sync::MutexGuard<'static, ()> {
    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD.get_or_init(|| Mutex::new(())).lock().await
}

#[tokio::test]
async fn insert_and_list_roundtrip() {
    let _guard = integration_guard().await;
    let pool = support::test_pool().await;
    support::migrate(&pool).await;

    let subject = support::unique_subject();
    let meta = DeviceMeta {
        device_name: Some("macbook-pro".into()),
        user_agent: Some("Mozilla/5.0".into()),
    };

    let mut tx = pool.begin().await.expect("begin");
    let created = session_repo::insert_session(&mut tx, &subject, &meta, 1_700_000_000)
        .await
        .expect("insert session");
    tx.commit().await.expect("commit");

    assert_eq!(created.subject_id, subject);
    assert_eq!(created.device_name, "macbook-pro");
    assert_eq!(created.user_agent, "Mozilla/5.0");
    assert_eq!(created.status, SessionStatus::Active);
    assert_eq!(created.issued_at, 1_700_000_000);

    let sessions = session_repo::list_sessions_for_subject(&pool, &subject)
        .await
        .expect("list sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, created.id);

    let found = session_repo::find_session_by_id(&pool, &created.id)
        .await
        .expect("find session")
        .expect("session exists");
    assert_eq!(found.id, created.id);

    assert!(session_repo::find_session_by_id(&pool, "missing")
        .await
        .expect("find missing")
        .is_none());
}

#[tokio::test]
async fn insert_applies_metadata_defaults() {
    let _guard = integration_guard().await;
    let pool = support::test_pool().await;
    support::migrate(&pool).await;

    let subject = support::unique_subject();
    let mut tx = pool.begin().await.expect("begin");
    let created =
        session_repo::insert_session(&mut tx, &subject, &DeviceMeta::default(), 1_700_000_000)
            .await
            .expect("insert session");
    tx.commit().await.expect("commit");

    assert_eq!(created.device_name, "Browser");
    assert_eq!(created.user_agent, "unknown");
}

#[tokio::test]
async fn guarded_status_update_applies_only_on_expected_state() {
    let _guard = integration_guard().await;
    let pool = support::test_pool().await;
    support::migrate(&pool).await;

    let subject = support::unique_subject();
    let session =
        support::seed_session(&pool, &subject, "laptop", SessionStatus::Active, 100).await;

    // guard matches: active -> revoked
    let mut tx = pool.begin().await.expect("begin");
    let updated = session_repo::update_session_status(
        &mut tx,
        &session.id,
        Some(SessionStatus::Active),
        SessionStatus::Revoked,
    )
    .await
    .expect("guarded update");
    tx.commit().await.expect("commit");
    assert_eq!(updated.expect("row updated").status, SessionStatus::Revoked);

    // guard misses: the row is no longer active
    let mut tx = pool.begin().await.expect("begin");
    let missed = session_repo::update_session_status(
        &mut tx,
        &session.id,
        Some(SessionStatus::Active),
        SessionStatus::Revoked,
    )
    .await
    .expect("guarded update");
    tx.rollback().await.expect("rollback");
    assert!(missed.is_none());

    // unguarded update applies regardless
    let mut tx = pool.begin().await.expect("begin");
    let updated =
        session_repo::update_session_status(&mut tx, &session.id, None, SessionStatus::Pending)
            .await
            .expect("unguarded update");
    tx.commit().await.expect("commit");
    assert_eq!(updated.expect("row updated").status, SessionStatus::Pending);
}

#[tokio::test]
async fn count_active_ignores_other_statuses_and_subjects() {
    let _guard = integration_guard().await;
    let pool = support::test_pool().await;
    support::migrate(&pool).await;

    let subject = support::unique_subject();
    let other = support::unique_subject();
    support::seed_session(&pool, &subject, "a", SessionStatus::Active, 100).await;
    support::seed_session(&pool, &subject, "b", SessionStatus::Pending, 100).await;
    support::seed_session(&pool, &subject, "c", SessionStatus::Revoked, 100).await;
    support::seed_session(&pool, &other, "d", SessionStatus::Active, 100).await;

    let mut tx = pool.begin().await.expect("begin");
    let count = session_repo::count_active_sessions(&mut tx, &subject)
        .await
        .expect("count");
    tx.rollback().await.expect("rollback");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn revoke_session_requires_ownership_only() {
    let _guard = integration_guard().await;
    let pool = support::test_pool().await;
    support::migrate(&pool).await;

    let subject = support::unique_subject();
    let stranger = support::unique_subject();
    let session =
        support::seed_session(&pool, &subject, "laptop", SessionStatus::Pending, 100).await;

    assert!(!session_repo::revoke_session(&pool, &stranger, &session.id)
        .await
        .expect("revoke unowned"));

    assert!(session_repo::revoke_session(&pool, &subject, &session.id)
        .await
        .expect("revoke owned"));

    let found = session_repo::find_session_by_id(&pool, &session.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(found.status, SessionStatus::Revoked);
}

#[tokio::test]
async fn delete_pending_session_leaves_non_pending_rows() {
    let _guard = integration_guard().await;
    let pool = support::test_pool().await;
    support::migrate(&pool).await;

    let subject = support::unique_subject();
    let active = support::seed_session(&pool, &subject, "a", SessionStatus::Active, 100).await;
    let pending = support::seed_session(&pool, &subject, "b", SessionStatus::Pending, 200).await;

    assert!(!session_repo::delete_pending_session(&pool, &subject, &active.id)
        .await
        .expect("delete active"));
    assert!(session_repo::delete_pending_session(&pool, &subject, &pending.id)
        .await
        .expect("delete pending"));

    let sessions = session_repo::list_sessions_for_subject(&pool, &subject)
        .await
        .expect("list");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, active.id);
}

#[tokio::test]
async fn listing_orders_by_issued_at_then_insertion() {
    let _guard = integration_guard().await;
    let pool = support::test_pool().await;
    support::migrate(&pool).await;

    let subject = support::unique_subject();
    support::seed_session(&pool, &subject, "late", SessionStatus::Active, 900).await;
    support::seed_session(&pool, &subject, "tie-1", SessionStatus::Active, 500).await;
    support::seed_session(&pool, &subject, "tie-2", SessionStatus::Active, 500).await;
    support::seed_session(&pool, &subject, "early", SessionStatus::Active, 100).await;

    let sessions = session_repo::list_sessions_for_subject(&pool, &subject)
        .await
        .expect("list");
    let names: Vec<&str> = sessions.iter().map(|s| s.device_name.as_str()).collect();
    assert_eq!(names, vec!["early", "tie-1", "tie-2", "late"]);
    assert!(sessions.windows(2).all(|w| w[0].seq < w[1].seq
        || w[0].issued_at < w[1].issued_at));
}
