mod common;

use common::TestApp;
use latchkey_server::adapters::database::session_repo::PgSessionRepository;
use latchkey_server::adapters::database::user_repo::PgUserRepository;
use latchkey_server::domain::password_reset::PendingReset;
use latchkey_server::error::AppError;
use latchkey_server::services::ports::{SessionRepository, UserRepository};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

fn unique_username() -> String {
    format!("user-{}@example.com", Uuid::new_v4())
}

/// Fixed whole-second instant; TIMESTAMPTZ keeps microseconds only.
fn at(unix: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(unix).unwrap()
}

const NOW: i64 = 1_900_000_000;

#[tokio::test]
async fn test_insert_rejects_duplicate_username() {
    let Some(pool) = common::get_test_pool().await else { return };
    let users = PgUserRepository::new(pool);
    let username = unique_username();

    let created = users.insert(&username, "hash-1", at(NOW)).await.unwrap();
    assert_eq!(created.username, username);
    assert!(created.pending_reset().is_none());

    let err = users.insert(&username, "hash-2", at(NOW)).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateIdentity), "got {err:?}");

    let stored = users.find_by_username(&username).await.unwrap().unwrap();
    assert_eq!(stored.id, created.id);
}

#[tokio::test]
async fn test_reissue_invalidates_previous_token() {
    let Some(pool) = common::get_test_pool().await else { return };
    let users = PgUserRepository::new(pool);
    let username = unique_username();
    users.insert(&username, "hash", at(NOW)).await.unwrap();

    let first = PendingReset::generate(at(NOW + 3600));
    users.set_reset_token(&username, &first).await.unwrap();
    let second = PendingReset::generate(at(NOW + 7200));
    users.set_reset_token(&username, &second).await.unwrap();

    assert!(users.find_by_valid_reset_token(first.token(), at(NOW)).await.unwrap().is_none());
    assert!(users.complete_reset(first.token(), "new-hash", at(NOW)).await.unwrap().is_none());

    let found = users.find_by_valid_reset_token(second.token(), at(NOW)).await.unwrap().unwrap();
    assert_eq!(found.username, username);
    assert_eq!(found.pending_reset().map(PendingReset::expires_at), Some(at(NOW + 7200)));
}

#[tokio::test]
async fn test_complete_reset_succeeds_just_before_expiry() {
    let Some(pool) = common::get_test_pool().await else { return };
    let users = PgUserRepository::new(pool);
    let username = unique_username();
    users.insert(&username, "old-hash", at(NOW)).await.unwrap();

    let reset = PendingReset::generate(at(NOW + 3600));
    users.set_reset_token(&username, &reset).await.unwrap();

    let updated = users.complete_reset(reset.token(), "new-hash", at(NOW + 3599)).await.unwrap().unwrap();
    assert_eq!(updated.username, username);
    assert!(updated.pending_reset().is_none());

    // Single use: the token was cleared by the first redemption.
    assert!(users.complete_reset(reset.token(), "other-hash", at(NOW + 3599)).await.unwrap().is_none());
    let stored = users.find_by_username(&username).await.unwrap().unwrap();
    assert!(stored.pending_reset().is_none());
}

#[tokio::test]
async fn test_complete_reset_fails_at_expiry_instant() {
    let Some(pool) = common::get_test_pool().await else { return };
    let users = PgUserRepository::new(pool);
    let username = unique_username();
    users.insert(&username, "old-hash", at(NOW)).await.unwrap();

    let reset = PendingReset::generate(at(NOW + 3600));
    users.set_reset_token(&username, &reset).await.unwrap();

    assert!(users.find_by_valid_reset_token(reset.token(), at(NOW + 3600)).await.unwrap().is_none());
    assert!(users.complete_reset(reset.token(), "new-hash", at(NOW + 3600)).await.unwrap().is_none());

    // The expired token is still stored; nothing was written.
    let stored = users.find_by_username(&username).await.unwrap().unwrap();
    assert!(stored.pending_reset().is_some_and(|pending| pending.matches(reset.token())));
}

#[tokio::test]
async fn test_password_update_leaves_pending_token() {
    let Some(pool) = common::get_test_pool().await else { return };
    let users = PgUserRepository::new(pool);
    let username = unique_username();
    users.insert(&username, "old-hash", at(NOW)).await.unwrap();

    let reset = PendingReset::generate(at(NOW + 3600));
    users.set_reset_token(&username, &reset).await.unwrap();
    users.update_password_hash(&username, "new-hash").await.unwrap();

    let stored = users.find_by_valid_reset_token(reset.token(), at(NOW)).await.unwrap().unwrap();
    assert_eq!(stored.username, username);

    users.clear_reset_token(&username).await.unwrap();
    assert!(users.find_by_valid_reset_token(reset.token(), at(NOW)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_updates_for_unknown_user_report_not_found() {
    let Some(pool) = common::get_test_pool().await else { return };
    let users = PgUserRepository::new(pool);
    let username = unique_username();

    let err = users.update_password_hash(&username, "hash").await.unwrap_err();
    assert!(matches!(err, AppError::UserNotFound));
    let err = users.set_reset_token(&username, &PendingReset::generate(at(NOW))).await.unwrap_err();
    assert!(matches!(err, AppError::UserNotFound));
}

#[tokio::test]
async fn test_schema_rejects_token_without_expiry() {
    let Some(pool) = common::get_test_pool().await else { return };
    let users = PgUserRepository::new(pool.clone());
    let username = unique_username();
    users.insert(&username, "hash", at(NOW)).await.unwrap();

    let err = sqlx::query("UPDATE users SET reset_token = 'abc' WHERE username = $1")
        .bind(&username)
        .execute(&pool)
        .await
        .unwrap_err();
    let constraint = err.as_database_error().and_then(|e| e.constraint().map(ToString::to_string));
    assert_eq!(constraint.as_deref(), Some("users_reset_token_pair"));

    let stored = users.find_by_username(&username).await.unwrap().unwrap();
    assert!(stored.pending_reset().is_none());
}

#[tokio::test]
async fn test_session_repository_lifecycle() {
    let Some(pool) = common::get_test_pool().await else { return };
    let users = PgUserRepository::new(pool.clone());
    let sessions = PgSessionRepository::new(pool);
    let owner = users.insert(&unique_username(), "hash", at(NOW)).await.unwrap();
    let stranger = users.insert(&unique_username(), "hash", at(NOW)).await.unwrap();

    // Far in the past so the sweep below cannot touch other tests' sessions.
    let base = 1_000_000_000;
    let live = format!("live-{}", Uuid::new_v4());
    let stale = format!("stale-{}", Uuid::new_v4());
    sessions.create(&live, owner.id, at(base + 3600)).await.unwrap();
    sessions.create(&stale, owner.id, at(base)).await.unwrap();

    assert_eq!(sessions.find_user(&live, at(base)).await.unwrap(), Some(owner.id));
    assert_eq!(sessions.find_user(&stale, at(base)).await.unwrap(), None);

    assert!(sessions.delete_expired(at(base)).await.unwrap() >= 1);
    assert_eq!(sessions.find_user(&stale, at(base - 1)).await.unwrap(), None);
    assert_eq!(sessions.find_user(&live, at(base)).await.unwrap(), Some(owner.id));

    sessions.delete_owned(&live, stranger.id).await.unwrap();
    assert_eq!(sessions.find_user(&live, at(base)).await.unwrap(), Some(owner.id));
    sessions.delete_owned(&live, owner.id).await.unwrap();
    assert_eq!(sessions.find_user(&live, at(base)).await.unwrap(), None);
}

#[tokio::test]
async fn test_reset_flow_over_http_with_postgres() {
    let Some(pool) = common::get_test_pool().await else { return };
    let app = TestApp::spawn_with_database(common::get_test_config(), pool).await;
    let username = unique_username();

    assert_eq!(app.register(&username, "pw1").await.status(), 201);
    assert_eq!(app.register(&username, "pw1").await.status(), 409);

    assert_eq!(app.request_reset(&username).await.status(), 202);
    let stale = app.mailer.last_reset_token();
    assert_eq!(app.request_reset(&username).await.status(), 202);
    let token = app.mailer.last_reset_token();
    assert_eq!(app.check_reset(&stale).await.status(), 400);

    app.clock.advance(Duration::seconds(3599));
    assert_eq!(app.check_reset(&token).await.status(), 200);
    app.clock.advance(Duration::seconds(1));
    assert_eq!(app.check_reset(&token).await.status(), 400);
    assert_eq!(app.complete_reset(&token, "pw2", "pw2").await.status(), 400);

    assert_eq!(app.request_reset(&username).await.status(), 202);
    let token = app.mailer.last_reset_token();
    assert_eq!(app.complete_reset(&token, "pw2", "pw2").await.status(), 200);
    assert_eq!(app.complete_reset(&token, "pw3", "pw3").await.status(), 400);

    assert_eq!(app.login(&username, "pw1").await.status(), 401);
    let session = app.login_token(&username, "pw2").await;
    let resp = app
        .client
        .delete(format!("{}/v1/sessions", app.server_url))
        .bearer_auth(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
}
