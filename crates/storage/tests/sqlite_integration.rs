use progress_core::model::{Badge, CompletionKind, ItemId, Progress, RecordId, UserId, UserProfile};
use progress_core::rules::apply_completion;
use chrono::{DateTime, Utc};
use progress_core::time::{fixed_clock, fixed_now};
use storage::auth::{AuthBackend, AuthError};
use storage::repository::{LocalCache, ProfileRepository, ProgressRepository, StorageError};
use storage::sqlite::{SqliteAuth, SqliteRepository};

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn connect_cache(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate_cache().await.expect("migrate cache");
    repo
}

async fn table_exists(repo: &SqliteRepository, table: &str) -> bool {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .bind(table)
        .fetch_one(repo.pool())
        .await
        .unwrap()
        > 0
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

#[tokio::test]
async fn sqlite_progress_round_trip() {
    let repo = connect("memdb_progress_roundtrip").await;

    let record_id = repo.create(&Progress::new(user("u-1"))).await.unwrap();
    let stored = repo.find_by_user(&user("u-1")).await.unwrap().expect("stored");
    assert_eq!(stored.record_id(), Some(&record_id));
    assert_eq!(stored.total_xp(), 0);

    let mut progress = stored;
    for i in 0..10 {
        let item = ItemId::new(format!("t-{i}")).unwrap();
        progress = apply_completion(&progress, CompletionKind::Tutorial, &item).progress;
    }
    repo.update(&record_id, &progress).await.unwrap();

    let refreshed = repo.find_by_user(&user("u-1")).await.unwrap().unwrap();
    assert_eq!(refreshed.completed_tutorials().len(), 10);
    assert_eq!(refreshed.total_xp(), 500);
    assert!(refreshed.has_badge(Badge::FirstSteps));
    assert!(refreshed.has_badge(Badge::DedicatedLearner));
    assert!(refreshed.has_badge(Badge::XpCollector));
    assert_eq!(refreshed, progress);
}

#[tokio::test]
async fn sqlite_progress_is_unique_per_user() {
    let repo = connect("memdb_progress_unique").await;
    repo.create(&Progress::new(user("u-1"))).await.unwrap();
    let err = repo.create(&Progress::new(user("u-1"))).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_update_missing_record_is_not_found() {
    let repo = connect("memdb_progress_missing").await;
    let err = repo
        .update(&RecordId::new("nope").unwrap(), &Progress::new(user("u-1")))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
    assert!(repo.find_by_user(&user("u-1")).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_profiles_round_trip() {
    let repo = connect("memdb_profiles").await;

    let profile = UserProfile {
        user_id: user("u-1"),
        display_name: "Grace".into(),
        email: "grace@example.com".into(),
        created_at: fixed_now(),
    };
    repo.create_profile(&profile).await.unwrap();
    assert_eq!(repo.get_profile(&user("u-1")).await.unwrap(), Some(profile));
    assert_eq!(repo.get_profile(&user("u-2")).await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_cache_database_holds_only_cache_table() {
    let cache = connect_cache("memdb_cache_only").await;

    assert_eq!(cache.get("progress_u-1").await.unwrap(), None);
    cache.set("progress_u-1", "{}").await.unwrap();
    cache.set("progress_u-1", r#"{"userId":"u-1"}"#).await.unwrap();
    assert_eq!(
        cache.get("progress_u-1").await.unwrap().as_deref(),
        Some(r#"{"userId":"u-1"}"#)
    );

    assert!(table_exists(&cache, "local_cache").await);
    for remote_table in ["user_progress", "user_profiles", "accounts", "sessions", "schema_migrations"] {
        assert!(!table_exists(&cache, remote_table).await, "{remote_table} in cache db");
    }

    // Re-running is a no-op.
    cache.migrate_cache().await.unwrap();
}

#[tokio::test]
async fn sqlite_writes_are_stamped_by_injected_clock() {
    let repo = connect("memdb_clock").await.with_clock(fixed_clock());

    let record_id = repo.create(&Progress::new(user("u-1"))).await.unwrap();
    repo.update(&record_id, &Progress::new(user("u-1"))).await.unwrap();
    let updated_at: DateTime<Utc> =
        sqlx::query_scalar("SELECT updated_at FROM user_progress WHERE record_id = ?1")
            .bind(record_id.as_str())
            .fetch_one(repo.pool())
            .await
            .unwrap();
    assert_eq!(updated_at, fixed_now());

    let cache = connect_cache("memdb_clock_cache").await.with_clock(fixed_clock());
    cache.set("progress_u-1", "{}").await.unwrap();
    let cached_at: DateTime<Utc> =
        sqlx::query_scalar("SELECT updated_at FROM local_cache WHERE key = 'progress_u-1'")
            .fetch_one(cache.pool())
            .await
            .unwrap();
    assert_eq!(cached_at, fixed_now());
}

#[tokio::test]
async fn sqlite_auth_session_lifecycle() {
    let repo = connect("memdb_auth").await;
    let auth = SqliteAuth::new(repo.clone());

    let created = auth
        .create_account("Grace@Example.com", "cobol-rules", "Grace")
        .await
        .unwrap();
    assert!(matches!(
        auth.create_account("grace@example.com", "other-pass", "G").await,
        Err(AuthError::AccountExists)
    ));

    assert!(matches!(auth.current_user().await, Err(AuthError::NoSession)));
    assert!(matches!(
        auth.create_session("grace@example.com", "wrong-pass").await,
        Err(AuthError::InvalidCredentials)
    ));

    auth.create_session("grace@example.com", "cobol-rules").await.unwrap();
    assert_eq!(auth.current_user().await.unwrap(), created);

    // A second handle does not share the first handle's session.
    let other = SqliteAuth::new(repo);
    assert!(matches!(other.current_user().await, Err(AuthError::NoSession)));

    auth.delete_current_session().await.unwrap();
    assert!(matches!(auth.current_user().await, Err(AuthError::NoSession)));
}
