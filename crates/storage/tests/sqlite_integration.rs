use chrono::Duration;
use quest_core::model::{LevelId, TaskProgress, UserId};
use quest_core::time::fixed_now;
use storage::repository::{NewUserRecord, ProgressRepository, StorageError, UserRepository};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn record(user: u64, level: u32, idx: usize, completed: bool) -> TaskProgress {
    TaskProgress::new(
        UserId::new(user),
        LevelId::new(level),
        idx,
        completed,
        fixed_now(),
    )
}

#[tokio::test]
async fn sqlite_upsert_keeps_one_row_per_task() {
    let repo = connect("memdb_upsert").await;

    repo.upsert_progress(&record(1, 1, 0, false)).await.unwrap();
    let mut latest = record(1, 1, 0, true);
    latest.updated_at = fixed_now() + Duration::minutes(5);
    repo.upsert_progress(&latest).await.unwrap();

    let rows = repo.progress_for_user(UserId::new(1)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], latest);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_progress")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_concurrent_upserts_for_one_task_leave_one_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.db").display());
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(mode, "wal");

    let submissions: Vec<TaskProgress> = (0..16)
        .map(|n| {
            let mut progress = record(1, 1, 0, n % 2 == 0);
            progress.updated_at = fixed_now() + Duration::seconds(n);
            progress
        })
        .collect();

    let handles: Vec<_> = submissions
        .iter()
        .cloned()
        .map(|progress| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.upsert_progress(&progress).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("join").expect("upsert");
    }

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM task_progress WHERE user_id = 1 AND level = 1 AND task_idx = 0",
    )
    .fetch_one(repo.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);

    let stored = repo
        .get_progress(UserId::new(1), LevelId::new(1), 0)
        .await
        .unwrap()
        .expect("row exists");
    assert!(submissions.contains(&stored));

    let last = record(1, 1, 0, false);
    repo.upsert_progress(&last).await.unwrap();
    assert_eq!(
        repo.get_progress(UserId::new(1), LevelId::new(1), 0)
            .await
            .unwrap(),
        Some(last)
    );
}

#[tokio::test]
async fn sqlite_progress_queries_are_ordered_and_scoped() {
    let repo = connect("memdb_scoped").await;

    repo.upsert_progress(&record(1, 2, 1, true)).await.unwrap();
    repo.upsert_progress(&record(1, 1, 1, false)).await.unwrap();
    repo.upsert_progress(&record(1, 1, 0, true)).await.unwrap();
    repo.upsert_progress(&record(2, 1, 0, true)).await.unwrap();

    let all = repo.progress_for_user(UserId::new(1)).await.unwrap();
    let keys: Vec<(u32, usize)> = all.iter().map(|p| (p.level.value(), p.task_idx)).collect();
    assert_eq!(keys, vec![(1, 0), (1, 1), (2, 1)]);

    let level_one = repo
        .progress_for_level(UserId::new(1), LevelId::new(1))
        .await
        .unwrap();
    assert_eq!(level_one.len(), 2);
    assert!(level_one[0].completed);
    assert!(!level_one[1].completed);

    let missing = repo
        .get_progress(UserId::new(2), LevelId::new(2), 1)
        .await
        .unwrap();
    assert!(missing.is_none());
    let found = repo
        .get_progress(UserId::new(1), LevelId::new(2), 1)
        .await
        .unwrap();
    assert_eq!(found, Some(record(1, 2, 1, true)));
}

#[tokio::test]
async fn sqlite_users_are_unique_by_username() {
    let repo = connect("memdb_users").await;
    let new = NewUserRecord {
        username: "alice".into(),
        password_hash: "hash".into(),
        created_at: fixed_now(),
    };

    let id = repo.insert_user(new.clone()).await.unwrap();
    let err = repo.insert_user(new).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let by_name = repo.find_by_username("alice").await.unwrap().unwrap();
    assert_eq!(by_name.id, id);
    assert_eq!(by_name.password_hash, "hash");
    assert_eq!(repo.get_user(id).await.unwrap(), Some(by_name));
    assert!(repo.find_by_username("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(versions, 1);
}
