use std::path::Path;

use anyhow::{Context, Result};
use chatline_auth::Identity;
use chatline_config::AppConfig;
use chatline_realtime::ServerEvent;
use chatline_runtime::BackendServices;
use sqlx::Row;
use tempfile::TempDir;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'messages') ORDER BY name",
    )
    .fetch_all(&services.db_pool)
    .await?;

    assert_eq!(tables, vec!["messages".to_string(), "users".to_string()]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_wires_store_into_hub() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("wired.db")), 2);
    let services = initialise(&config).await?;

    let identity = Identity {
        user_id: 1,
        email: "ops@example.com".into(),
        name: None,
    };
    let (_handle, mut rx) = services.hub.connect(identity.clone())?;
    let message = services.hub.send_message("wired", &identity).await?;

    assert_eq!(services.messages.count().await?, 1);
    let mut saw_message = false;
    while let Ok(event) = rx.try_recv() {
        saw_message |= event == ServerEvent::NewMessage(message.clone());
    }
    assert!(saw_message, "hub should broadcast persisted messages");

    assert_eq!(services.hub.shutdown()?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_fails_for_unreachable_database_path() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file")?;
    let config = build_config(sqlite_url(&blocker.join("chat.db")), 1);

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected initialisation to fail beneath a regular file"),
        Err(error) => error,
    };
    let message = format!("{error:?}");
    assert!(
        message.contains("failed to prepare database"),
        "expected database preparation context, got {message}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_creates_sqlite_directory_if_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_dir = temp_dir.path().join("nested");
    let config = build_config(sqlite_url(&db_dir.join("prepared.db")), 2);

    assert!(!db_dir.exists());

    let _services = initialise(&config).await?;
    assert!(db_dir.exists(), "database directory should be created");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_enables_sqlite_foreign_keys() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("runtime/fk.db")), 2);

    let services = initialise(&config).await?;

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(1, enabled, "foreign key enforcement must be enabled");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_applies_max_connections_setting() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let max_connections = 3;
    let config = build_config(
        sqlite_url(&temp_dir.path().join("runtime/max_conn.db")),
        max_connections,
    );

    let services = initialise(&config).await?;
    assert_eq!(
        max_connections,
        services.db_pool.options().get_max_connections()
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_database_creates_no_file() -> Result<()> {
    let config = build_config("sqlite://:memory:".into(), 1);
    let services = initialise(&config).await?;

    let databases = sqlx::query("PRAGMA database_list")
        .fetch_all(&services.db_pool)
        .await?;
    let main_db = databases
        .into_iter()
        .find(|row| {
            row.try_get::<String, _>("name")
                .map(|name| name == "main")
                .unwrap_or(false)
        })
        .context("expected main in PRAGMA database_list")?;
    let file: String = main_db.try_get("file")?;
    assert!(file.is_empty(), "in-memory database should not touch the filesystem");
    Ok(())
}
