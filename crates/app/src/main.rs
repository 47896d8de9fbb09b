use std::{path::PathBuf, sync::Arc, time::Duration};

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

const DB_CONNECT_ATTEMPTS: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "kitty={level},server={level},engine={level},jobs={level}",
            level = settings.app.level
        ))
        .init();

    let db = match connect_database(&settings.database).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!("failed to initialize database: {err}");
            return Err(err.into());
        }
    };
    let ledger = engine::Ledger::new(db);

    if let Some(server) = settings.server {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            tracing::info!("Found server settings...");
            let upload_dir =
                PathBuf::from(server.upload_dir.unwrap_or_else(|| "uploads".to_string()));
            let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
            let addr = format!("{}:{}", bind, server.port);
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind server listener: {err}");
                    return;
                }
            };
            if let Err(err) = server::run_with_listener(ledger, upload_dir, listener).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    if let Some(jobs) = settings.jobs {
        let database_path = match &settings.database {
            Database::Sqlite(path) => PathBuf::from(path),
            Database::Memory => {
                tracing::warn!("backups are unavailable for an in-memory database");
                PathBuf::new()
            }
        };
        let backup = jobs::BackupConfig {
            backup_dir: PathBuf::from(jobs.backup_dir),
            database_path,
            dump_command: jobs.dump_command.unwrap_or_else(|| "sqlite3".to_string()),
        };
        let scheduler = jobs::Scheduler::new(ledger, Arc::new(jobs::LogMailer), backup);
        tasks.spawn(async move {
            tracing::info!("Found jobs settings...");
            scheduler.run().await;
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

/// Connects and migrates, retrying with exponential backoff while the store
/// comes up.
async fn connect_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, sea_orm::DbErr> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let mut attempt = 1;
    loop {
        match try_connect(&url).await {
            Ok(database) => return Ok(database),
            Err(err) if attempt < DB_CONNECT_ATTEMPTS => {
                let delay = Duration::from_secs(1 << (attempt - 1));
                tracing::warn!(
                    "DB not ready, retrying in {}s... ({attempt}/{DB_CONNECT_ATTEMPTS}): {err}",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(
                    "could not connect to database after {DB_CONNECT_ATTEMPTS} attempts"
                );
                return Err(err);
            }
        }
    }
}

async fn try_connect(url: &str) -> Result<sea_orm::DatabaseConnection, sea_orm::DbErr> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
