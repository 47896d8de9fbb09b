//! Admin utilities: run a background job once, outside its schedule.

use std::{error::Error, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use engine::Ledger;
use migration::MigratorTrait;
use sea_orm::Database;

#[derive(Parser, Debug)]
#[command(name = "kitty_admin")]
#[command(about = "Admin utilities for the household ledger (one-off job runs)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./kitty.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send the periodic balance emails now.
    SendEmails,
    /// Create a database backup now.
    Backup(BackupArgs),
    /// Run the common-value auto-collection now.
    AutoCollect,
}

#[derive(Args, Debug)]
struct BackupArgs {
    #[arg(long, default_value = "backups")]
    backup_dir: PathBuf,
    /// Path of the sqlite database file to dump.
    #[arg(long, default_value = "kitty.db")]
    database_path: PathBuf,
    #[arg(long, default_value = "sqlite3")]
    dump_command: String,
    /// Keep only the newest N backups after a successful run (0 = keep all).
    #[arg(long, default_value_t = 7)]
    keep: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();
    let db = Database::connect(&cli.database_url).await?;
    migration::Migrator::up(&db, None).await?;
    let ledger = Ledger::new(db);

    match cli.command {
        Command::SendEmails => {
            let report = jobs::send_all_emails(&ledger, &jobs::LogMailer).await?;
            println!("{} sent, {} failed", report.sent, report.failed);
            for error in &report.errors {
                eprintln!("{error}");
            }
        }
        Command::Backup(args) => {
            let config = jobs::BackupConfig {
                backup_dir: args.backup_dir.clone(),
                database_path: args.database_path,
                dump_command: args.dump_command,
            };
            let filename = jobs::run_backup(&ledger, &config).await?;
            let pruned = if args.keep > 0 {
                jobs::prune_old_backups(&args.backup_dir, args.keep)?
            } else {
                0
            };
            println!(
                "created {filename}, {} kept, {pruned} pruned",
                jobs::list_backups(&args.backup_dir).len()
            );
        }
        Command::AutoCollect => {
            let outcome = ledger.auto_collect_common().await?;
            println!("{} added, {} skipped", outcome.added, outcome.skipped);
        }
    }

    Ok(())
}
