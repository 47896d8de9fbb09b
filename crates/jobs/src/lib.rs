//! Background services: periodic emails, database backups, and common-value
//! auto-collection, driven by a settings-based scheduler.
//!
//! Each job runs on its own tokio task and opens its own unit of work against
//! the store; nothing here coordinates with in-flight HTTP requests beyond the
//! store's transaction isolation.

use thiserror::Error;

pub use backup::{
    BackupConfig, BackupInfo, build_backup_status_email, list_backups, prune_old_backups,
    run_backup,
};
pub use email::{
    EmailMessage, EmailRunReport, LogMailer, Mailer, build_admin_summary_email, build_user_email,
    send_all_emails,
};
pub use scheduler::Scheduler;

mod backup;
mod email;
mod scheduler;

#[derive(Error, Debug)]
pub enum JobsError {
    #[error(transparent)]
    Ledger(#[from] engine::LedgerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dump command failed: {0}")]
    Dump(String),
    #[error("dump command timed out")]
    DumpTimeout,
}

pub(crate) type ResultJobs<T> = Result<T, JobsError>;
