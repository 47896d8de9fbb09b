//! The backup service: timestamped SQL dumps plus pruning and listing.
//!
//! The dump itself is produced by an external command (`sqlite3 <db> .dump` by
//! default), bounded only by a fixed process timeout; there is no cancellation
//! or retry. Failed runs remove the partial file.

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use engine::Ledger;

use crate::{JobsError, ResultJobs, email::apply_template};

const DUMP_TIMEOUT: Duration = Duration::from_secs(300);

const BACKUP_PREFIX: &str = "ledger_backup_";
const BACKUP_SUFFIX: &str = ".sql";

#[derive(Clone, Debug)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    pub database_path: PathBuf,
    /// Dump command invoked as `<command> <database_path> .dump`.
    pub dump_command: String,
}

#[derive(Clone, Debug)]
pub struct BackupInfo {
    pub filename: String,
    pub size: u64,
    pub modified: SystemTime,
}

fn is_backup_file(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX)
        && name.ends_with(BACKUP_SUFFIX)
        && name.len() > BACKUP_PREFIX.len() + BACKUP_SUFFIX.len()
}

/// Creates a full SQL dump in the backup dir. Returns the filename.
pub async fn run_backup(ledger: &Ledger, config: &BackupConfig) -> ResultJobs<String> {
    let debug = ledger.setting_bool("backup_debug", false).await?;

    let ts = ledger.now_local().await?.format("%Y_%m_%d_%H-%M-%S");
    let filename = format!("{BACKUP_PREFIX}{ts}{BACKUP_SUFFIX}");
    let dest = config.backup_dir.join(&filename);
    std::fs::create_dir_all(&config.backup_dir)?;

    let command = tokio::process::Command::new(&config.dump_command)
        .arg(&config.database_path)
        .arg(".dump")
        .output();
    let output = match tokio::time::timeout(DUMP_TIMEOUT, command).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            if debug {
                ledger
                    .log_backup("ERROR", &format!("dump command failed to start: {err}"))
                    .await?;
            }
            return Err(err.into());
        }
        Err(_) => {
            if debug {
                ledger.log_backup("ERROR", "dump command timed out").await?;
            }
            return Err(JobsError::DumpTimeout);
        }
    };

    if !output.status.success() {
        let err: String = String::from_utf8_lossy(&output.stderr)
            .chars()
            .take(300)
            .collect();
        if debug {
            ledger
                .log_backup("ERROR", &format!("dump failed: {err}"))
                .await?;
        }
        return Err(JobsError::Dump(err));
    }
    if debug {
        ledger.log_backup("INFO", "SQL dump created").await?;
    }

    if let Err(err) = std::fs::write(&dest, &output.stdout) {
        let _ = std::fs::remove_file(&dest);
        if debug {
            ledger.log_backup("ERROR", &err.to_string()).await?;
        }
        return Err(err.into());
    }

    if debug {
        ledger
            .log_backup("SUCCESS", &format!("Backup created: {filename}"))
            .await?;
    }
    tracing::info!(filename = %filename, "backup created");
    Ok(filename)
}

/// Backup files in the dir, newest first.
pub fn list_backups(dir: &Path) -> Vec<BackupInfo> {
    let mut backups = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return backups;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_backup_file(&name) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        backups.push(BackupInfo {
            filename: name,
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    // Timestamped names sort chronologically.
    backups.sort_by(|a, b| b.filename.cmp(&a.filename));
    backups
}

/// Deletes the oldest backups, keeping only the most recent `keep` files.
/// Returns how many were removed.
pub fn prune_old_backups(dir: &Path, keep: usize) -> std::io::Result<u64> {
    if keep == 0 {
        return Ok(0);
    }
    let mut backups = list_backups(dir);
    // Oldest last after the newest-first sort.
    let mut pruned = 0;
    while backups.len() > keep {
        if let Some(oldest) = backups.pop() {
            std::fs::remove_file(dir.join(&oldest.filename))?;
            pruned += 1;
        }
    }
    Ok(pruned)
}

/// Builds the backup status report email.
pub async fn build_backup_status_email(
    ledger: &Ledger,
    ok: bool,
    result: &str,
    kept: usize,
    pruned: u64,
) -> ResultJobs<String> {
    let grad_start = ledger.template("color_email_grad_start").await?;
    let grad_end = ledger.template("color_email_grad_end").await?;
    let date = ledger
        .now_local()
        .await?
        .format("%Y-%m-%d %H:%M")
        .to_string();
    let footer = apply_template(
        &ledger.template("tpl_backup_footer").await?,
        &[("Date", date.clone())],
    );
    let footer_html = if footer.trim().is_empty() {
        String::new()
    } else {
        format!("<p>{footer}</p>")
    };

    let (status_color, status_icon, status_text) = if ok {
        ("#28a745", "\u{2714}", "Backup completed successfully")
    } else {
        ("#dc3545", "\u{2718}", "Backup failed")
    };
    let detail_rows = if ok {
        let mut rows = format!(
            r#"
            <tr><td style="padding:8px;color:#6c757d;width:140px;">File</td>
                <td style="padding:8px;font-family:monospace;">{result}</td></tr>
            <tr><td style="padding:8px;color:#6c757d;">Backups kept</td>
                <td style="padding:8px;">{kept}</td></tr>"#
        );
        if pruned > 0 {
            rows.push_str(&format!(
                r#"
            <tr><td style="padding:8px;color:#6c757d;">Pruned</td>
                <td style="padding:8px;">{pruned} old backup(s) deleted</td></tr>"#
            ));
        }
        rows
    } else {
        format!(
            r#"
            <tr><td style="padding:8px;color:#6c757d;width:140px;">Error</td>
                <td style="padding:8px;color:#dc3545;">{result}</td></tr>"#
        )
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; line-height:1.6; color:#333; max-width:600px; margin:0 auto; padding:20px;">
    <div style="background:linear-gradient(135deg,{grad_start} 0%,{grad_end} 100%); color:white; padding:30px; border-radius:10px 10px 0 0; text-align:center;">
        <h1 style="margin:0; font-size:28px;">Household Ledger</h1>
        <p style="margin:10px 0 0 0; opacity:0.9;">Scheduled Backup Report - {date}</p>
    </div>
    <div style="background:white; padding:30px; border:1px solid #dee2e6; border-top:none; border-radius:0 0 10px 10px;">
        <div style="background:#f8f9fa; padding:16px 20px; border-radius:8px; margin-bottom:24px; border-left:4px solid {status_color};">
            <span style="font-size:1.1em; font-weight:bold; color:{status_color};">{status_icon} {status_text}</span>
        </div>
        <table style="width:100%; border-collapse:collapse; font-size:0.95em;">
            <tbody>{detail_rows}
            </tbody>
        </table>
        <div style="margin-top:24px; padding-top:16px; border-top:1px solid #dee2e6; text-align:center; color:#6c757d; font-size:13px;">
            {footer_html}
        </div>
    </div>
</body>
</html>"#
    ))
}
