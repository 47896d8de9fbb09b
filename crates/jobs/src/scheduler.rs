//! Settings-driven job scheduling.
//!
//! Each job runs a loop on its own tokio task: read the schedule settings,
//! sleep until the next local occurrence, re-check the enabled flag, run.
//! Settings edits take effect at the next wakeup; while a job is disabled its
//! loop polls every few minutes instead of sleeping a whole period.

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use engine::Ledger;

use crate::{
    BackupConfig, ResultJobs,
    backup::{build_backup_status_email, list_backups, prune_old_backups, run_backup},
    email::{EmailMessage, Mailer, apply_template, send_all_emails},
};

const DISABLED_POLL: StdDuration = StdDuration::from_secs(300);

struct ScheduleKeys {
    enabled: &'static str,
    day: &'static str,
    hour: &'static str,
    minute: &'static str,
    default_day: &'static str,
    default_hour: i64,
}

const EMAIL_SCHEDULE: ScheduleKeys = ScheduleKeys {
    enabled: "schedule_enabled",
    day: "schedule_day",
    hour: "schedule_hour",
    minute: "schedule_minute",
    default_day: "mon",
    default_hour: 9,
};

const COMMON_SCHEDULE: ScheduleKeys = ScheduleKeys {
    enabled: "common_auto_enabled",
    day: "common_auto_day",
    hour: "common_auto_hour",
    minute: "common_auto_minute",
    default_day: "*",
    default_hour: 2,
};

const BACKUP_SCHEDULE: ScheduleKeys = ScheduleKeys {
    enabled: "backup_enabled",
    day: "backup_day",
    hour: "backup_hour",
    minute: "backup_minute",
    default_day: "*",
    default_hour: 3,
};

struct JobSchedule {
    enabled: bool,
    day: String,
    hour: u32,
    minute: u32,
    tz: Tz,
}

async fn load_schedule(ledger: &Ledger, keys: &ScheduleKeys) -> ResultJobs<JobSchedule> {
    Ok(JobSchedule {
        enabled: ledger.setting_bool(keys.enabled, false).await?,
        day: ledger.setting(keys.day, keys.default_day).await?,
        hour: ledger
            .setting_i64(keys.hour, keys.default_hour)
            .await?
            .clamp(0, 23) as u32,
        minute: ledger.setting_i64(keys.minute, 0).await?.clamp(0, 59) as u32,
        tz: ledger.timezone().await?,
    })
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

fn day_matches(spec: &str, weekday: Weekday) -> bool {
    spec == "*" || spec.eq_ignore_ascii_case(weekday_name(weekday))
}

/// Next strictly-future occurrence of `day_spec hour:minute` in local time.
pub(crate) fn next_occurrence(
    now: DateTime<Tz>,
    day_spec: &str,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    for offset in 0..=7 {
        let date = now.date_naive() + Duration::days(offset);
        if !day_matches(day_spec, date.weekday()) {
            continue;
        }
        let Some(naive) = date.and_hms_opt(hour, minute, 0) else {
            continue;
        };
        // DST gaps skip the slot for that day.
        let Some(candidate) = tz.from_local_datetime(&naive).earliest() else {
            continue;
        };
        if candidate > now {
            return Some(candidate);
        }
    }
    None
}

/// Sleeps until the job's next occurrence; returns false when the job is
/// disabled or has no valid slot (after a short poll sleep).
async fn wait_for_slot(ledger: &Ledger, keys: &ScheduleKeys) -> bool {
    let schedule = match load_schedule(ledger, keys).await {
        Ok(schedule) => schedule,
        Err(err) => {
            tracing::error!("failed to load schedule settings: {err}");
            tokio::time::sleep(DISABLED_POLL).await;
            return false;
        }
    };
    if !schedule.enabled {
        tokio::time::sleep(DISABLED_POLL).await;
        return false;
    }

    let now = Utc::now().with_timezone(&schedule.tz);
    let Some(next) = next_occurrence(now, &schedule.day, schedule.hour, schedule.minute) else {
        tokio::time::sleep(DISABLED_POLL).await;
        return false;
    };
    let wait = (next - now).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;

    // Settings may have changed while sleeping.
    matches!(ledger.setting_bool(keys.enabled, false).await, Ok(true))
}

async fn email_job(ledger: Ledger, mailer: Arc<dyn Mailer>) {
    loop {
        if !wait_for_slot(&ledger, &EMAIL_SCHEDULE).await {
            continue;
        }
        match send_all_emails(&ledger, mailer.as_ref()).await {
            Ok(report) => {
                tracing::info!(sent = report.sent, failed = report.failed, "email job ran");
            }
            Err(err) => tracing::error!("email job failed: {err}"),
        }
    }
}

async fn common_job(ledger: Ledger) {
    loop {
        if !wait_for_slot(&ledger, &COMMON_SCHEDULE).await {
            continue;
        }
        if let Err(err) = ledger.auto_collect_common().await {
            tracing::error!("auto-collect job failed: {err}");
        }
    }
}

async fn send_backup_report(
    ledger: &Ledger,
    mailer: &dyn Mailer,
    ok: bool,
    result: &str,
    kept: usize,
    pruned: u64,
) -> ResultJobs<()> {
    let admin_id = ledger.setting("site_admin_id", "").await?;
    let Ok(id) = admin_id.trim().parse::<i32>() else {
        return Ok(());
    };
    let Ok(admin) = ledger.user(id).await else {
        return Ok(());
    };

    let date = ledger.now_local().await?.format("%Y-%m-%d").to_string();
    let subject = apply_template(
        &ledger.template("tpl_backup_subject").await?,
        &[
            ("Date", date),
            (
                "BackupStatus",
                if ok { "Success" } else { "Failed" }.to_string(),
            ),
        ],
    );
    let html = build_backup_status_email(ledger, ok, result, kept, pruned).await?;
    if let Err(err) = mailer.send(&EmailMessage {
        to_email: admin.email,
        to_name: admin.name,
        subject,
        html,
    }) {
        tracing::error!("backup report email failed: {err}");
    }
    Ok(())
}

async fn backup_job(ledger: Ledger, mailer: Arc<dyn Mailer>, config: BackupConfig) {
    loop {
        if !wait_for_slot(&ledger, &BACKUP_SCHEDULE).await {
            continue;
        }

        let (ok, result, pruned) = match run_backup(&ledger, &config).await {
            Ok(filename) => {
                let keep = ledger.setting_i64("backup_keep", 7).await.unwrap_or(7);
                let pruned = if keep > 0 {
                    prune_old_backups(&config.backup_dir, keep as usize).unwrap_or(0)
                } else {
                    0
                };
                (true, filename, pruned)
            }
            Err(err) => {
                tracing::error!("backup job failed: {err}");
                (false, err.to_string(), 0)
            }
        };

        match ledger.setting_bool("backup_admin_email", false).await {
            Ok(true) => {
                let kept = list_backups(&config.backup_dir).len();
                if let Err(err) =
                    send_backup_report(&ledger, mailer.as_ref(), ok, &result, kept, pruned).await
                {
                    tracing::error!("backup report failed: {err}");
                }
            }
            Ok(false) => {}
            Err(err) => tracing::error!("failed to read backup report setting: {err}"),
        }
    }
}

/// Owns the background job tasks. Handles are dependency-injected; there is no
/// global scheduler singleton.
pub struct Scheduler {
    ledger: Ledger,
    mailer: Arc<dyn Mailer>,
    backup: BackupConfig,
}

impl Scheduler {
    pub fn new(ledger: Ledger, mailer: Arc<dyn Mailer>, backup: BackupConfig) -> Self {
        Self {
            ledger,
            mailer,
            backup,
        }
    }

    /// Runs all job loops until the process exits.
    pub async fn run(self) {
        let mut tasks = tokio::task::JoinSet::new();
        tasks.spawn(email_job(self.ledger.clone(), self.mailer.clone()));
        tasks.spawn(common_job(self.ledger.clone()));
        tasks.spawn(backup_job(self.ledger, self.mailer, self.backup));
        while tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(tz: Tz, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        tz.from_local_datetime(
            &NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn same_day_later_slot() {
        let tz = chrono_tz::UTC;
        // 2026-01-05 is a Monday.
        let now = at(tz, 2026, 1, 5, 8, 0);
        let next = next_occurrence(now, "mon", 9, 0).unwrap();
        assert_eq!(next, at(tz, 2026, 1, 5, 9, 0));
    }

    #[test]
    fn same_day_slot_passed_rolls_a_week() {
        let tz = chrono_tz::UTC;
        let now = at(tz, 2026, 1, 5, 9, 30);
        let next = next_occurrence(now, "mon", 9, 0).unwrap();
        assert_eq!(next, at(tz, 2026, 1, 12, 9, 0));
    }

    #[test]
    fn wildcard_fires_tomorrow_when_passed() {
        let tz = chrono_tz::UTC;
        let now = at(tz, 2026, 1, 5, 3, 30);
        let next = next_occurrence(now, "*", 3, 0).unwrap();
        assert_eq!(next, at(tz, 2026, 1, 6, 3, 0));
    }

    #[test]
    fn exact_slot_is_not_reused() {
        let tz = chrono_tz::UTC;
        let now = at(tz, 2026, 1, 5, 9, 0);
        let next = next_occurrence(now, "*", 9, 0).unwrap();
        assert_eq!(next, at(tz, 2026, 1, 6, 9, 0));
    }

    #[test]
    fn respects_timezone() {
        let tz: Tz = "Europe/Rome".parse().unwrap();
        let now = at(tz, 2026, 6, 1, 10, 0);
        let next = next_occurrence(now, "*", 11, 0).unwrap();
        assert_eq!(next.with_timezone(&Utc), at(tz, 2026, 6, 1, 11, 0).with_timezone(&Utc));
    }
}
