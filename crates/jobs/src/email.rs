//! The email service: builds the HTML summaries and dispatches them through a
//! [`Mailer`].
//!
//! The SMTP client itself is a collaborator injected by the caller; this
//! module owns everything else: per-user digests, the admin summary, template
//! substitution, tallying, and the `email_logs` debug rows.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use engine::{EmailDigest, Ledger, Transaction, User};

use crate::ResultJobs;

pub struct EmailMessage {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub html: String,
}

/// Delivery seam. Implementations wrap the actual SMTP client; the error
/// string ends up in the per-recipient report and the debug log.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), String>;
}

/// Dry-run mailer: logs the message instead of delivering it.
///
/// Used by tests and by deployments without an SMTP collaborator wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), String> {
        tracing::info!(
            to = %message.to_email,
            subject = %message.subject,
            "email not delivered (no SMTP collaborator configured)"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmailRunReport {
    pub sent: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

/// Replaces `[Key]` placeholders in a template string.
pub(crate) fn apply_template(text: &str, vars: &[(&str, String)]) -> String {
    let mut out = text.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("[{key}]"), value);
    }
    out
}

fn local_midnight_utc(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.with_timezone(&Utc)
        }
        chrono::LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

/// The transactions a user's email should include, per their digest
/// preference.
async fn digest_transactions(ledger: &Ledger, user: &User) -> ResultJobs<Vec<Transaction>> {
    let tz = ledger.timezone().await?;
    let now_local = Utc::now().with_timezone(&tz);
    let transactions = match user.email_transactions {
        EmailDigest::None => Vec::new(),
        EmailDigest::Last3 => ledger.latest_user_transactions(user.id, 3).await?,
        EmailDigest::ThisWeek => {
            let today = now_local.date_naive();
            let monday =
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
            ledger
                .user_transactions_since(user.id, local_midnight_utc(tz, monday))
                .await?
        }
        EmailDigest::ThisMonth => {
            let first = now_local.date_naive().with_day(1).unwrap_or_else(|| {
                now_local.date_naive()
            });
            ledger
                .user_transactions_since(user.id, local_midnight_utc(tz, first))
                .await?
        }
    };
    Ok(transactions)
}

struct EmailTheme {
    symbol: String,
    separator: String,
    grad_start: String,
    grad_end: String,
    date: String,
}

async fn email_theme(ledger: &Ledger) -> ResultJobs<EmailTheme> {
    Ok(EmailTheme {
        symbol: ledger.setting("currency_symbol", "\u{20ac}").await?,
        separator: ledger.setting("decimal_separator", ".").await?,
        grad_start: ledger.template("color_email_grad_start").await?,
        grad_end: ledger.template("color_email_grad_end").await?,
        date: ledger.now_local().await?.format("%Y-%m-%d").to_string(),
    })
}

/// Builds the weekly balance email for one user.
pub async fn build_user_email(ledger: &Ledger, user: &User) -> ResultJobs<String> {
    let theme = email_theme(ledger).await?;
    let sym = &theme.symbol;
    let sep = &theme.separator;

    let (balance_style, balance_status) = if user.balance.is_negative() {
        (
            "color: #dc3545;",
            format!("You owe {sym}{}", user.balance.abs().format(sep)),
        )
    } else if user.balance.is_positive() {
        (
            "color: #28a745;",
            format!("You are owed {sym}{}", user.balance.format(sep)),
        )
    } else {
        ("color: #6c757d;", "Your balance is settled".to_string())
    };

    let mut transactions_section = String::new();
    if user.email_transactions != EmailDigest::None {
        let transactions = digest_transactions(ledger, user).await?;
        let names: HashMap<i32, String> = ledger
            .users(false)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let mut rows = String::new();
        for tx in &transactions {
            let (direction, other_id, amount_style, sign) = if tx.from_user_id == Some(user.id) {
                ("\u{2192}", tx.to_user_id, "color: #dc3545;", "-")
            } else {
                ("\u{2190}", tx.from_user_id, "color: #28a745;", "+")
            };
            let other = other_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_else(|| "System".to_string());
            rows.push_str(&format!(
                r#"
                <tr>
                    <td style="padding: 8px; border-bottom: 1px solid #dee2e6;">{date}</td>
                    <td style="padding: 8px; border-bottom: 1px solid #dee2e6;">{description}</td>
                    <td style="padding: 8px; border-bottom: 1px solid #dee2e6;">{direction} {other}</td>
                    <td style="padding: 8px; border-bottom: 1px solid #dee2e6; text-align: right; {amount_style}">{sign}{sym}{amount}</td>
                </tr>"#,
                date = tx.date.format("%Y-%m-%d"),
                description = tx.description,
                amount = tx.amount.format(sep),
            ));
        }
        if rows.is_empty() {
            rows = r#"
            <tr>
                <td colspan="4" style="padding: 16px; text-align: center; color: #6c757d;">
                    No recent transactions
                </td>
            </tr>"#
                .to_string();
        }

        transactions_section = format!(
            r#"
            <h3 style="color: #495057; margin-top: 30px;">Recent Transactions</h3>
            <table style="width: 100%; border-collapse: collapse; margin-top: 15px;">
                <thead>
                    <tr style="background: #f8f9fa;">
                        <th style="padding: 10px; text-align: left; border-bottom: 2px solid #dee2e6;">Date</th>
                        <th style="padding: 10px; text-align: left; border-bottom: 2px solid #dee2e6;">Description</th>
                        <th style="padding: 10px; text-align: left; border-bottom: 2px solid #dee2e6;">With</th>
                        <th style="padding: 10px; text-align: right; border-bottom: 2px solid #dee2e6;">Amount</th>
                    </tr>
                </thead>
                <tbody>{rows}
                </tbody>
            </table>"#
        );
    }

    let vars: Vec<(&str, String)> = vec![
        ("Name", user.name.clone()),
        ("Balance", format!("{sym}{}", user.balance.format(sep))),
        ("BalanceStatus", balance_status.clone()),
        ("Date", theme.date.clone()),
    ];
    let greeting = apply_template(&ledger.template("tpl_email_greeting").await?, &vars);
    let intro = apply_template(&ledger.template("tpl_email_intro").await?, &vars);
    let footer1 = apply_template(&ledger.template("tpl_email_footer1").await?, &vars);
    let footer2 = apply_template(&ledger.template("tpl_email_footer2").await?, &vars);

    let part = |text: &str, style: &str| {
        if text.trim().is_empty() {
            String::new()
        } else {
            format!("<p{style}>{text}</p>")
        }
    };
    let greeting_html = part(&greeting, r#" style="font-size: 16px; margin-bottom: 20px;""#);
    let intro_html = part(&intro, "");
    let footer1_html = part(&footer1, "");
    let footer2_html = part(&footer2, r#" style="margin-top: 10px;""#);

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background: linear-gradient(135deg, {grad_start} 0%, {grad_end} 100%); color: white; padding: 30px; border-radius: 10px 10px 0 0; text-align: center;">
        <h1 style="margin: 0; font-size: 28px;">Household Ledger</h1>
        <p style="margin: 10px 0 0 0; opacity: 0.9;">Weekly Balance Update</p>
    </div>

    <div style="background: white; padding: 30px; border: 1px solid #dee2e6; border-top: none; border-radius: 0 0 10px 10px;">
        {greeting_html}
        {intro_html}

        <div style="background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; text-align: center;">
            <p style="margin: 0 0 10px 0; color: #6c757d; text-transform: uppercase; font-size: 12px; font-weight: bold;">Current Balance</p>
            <h2 style="margin: 0; font-size: 36px; {balance_style}">{sym}{balance}</h2>
        </div>

        {transactions_section}

        <div style="margin-top: 30px; padding-top: 20px; border-top: 1px solid #dee2e6; text-align: center; color: #6c757d; font-size: 14px;">
            {footer1_html}
            {footer2_html}
        </div>
    </div>
</body>
</html>"#,
        grad_start = theme.grad_start,
        grad_end = theme.grad_end,
        balance = user.balance.format(sep),
    ))
}

/// Builds the admin summary listing every active user's balance.
pub async fn build_admin_summary_email(
    ledger: &Ledger,
    users: &[User],
    include_emails: bool,
) -> ResultJobs<String> {
    let theme = email_theme(ledger).await?;
    let sym = &theme.symbol;
    let sep = &theme.separator;
    let pos_color = ledger.template("color_balance_positive").await?;
    let neg_color = ledger.template("color_balance_negative").await?;

    let vars: Vec<(&str, String)> = vec![
        ("Date", theme.date.clone()),
        ("UserCount", users.len().to_string()),
    ];
    let intro = apply_template(&ledger.template("tpl_admin_intro").await?, &vars);
    let footer = apply_template(&ledger.template("tpl_admin_footer").await?, &vars);
    let intro_html = if intro.trim().is_empty() {
        String::new()
    } else {
        format!(r#"<p style="margin-bottom:20px;">{intro}</p>"#)
    };
    let footer_html = if footer.trim().is_empty() {
        String::new()
    } else {
        format!("<p>{footer}</p>")
    };

    let mut rows = String::new();
    for user in users {
        let color = if user.balance.is_negative() {
            neg_color.as_str()
        } else if user.balance.is_positive() {
            pos_color.as_str()
        } else {
            "#6c757d"
        };
        let email_cell = if include_emails {
            format!(
                r#"<td style="padding: 10px 8px; border-bottom: 1px solid #dee2e6; color: #6c757d; font-size: 0.9em;">{}</td>"#,
                user.email
            )
        } else {
            String::new()
        };
        rows.push_str(&format!(
            r#"
            <tr>
                <td style="padding: 10px 8px; border-bottom: 1px solid #dee2e6;">{name}</td>
                {email_cell}
                <td style="padding: 10px 8px; border-bottom: 1px solid #dee2e6; text-align: right; font-weight: bold; color: {color};">{sym}{balance}</td>
            </tr>"#,
            name = user.name,
            balance = user.balance.format(sep),
        ));
    }

    let email_header = if include_emails {
        r#"<th style="padding: 10px 8px; text-align: left; border-bottom: 2px solid #dee2e6;">Email</th>"#
    } else {
        ""
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; line-height: 1.6; color: #333; max-width: 700px; margin: 0 auto; padding: 20px;">
    <div style="background: linear-gradient(135deg, {grad_start} 0%, {grad_end} 100%); color: white; padding: 30px; border-radius: 10px 10px 0 0; text-align: center;">
        <h1 style="margin: 0; font-size: 28px;">Household Ledger</h1>
        <p style="margin: 10px 0 0 0; opacity: 0.9;">Admin Summary - {date}</p>
    </div>
    <div style="background: white; padding: 30px; border: 1px solid #dee2e6; border-top: none; border-radius: 0 0 10px 10px;">
        {intro_html}
        <h3 style="color: #495057; margin-top: 0;">All Active Users</h3>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="background: #f8f9fa;">
                    <th style="padding: 10px 8px; text-align: left; border-bottom: 2px solid #dee2e6;">Name</th>
                    {email_header}
                    <th style="padding: 10px 8px; text-align: right; border-bottom: 2px solid #dee2e6;">Balance</th>
                </tr>
            </thead>
            <tbody>{rows}
            </tbody>
        </table>
        <div style="margin-top: 24px; padding-top: 16px; border-top: 1px solid #dee2e6; text-align: center; color: #6c757d; font-size: 13px;">
            {footer_html}
        </div>
    </div>
</body>
</html>"#,
        grad_start = theme.grad_start,
        grad_end = theme.grad_end,
        date = theme.date,
    ))
}

/// Sends the periodic balance email to every opted-in active user, plus the
/// optional admin summary.
pub async fn send_all_emails(ledger: &Ledger, mailer: &dyn Mailer) -> ResultJobs<EmailRunReport> {
    if !ledger.setting_bool("email_enabled", true).await? {
        return Ok(EmailRunReport {
            errors: vec!["Email sending is disabled in General settings.".to_string()],
            ..Default::default()
        });
    }

    let all_active = ledger.users(true).await?;
    let debug = ledger.setting_bool("email_debug", false).await?;
    let date = ledger.now_local().await?.format("%Y-%m-%d").to_string();
    let subject = apply_template(
        &ledger.template("tpl_email_subject").await?,
        &[("Date", date.clone())],
    );

    let mut report = EmailRunReport::default();
    for user in all_active.iter().filter(|user| user.email_opt_in) {
        let html = build_user_email(ledger, user).await?;
        let message = EmailMessage {
            to_email: user.email.clone(),
            to_name: user.name.clone(),
            subject: subject.clone(),
            html,
        };
        match mailer.send(&message) {
            Ok(()) => {
                report.sent += 1;
                if debug {
                    ledger
                        .log_email(
                            "SUCCESS",
                            Some(&format!("{} <{}>", user.name, user.email)),
                            "Email sent successfully",
                        )
                        .await?;
                }
            }
            Err(err) => {
                report.failed += 1;
                report
                    .errors
                    .push(format!("{} <{}>: {err}", user.name, user.email));
                if debug {
                    ledger
                        .log_email(
                            "FAIL",
                            Some(&format!("{} <{}>", user.name, user.email)),
                            &err,
                        )
                        .await?;
                }
            }
        }
    }

    let admin_id = ledger.setting("site_admin_id", "").await?;
    if ledger.setting_bool("admin_summary_email", false).await? {
        if let Ok(id) = admin_id.trim().parse::<i32>() {
            if let Ok(admin) = ledger.user(id).await {
                let include_emails = ledger
                    .setting_bool("admin_summary_include_emails", false)
                    .await?;
                let summary_subject = apply_template(
                    &ledger.template("tpl_admin_subject").await?,
                    &[
                        ("Date", date.clone()),
                        ("UserCount", all_active.len().to_string()),
                    ],
                );
                let html = build_admin_summary_email(ledger, &all_active, include_emails).await?;
                let message = EmailMessage {
                    to_email: admin.email.clone(),
                    to_name: admin.name.clone(),
                    subject: summary_subject,
                    html,
                };
                match mailer.send(&message) {
                    Ok(()) => {
                        if debug {
                            ledger
                                .log_email(
                                    "INFO",
                                    None,
                                    &format!(
                                        "Admin summary sent to {} <{}>",
                                        admin.name, admin.email
                                    ),
                                )
                                .await?;
                        }
                    }
                    Err(err) => {
                        if debug {
                            ledger
                                .log_email(
                                    "FAIL",
                                    Some(&format!("{} <{}>", admin.name, admin.email)),
                                    &format!("Admin summary failed: {err}"),
                                )
                                .await?;
                        }
                    }
                }
            }
        }
    }

    if debug {
        ledger
            .log_email(
                "INFO",
                None,
                &format!(
                    "Run complete: {} sent, {} failed",
                    report.sent, report.failed
                ),
            )
            .await?;
        ledger.prune_email_logs().await?;
    }

    tracing::info!(
        sent = report.sent,
        failed = report.failed,
        "email batch complete"
    );
    Ok(report)
}
