use std::sync::Mutex;

use chrono::Utc;
use sea_orm::Database;

use engine::{DepositNew, EmailDigest, Ledger, UserNew};
use jobs::{EmailMessage, Mailer, build_user_email, send_all_emails};
use migration::MigratorTrait;

async fn ledger() -> Ledger {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Ledger::new(db)
}

async fn new_user(ledger: &Ledger, name: &str, opt_in: bool, digest: EmailDigest) -> i32 {
    ledger
        .create_user(UserNew {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            email_opt_in: opt_in,
            email_transactions: digest,
        })
        .await
        .unwrap()
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push((message.to_email.clone(), message.subject.clone()));
        Ok(())
    }
}

struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _message: &EmailMessage) -> Result<(), String> {
        Err("connection refused".to_string())
    }
}

#[tokio::test]
async fn user_email_shows_balance_and_status() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice", true, EmailDigest::Last3).await;
    ledger
        .deposit(DepositNew {
            user_id: alice,
            amount: "42.50".parse().unwrap(),
            description: "Payday".to_string(),
            date: Utc::now(),
            notes: None,
        })
        .await
        .unwrap();

    let user = ledger.user(alice).await.unwrap();
    let html = build_user_email(&ledger, &user).await.unwrap();

    assert!(html.contains("Hi Alice,"));
    assert!(html.contains("42.50"));
    assert!(html.contains("You are owed"));
    assert!(html.contains("Payday"));
    assert!(html.contains("Recent Transactions"));
}

#[tokio::test]
async fn digest_none_omits_the_transaction_table() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice", true, EmailDigest::None).await;

    let user = ledger.user(alice).await.unwrap();
    let html = build_user_email(&ledger, &user).await.unwrap();

    assert!(!html.contains("Recent Transactions"));
    assert!(html.contains("Your balance is settled"));
}

#[tokio::test]
async fn negative_balance_reads_as_debt() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice", true, EmailDigest::Last3).await;
    ledger
        .withdraw(engine::WithdrawalNew {
            user_id: alice,
            amount: "10.00".parse().unwrap(),
            description: "Withdrawal".to_string(),
            date: Utc::now(),
            notes: None,
        })
        .await
        .unwrap();

    let user = ledger.user(alice).await.unwrap();
    let html = build_user_email(&ledger, &user).await.unwrap();
    assert!(html.contains("You owe"));
    assert!(html.contains("10.00"));
}

#[tokio::test]
async fn send_all_respects_opt_out() {
    let ledger = ledger().await;
    new_user(&ledger, "Alice", true, EmailDigest::Last3).await;
    new_user(&ledger, "Bob", false, EmailDigest::Last3).await;

    let mailer = RecordingMailer::default();
    let report = send_all_emails(&ledger, &mailer).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);
    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "alice@example.com");
}

#[tokio::test]
async fn send_all_honors_the_kill_switch() {
    let ledger = ledger().await;
    new_user(&ledger, "Alice", true, EmailDigest::Last3).await;
    ledger.set_setting("email_enabled", "0").await.unwrap();

    let mailer = RecordingMailer::default();
    let report = send_all_emails(&ledger, &mailer).await.unwrap();

    assert_eq!(report.sent, 0);
    assert!(mailer.sent.lock().unwrap().is_empty());
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn send_all_tallies_failures() {
    let ledger = ledger().await;
    new_user(&ledger, "Alice", true, EmailDigest::Last3).await;
    new_user(&ledger, "Bob", true, EmailDigest::Last3).await;

    let report = send_all_emails(&ledger, &FailingMailer).await.unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].contains("connection refused"));
}

#[tokio::test]
async fn subject_uses_the_template_setting() {
    let ledger = ledger().await;
    new_user(&ledger, "Alice", true, EmailDigest::Last3).await;
    ledger
        .set_setting("tpl_email_subject", "Weekly pot update [Date]")
        .await
        .unwrap();

    let mailer = RecordingMailer::default();
    send_all_emails(&ledger, &mailer).await.unwrap();

    let sent = mailer.sent.lock().unwrap();
    let subject = &sent[0].1;
    assert!(subject.starts_with("Weekly pot update "));
    assert!(!subject.contains("[Date]"));
}

#[tokio::test]
async fn admin_summary_goes_to_the_configured_admin() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice", true, EmailDigest::Last3).await;
    new_user(&ledger, "Bob", false, EmailDigest::Last3).await;
    ledger.set_setting("admin_summary_email", "1").await.unwrap();
    ledger
        .set_setting("site_admin_id", &alice.to_string())
        .await
        .unwrap();

    let mailer = RecordingMailer::default();
    let report = send_all_emails(&ledger, &mailer).await.unwrap();

    // One digest (Alice) plus the admin summary.
    assert_eq!(report.sent, 1);
    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].0, "alice@example.com");
    assert!(sent[1].1.contains("Admin Summary"));
}
