//! Key/value settings persisted in the primary datastore.
//!
//! All runtime configuration lives here: SMTP parameters, job schedules,
//! timezone, formatting, email templates. Code-level defaults cover every key
//! so a fresh database behaves sensibly.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Default template/theme values, used when a key has never been saved.
///
/// `[Placeholders]` are substituted at send time.
pub fn template_default(key: &str) -> &'static str {
    match key {
        "color_email_grad_start" => "#667eea",
        "color_email_grad_end" => "#764ba2",
        "color_balance_positive" => "#28a745",
        "color_balance_negative" => "#dc3545",
        "tpl_email_subject" => "Household Ledger - Weekly Balance Update ([Date])",
        "tpl_email_greeting" => "Hi [Name],",
        "tpl_email_intro" => "Here's your weekly update from the household ledger:",
        "tpl_email_footer1" => "This is an automated weekly update from the household ledger.",
        "tpl_email_footer2" => "Making shared expenses easier!",
        "tpl_admin_subject" => "Household Ledger - Admin Summary ([Date])",
        "tpl_admin_intro" => "",
        "tpl_admin_footer" => "This is an automated admin summary from the household ledger.",
        "tpl_backup_subject" => "Household Ledger - Backup [BackupStatus] ([Date])",
        "tpl_backup_footer" => "This is an automated backup report from the household ledger.",
        _ => "",
    }
}
