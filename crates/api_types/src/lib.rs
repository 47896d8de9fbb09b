//! Wire types shared by the HTTP server and its clients.
//!
//! Monetary values travel as **integer cents** (`*_cents` fields); timestamps
//! as RFC3339 with a timezone offset.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Expense,
}

pub mod user {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EmailDigest {
        None,
        #[default]
        Last3,
        ThisWeek,
        ThisMonth,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserNew {
        pub name: String,
        pub email: String,
        #[serde(default = "default_true")]
        pub email_opt_in: bool,
        #[serde(default)]
        pub email_transactions: EmailDigest,
    }

    fn default_true() -> bool {
        true
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserUpdate {
        pub name: String,
        pub email: String,
        /// `YYYY-MM-DD`; omitted keeps the stored date.
        pub created_at: Option<String>,
        pub email_opt_in: bool,
        #[serde(default)]
        pub email_transactions: EmailDigest,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: i32,
        pub name: String,
        pub email: String,
        pub balance_cents: i64,
        pub is_active: bool,
        pub email_opt_in: bool,
        pub email_transactions: EmailDigest,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserCreated {
        pub id: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserToggled {
        pub id: i32,
        pub is_active: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserDetailResponse {
        pub user: UserView,
        pub transactions: Vec<super::transaction::TransactionView>,
        pub page: u64,
        pub pages: u64,
        pub total: u64,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DepositNew {
        pub user_id: i32,
        /// Decimal string, `.` or `,` separator (form input).
        pub amount: String,
        #[serde(default)]
        pub description: String,
        /// RFC3339; omitted means "now".
        pub date: Option<DateTime<FixedOffset>>,
        pub notes: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WithdrawalNew {
        pub user_id: i32,
        pub amount: String,
        #[serde(default)]
        pub description: String,
        pub date: Option<DateTime<FixedOffset>>,
        pub notes: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseItemNew {
        pub name: String,
        /// Decimal string, `.` or `,` separator.
        pub price: String,
        pub debtor_id: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub buyer_id: i32,
        #[serde(default)]
        pub description: String,
        pub date: Option<DateTime<FixedOffset>>,
        pub items: Vec<ExpenseItemNew>,
        pub receipt_path: Option<String>,
        pub notes: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionUpdate {
        #[serde(default)]
        pub description: String,
        pub date: Option<DateTime<FixedOffset>>,
        pub notes: Option<String>,
        pub from_user_id: Option<i32>,
        pub to_user_id: Option<i32>,
        pub amount: Option<String>,
        #[serde(default)]
        pub items: Vec<ExpenseItemNew>,
        #[serde(default)]
        pub remove_receipt: bool,
        pub receipt_path: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ItemView {
        pub name: String,
        pub price_cents: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: i32,
        pub kind: TransactionKind,
        pub date: DateTime<FixedOffset>,
        pub description: String,
        pub amount_cents: i64,
        pub from_user_id: Option<i32>,
        pub to_user_id: Option<i32>,
        pub receipt_path: Option<String>,
        pub notes: Option<String>,
        #[serde(default)]
        pub items: Vec<ItemView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub ids: Vec<i32>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DayGroup {
        /// Local date, `YYYY-MM-DD`.
        pub date: String,
        pub transactions: Vec<TransactionView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MonthResponse {
        pub year: i32,
        pub month: u32,
        pub days: Vec<DayGroup>,
        pub transaction_count: u64,
        pub total_cents: i64,
        pub year_range: Vec<i32>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SearchResponse {
        pub transactions: Vec<TransactionView>,
        pub page: u64,
        pub pages: u64,
        pub total: u64,
    }
}

pub mod analytics {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceEntry {
        pub name: String,
        pub balance_cents: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceHistory {
        pub labels: Vec<String>,
        pub datasets: BTreeMap<String, Vec<i64>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionVolume {
        pub labels: Vec<String>,
        pub counts: Vec<u64>,
        pub amounts_cents: Vec<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TypeBreakdown {
        pub kinds: Vec<super::TransactionKind>,
        pub counts: Vec<u64>,
        pub amounts_cents: Vec<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TopItems {
        pub names: Vec<String>,
        pub counts: Vec<u64>,
        pub totals_cents: Vec<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Meta {
        pub date_from: String,
        pub date_to: String,
        pub transaction_count: u64,
        pub user_count: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AnalyticsResponse {
        pub balances: Vec<BalanceEntry>,
        pub balance_history: BalanceHistory,
        pub transaction_volume: TransactionVolume,
        pub type_breakdown: TypeBreakdown,
        pub top_items: TopItems,
        pub meta: Meta,
    }
}

pub mod settings {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettingsResponse {
        pub settings: BTreeMap<String, String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettingsUpdate {
        pub settings: BTreeMap<String, String>,
    }
}

pub mod health {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HealthResponse {
        pub status: String,
        pub checks: BTreeMap<String, String>,
    }
}
