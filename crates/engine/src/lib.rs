//! The ledger engine.
//!
//! Everything that touches the database goes through [`Ledger`]: user and
//! transaction mutations, the balance invariant, analytics, settings, and the
//! debug log tables used by background jobs. The service is stateless: every
//! read re-fetches from the store and every mutation runs inside a single
//! database transaction, so the store's isolation is the only coordination
//! between concurrent callers.

use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};

pub use error::LedgerError;
pub use expense_items::{ExpenseItem, ExpenseItemNew};
pub use money::Money;
pub use ops::{
    AnalyticsQuery, AnalyticsReport, AutoCollectOutcome, DepositNew, ExpenseNew, ItemStat,
    KindStat, Page, ReceiptUpdate, TransactionFilter, TransactionUpdate, UserBalance, UserNew,
    UserSeries, UserUpdate, WithdrawalNew,
};
pub use transactions::{Transaction, TransactionKind};
pub use users::{EmailDigest, User};

mod common;
mod error;
mod expense_items;
mod logs;
mod money;
mod ops;
mod settings;
mod transactions;
mod users;

pub use logs::LOG_KEEP;

type ResultLedger<T> = Result<T, LedgerError>;

/// The ledger service.
///
/// `User.balance` is only ever written here, keeping it equal to the sum of
/// signed transaction amounts touching the user.
#[derive(Clone, Debug)]
pub struct Ledger {
    database: DatabaseConnection,
}

impl Ledger {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    /// Database connectivity check, used by the health endpoint.
    pub async fn ping(&self) -> ResultLedger<()> {
        let backend = self.database.get_database_backend();
        self.database
            .execute(Statement::from_string(backend, "SELECT 1"))
            .await?;
        Ok(())
    }
}
