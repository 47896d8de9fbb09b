mod analytics;
mod common;
mod logs;
mod settings;
mod transactions;
mod users;

pub use analytics::{AnalyticsQuery, AnalyticsReport, ItemStat, KindStat, UserBalance, UserSeries};
pub use common::AutoCollectOutcome;
pub use transactions::{
    DepositNew, ExpenseNew, Page, ReceiptUpdate, TransactionFilter, TransactionUpdate,
    WithdrawalNew,
};
pub use users::{UserNew, UserUpdate};

/// Run a block inside a DB transaction, committing on success.
///
/// An early error return drops the transaction, which rolls it back.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: crate::ResultLedger<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;
