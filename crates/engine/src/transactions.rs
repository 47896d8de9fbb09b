//! Transaction primitives.
//!
//! A `Transaction` moves money between up to two users:
//!
//! - a deposit has only `to_user_id`
//! - a withdrawal has only `from_user_id`
//! - an expense has both, and its amount equals the sum of its item prices

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{ExpenseItem, LedgerError, Money, expense_items};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "expense" => Ok(Self::Expense),
            other => Err(LedgerError::InvalidTransaction(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Money,
    pub from_user_id: Option<i32>,
    pub to_user_id: Option<i32>,
    pub kind: TransactionKind,
    pub receipt_path: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<ExpenseItem>,
}

impl Transaction {
    /// Signed effect of this transaction on `user_id`'s balance, or zero when
    /// the user is not a party.
    pub fn signed_amount_for(&self, user_id: i32) -> Money {
        if self.to_user_id == Some(user_id) {
            self.amount
        } else if self.from_user_id == Some(user_id) {
            -self.amount
        } else {
            Money::ZERO
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub date: DateTimeUtc,
    pub description: String,
    pub amount_cents: i64,
    pub from_user_id: Option<i32>,
    pub to_user_id: Option<i32>,
    pub kind: String,
    pub receipt_path: Option<String>,
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_items::Entity")]
    ExpenseItems,
}

impl Related<super::expense_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transaction {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            date: model.date,
            description: model.description,
            amount: Money::new(model.amount_cents),
            from_user_id: model.from_user_id,
            to_user_id: model.to_user_id,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            receipt_path: model.receipt_path,
            notes: model.notes,
            items: Vec::new(),
        })
    }
}

impl TryFrom<(Model, Vec<expense_items::Model>)> for Transaction {
    type Error = LedgerError;

    fn try_from(
        (model, items): (Model, Vec<expense_items::Model>),
    ) -> Result<Self, Self::Error> {
        let mut tx = Transaction::try_from(model)?;
        tx.items = items.into_iter().map(ExpenseItem::from).collect();
        Ok(tx)
    }
}
