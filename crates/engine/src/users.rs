//! Household member primitives.
//!
//! `balance_cents` is derived-but-stored: it always equals the sum of signed
//! transaction amounts touching the user, and is only ever written by the
//! ledger operations.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{LedgerError, Money};

/// Which transactions a weekly email includes for a user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailDigest {
    None,
    #[default]
    Last3,
    ThisWeek,
    ThisMonth,
}

impl EmailDigest {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Last3 => "last3",
            Self::ThisWeek => "this_week",
            Self::ThisMonth => "this_month",
        }
    }
}

impl TryFrom<&str> for EmailDigest {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "none" => Ok(Self::None),
            "last3" => Ok(Self::Last3),
            "this_week" => Ok(Self::ThisWeek),
            "this_month" => Ok(Self::ThisMonth),
            other => Err(LedgerError::InvalidTransaction(format!(
                "invalid email digest: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub email_opt_in: bool,
    pub email_transactions: EmailDigest,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub email: String,
    pub balance_cents: i64,
    pub created_at: DateTimeUtc,
    pub is_active: bool,
    pub email_opt_in: bool,
    pub email_transactions: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            balance: Money::new(model.balance_cents),
            created_at: model.created_at,
            is_active: model.is_active,
            email_opt_in: model.email_opt_in,
            email_transactions: EmailDigest::try_from(model.email_transactions.as_str())
                .unwrap_or_default(),
        }
    }
}
