//! Itemized lines of an expense transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::Money;

/// A persisted item row, attached to one expense transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub id: i32,
    pub name: String,
    pub price: Money,
    pub buyer_id: i32,
}

/// An item as submitted with a new expense: who bought what for whom.
///
/// `debtor_id` decides which per-debtor transaction the item ends up on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseItemNew {
    pub name: String,
    pub price: Money,
    pub debtor_id: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub transaction_id: i32,
    pub item_name: String,
    pub price_cents: i64,
    pub buyer_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ExpenseItem {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.item_name,
            price: Money::new(model.price_cents),
            buyer_id: model.buyer_id,
        }
    }
}
