//! User operations.
//!
//! Users are never deleted; they are toggled inactive so their transaction
//! history (and the balance invariant) stays intact.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Statement,
    TransactionTrait,
};

use crate::{EmailDigest, Ledger, LedgerError, Money, ResultLedger, User, users};

use super::with_tx;

pub struct UserNew {
    pub name: String,
    pub email: String,
    pub email_opt_in: bool,
    pub email_transactions: EmailDigest,
}

pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
    pub email_opt_in: bool,
    pub email_transactions: EmailDigest,
}

impl Ledger {
    /// Creates a user with a zero balance.
    pub async fn create_user(&self, new: UserNew) -> ResultLedger<i32> {
        let name = new.name.trim().to_string();
        let email = new.email.trim().to_string();
        if name.is_empty() || email.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "name and email are required".to_string(),
            ));
        }

        let id = with_tx!(self, |db_tx| {
            if users::Entity::find()
                .filter(users::Column::Name.eq(&name))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(LedgerError::AlreadyExists(name));
            }
            if users::Entity::find()
                .filter(users::Column::Email.eq(&email))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(LedgerError::AlreadyExists(email));
            }

            let row = users::ActiveModel {
                name: ActiveValue::Set(name.clone()),
                email: ActiveValue::Set(email),
                balance_cents: ActiveValue::Set(0),
                created_at: ActiveValue::Set(Utc::now()),
                is_active: ActiveValue::Set(true),
                email_opt_in: ActiveValue::Set(new.email_opt_in),
                email_transactions: ActiveValue::Set(new.email_transactions.as_str().to_string()),
                ..Default::default()
            }
            .insert(&db_tx)
            .await?;
            Ok(row.id)
        })?;

        tracing::info!(id, name = %name, "user created");
        Ok(id)
    }

    /// Updates a user's profile. Name and email stay unique across users.
    pub async fn update_user(&self, id: i32, update: UserUpdate) -> ResultLedger<()> {
        let name = update.name.trim().to_string();
        let email = update.email.trim().to_string();
        if name.is_empty() || email.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "name and email are required".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let model = users::Entity::find_by_id(id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("user {id}")))?;

            if users::Entity::find()
                .filter(users::Column::Name.eq(&name))
                .filter(users::Column::Id.ne(id))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(LedgerError::AlreadyExists(name));
            }
            if users::Entity::find()
                .filter(users::Column::Email.eq(&email))
                .filter(users::Column::Id.ne(id))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(LedgerError::AlreadyExists(email));
            }

            let row = users::ActiveModel {
                id: ActiveValue::Set(id),
                name: ActiveValue::Set(name.clone()),
                email: ActiveValue::Set(email),
                created_at: ActiveValue::Set(update.created_at.unwrap_or(model.created_at)),
                email_opt_in: ActiveValue::Set(update.email_opt_in),
                email_transactions: ActiveValue::Set(
                    update.email_transactions.as_str().to_string(),
                ),
                ..Default::default()
            };
            row.update(&db_tx).await?;
            Ok(())
        })?;

        tracing::info!(id, name = %name, "user updated");
        Ok(())
    }

    /// Flips the active flag and returns the new state.
    pub async fn toggle_user_active(&self, id: i32) -> ResultLedger<bool> {
        let active = with_tx!(self, |db_tx| {
            let model = users::Entity::find_by_id(id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("user {id}")))?;
            let active = !model.is_active;
            let row = users::ActiveModel {
                id: ActiveValue::Set(id),
                is_active: ActiveValue::Set(active),
                ..Default::default()
            };
            row.update(&db_tx).await?;
            Ok(active)
        })?;

        tracing::info!(id, active, "user toggled");
        Ok(active)
    }

    pub async fn user(&self, id: i32) -> ResultLedger<User> {
        users::Entity::find_by_id(id)
            .one(&self.database)
            .await?
            .map(User::from)
            .ok_or_else(|| LedgerError::NotFound(format!("user {id}")))
    }

    /// Lists users ordered by name.
    pub async fn users(&self, only_active: bool) -> ResultLedger<Vec<User>> {
        let mut query = users::Entity::find().order_by_asc(users::Column::Name);
        if only_active {
            query = query.filter(users::Column::IsActive.eq(true));
        }
        let models = query.all(&self.database).await?;
        Ok(models.into_iter().map(User::from).collect())
    }

    /// Sum of signed amounts of the user's currently-existing transactions.
    ///
    /// The stored balance must always equal this; tests check the invariant
    /// after every mutation.
    pub async fn recompute_balance(&self, user_id: i32) -> ResultLedger<Money> {
        let backend = self.database.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "SELECT COALESCE(SUM(CASE WHEN to_user_id = ? THEN amount_cents \
             ELSE -amount_cents END), 0) AS sum \
             FROM transactions WHERE to_user_id = ? OR from_user_id = ?",
            [user_id.into(), user_id.into(), user_id.into()],
        );
        let row = self.database.query_one(stmt).await?;
        let cents: i64 = row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0);
        Ok(Money::new(cents))
    }
}
