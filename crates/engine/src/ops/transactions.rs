//! Transaction write and read operations.
//!
//! Every mutation keeps the invariant
//! `user.balance == Σ(signed transaction amounts affecting user)`:
//!
//! - create applies the effect of the new row,
//! - delete reverses it,
//! - edit reverses the **old** effect (pre-edit amount and parties), replaces
//!   the fields, then applies the **new** effect, which may target different
//!   users than before.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseTransaction, EntityTrait,
    PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, Query},
};

use crate::{
    ExpenseItemNew, Ledger, LedgerError, Money, ResultLedger, Transaction, TransactionKind,
    expense_items, transactions, users,
};

use super::with_tx;

pub struct DepositNew {
    pub user_id: i32,
    pub amount: Money,
    pub description: String,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

pub struct WithdrawalNew {
    pub user_id: i32,
    pub amount: Money,
    pub description: String,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

pub struct ExpenseNew {
    pub buyer_id: i32,
    pub description: String,
    pub date: DateTime<Utc>,
    pub items: Vec<ExpenseItemNew>,
    pub receipt_path: Option<String>,
    pub notes: Option<String>,
}

/// What to do with a transaction's receipt reference on edit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ReceiptUpdate {
    #[default]
    Keep,
    Remove,
    Replace(String),
}

/// Full replacement state for an edited transaction.
///
/// `items` always fully replace the stored ones; a non-empty list recomputes
/// the amount as the sum of its prices and `amount` is ignored.
pub struct TransactionUpdate {
    pub description: String,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub from_user_id: Option<i32>,
    pub to_user_id: Option<i32>,
    pub amount: Option<Money>,
    pub items: Vec<ExpenseItemNew>,
    pub receipt: ReceiptUpdate,
}

#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    pub text: Option<String>,
    pub kind: Option<TransactionKind>,
    pub user_id: Option<i32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<Money>,
    pub amount_max: Option<Money>,
    pub has_receipt: bool,
}

#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub pages: u64,
    pub total: u64,
}

/// Fails with `NotFound` before any row references a missing user.
async fn require_user(db_tx: &DatabaseTransaction, user_id: i32) -> ResultLedger<()> {
    users::Entity::find_by_id(user_id)
        .one(db_tx)
        .await?
        .map(|_| ())
        .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))
}

/// Applies `amount` (signed) to a user's stored balance.
///
/// Reversing an effect is applying it with the amount negated.
async fn adjust_balance(
    db_tx: &DatabaseTransaction,
    user_id: i32,
    delta: Money,
) -> ResultLedger<()> {
    let user = users::Entity::find_by_id(user_id)
        .one(db_tx)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
    let row = users::ActiveModel {
        id: ActiveValue::Set(user_id),
        balance_cents: ActiveValue::Set(user.balance_cents + delta.cents()),
        ..Default::default()
    };
    row.update(db_tx).await?;
    Ok(())
}

/// Applies a transaction's balance effect: `from` loses, `to` gains.
async fn apply_effect(
    db_tx: &DatabaseTransaction,
    from_user_id: Option<i32>,
    to_user_id: Option<i32>,
    amount: Money,
) -> ResultLedger<()> {
    if let Some(from) = from_user_id {
        adjust_balance(db_tx, from, -amount).await?;
    }
    if let Some(to) = to_user_id {
        adjust_balance(db_tx, to, amount).await?;
    }
    Ok(())
}

fn check_parties(
    kind: TransactionKind,
    from_user_id: Option<i32>,
    to_user_id: Option<i32>,
) -> ResultLedger<()> {
    let ok = match kind {
        TransactionKind::Deposit => from_user_id.is_none() && to_user_id.is_some(),
        TransactionKind::Withdrawal => from_user_id.is_some() && to_user_id.is_none(),
        TransactionKind::Expense => {
            matches!((from_user_id, to_user_id), (Some(f), Some(t)) if f != t)
        }
    };
    if ok {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransaction(format!(
            "parties do not match a {}",
            kind.as_str()
        )))
    }
}

fn description_or(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Returns the receipt path when no other transaction still references it, so
/// the caller can remove the file best-effort.
async fn orphaned_receipt(
    db_tx: &DatabaseTransaction,
    path: &str,
    exclude_id: i32,
) -> ResultLedger<Option<String>> {
    let other = transactions::Entity::find()
        .filter(transactions::Column::ReceiptPath.eq(path))
        .filter(transactions::Column::Id.ne(exclude_id))
        .one(db_tx)
        .await?;
    Ok(if other.is_none() {
        Some(path.to_string())
    } else {
        None
    })
}

impl Ledger {
    /// Records a deposit: money enters the pot towards `user_id`.
    pub async fn deposit(&self, cmd: DepositNew) -> ResultLedger<i32> {
        if !cmd.amount.is_positive() {
            return Err(LedgerError::InvalidAmount("amount must be > 0".to_string()));
        }
        let description = description_or(&cmd.description, "Deposit");

        let id = with_tx!(self, |db_tx| {
            require_user(&db_tx, cmd.user_id).await?;
            let row = transactions::ActiveModel {
                date: ActiveValue::Set(cmd.date),
                description: ActiveValue::Set(description),
                amount_cents: ActiveValue::Set(cmd.amount.cents()),
                to_user_id: ActiveValue::Set(Some(cmd.user_id)),
                kind: ActiveValue::Set(TransactionKind::Deposit.as_str().to_string()),
                notes: ActiveValue::Set(cmd.notes),
                ..Default::default()
            }
            .insert(&db_tx)
            .await?;
            adjust_balance(&db_tx, cmd.user_id, cmd.amount).await?;
            Ok(row.id)
        })?;

        tracing::info!(id, amount = %cmd.amount, "transaction created: deposit");
        Ok(id)
    }

    /// Records a withdrawal. No floor check: balances may go negative, which
    /// represents debt.
    pub async fn withdraw(&self, cmd: WithdrawalNew) -> ResultLedger<i32> {
        if !cmd.amount.is_positive() {
            return Err(LedgerError::InvalidAmount("amount must be > 0".to_string()));
        }
        let description = description_or(&cmd.description, "Withdrawal");

        let id = with_tx!(self, |db_tx| {
            require_user(&db_tx, cmd.user_id).await?;
            let row = transactions::ActiveModel {
                date: ActiveValue::Set(cmd.date),
                description: ActiveValue::Set(description),
                amount_cents: ActiveValue::Set(cmd.amount.cents()),
                from_user_id: ActiveValue::Set(Some(cmd.user_id)),
                kind: ActiveValue::Set(TransactionKind::Withdrawal.as_str().to_string()),
                notes: ActiveValue::Set(cmd.notes),
                ..Default::default()
            }
            .insert(&db_tx)
            .await?;
            adjust_balance(&db_tx, cmd.user_id, -cmd.amount).await?;
            Ok(row.id)
        })?;

        tracing::info!(id, amount = %cmd.amount, "transaction created: withdrawal");
        Ok(id)
    }

    /// Records an itemized expense, split per debtor.
    ///
    /// Items are grouped by `debtor_id`; the buyer's own items are absorbed as
    /// the buyer's cost and create no transaction. Each remaining debtor gets
    /// one transaction `from=debtor, to=buyer` whose amount is the sum of
    /// their item prices. All of it happens in one unit of work.
    ///
    /// Returns the ids of the created transactions (possibly empty when every
    /// item was the buyer's own).
    pub async fn expense(&self, cmd: ExpenseNew) -> ResultLedger<Vec<i32>> {
        if cmd.items.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "an expense needs at least one item".to_string(),
            ));
        }
        for item in &cmd.items {
            if !item.price.is_positive() {
                return Err(LedgerError::InvalidAmount(format!(
                    "item \"{}\" must have a positive price",
                    item.name
                )));
            }
        }

        let mut debts: BTreeMap<i32, Vec<&ExpenseItemNew>> = BTreeMap::new();
        for item in &cmd.items {
            if item.debtor_id != cmd.buyer_id {
                debts.entry(item.debtor_id).or_default().push(item);
            }
        }
        let description = description_or(&cmd.description, "Expense");

        let ids = with_tx!(self, |db_tx| {
            require_user(&db_tx, cmd.buyer_id).await?;

            let mut created = Vec::with_capacity(debts.len());
            for (debtor_id, items) in &debts {
                require_user(&db_tx, *debtor_id).await?;
                let amount: Money = items.iter().map(|item| item.price).sum();
                let row = transactions::ActiveModel {
                    date: ActiveValue::Set(cmd.date),
                    description: ActiveValue::Set(description.clone()),
                    amount_cents: ActiveValue::Set(amount.cents()),
                    from_user_id: ActiveValue::Set(Some(*debtor_id)),
                    to_user_id: ActiveValue::Set(Some(cmd.buyer_id)),
                    kind: ActiveValue::Set(TransactionKind::Expense.as_str().to_string()),
                    receipt_path: ActiveValue::Set(cmd.receipt_path.clone()),
                    notes: ActiveValue::Set(cmd.notes.clone()),
                    ..Default::default()
                }
                .insert(&db_tx)
                .await?;

                for item in items {
                    expense_items::ActiveModel {
                        transaction_id: ActiveValue::Set(row.id),
                        item_name: ActiveValue::Set(item.name.clone()),
                        price_cents: ActiveValue::Set(item.price.cents()),
                        buyer_id: ActiveValue::Set(cmd.buyer_id),
                        ..Default::default()
                    }
                    .insert(&db_tx)
                    .await?;
                }

                adjust_balance(&db_tx, *debtor_id, -amount).await?;
                adjust_balance(&db_tx, cmd.buyer_id, amount).await?;
                created.push(row.id);
            }
            Ok(created)
        })?;

        tracing::info!(
            buyer_id = cmd.buyer_id,
            transactions = ids.len(),
            "transaction created: expense"
        );
        Ok(ids)
    }

    /// Edits a transaction with the reverse/replace/reapply pattern.
    ///
    /// Reversing uses the pre-edit amount and parties; reapplying uses the
    /// post-edit ones, so a transaction can be reassigned between users.
    ///
    /// Returns the old receipt path when the edit orphaned its file.
    pub async fn update_transaction(
        &self,
        id: i32,
        update: TransactionUpdate,
    ) -> ResultLedger<Option<String>> {
        for item in &update.items {
            if !item.price.is_positive() {
                return Err(LedgerError::InvalidAmount(format!(
                    "item \"{}\" must have a positive price",
                    item.name
                )));
            }
        }

        let orphaned = with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
            let kind = TransactionKind::try_from(model.kind.as_str())?;
            let old_amount = Money::new(model.amount_cents);

            // Step 1: reverse the old effect.
            apply_effect(&db_tx, model.from_user_id, model.to_user_id, -old_amount).await?;

            // Step 2: replace the fields.
            check_parties(kind, update.from_user_id, update.to_user_id)?;
            for user_id in [update.from_user_id, update.to_user_id].into_iter().flatten() {
                require_user(&db_tx, user_id).await?;
            }

            expense_items::Entity::delete_many()
                .filter(expense_items::Column::TransactionId.eq(id))
                .exec(&db_tx)
                .await?;

            let new_amount = if update.items.is_empty() {
                update.amount.unwrap_or(old_amount)
            } else {
                let buyer_id = update.to_user_id.ok_or_else(|| {
                    LedgerError::InvalidTransaction(
                        "items require a receiving user".to_string(),
                    )
                })?;
                for item in &update.items {
                    expense_items::ActiveModel {
                        transaction_id: ActiveValue::Set(id),
                        item_name: ActiveValue::Set(item.name.clone()),
                        price_cents: ActiveValue::Set(item.price.cents()),
                        buyer_id: ActiveValue::Set(buyer_id),
                        ..Default::default()
                    }
                    .insert(&db_tx)
                    .await?;
                }
                update.items.iter().map(|item| item.price).sum()
            };
            if !new_amount.is_positive() {
                return Err(LedgerError::InvalidAmount("amount must be > 0".to_string()));
            }

            let (receipt_path, orphan_candidate) = match update.receipt {
                ReceiptUpdate::Keep => (model.receipt_path.clone(), None),
                ReceiptUpdate::Remove => (None, model.receipt_path.clone()),
                ReceiptUpdate::Replace(path) => {
                    let old = model.receipt_path.clone().filter(|old| *old != path);
                    (Some(path), old)
                }
            };
            let orphaned = match orphan_candidate {
                Some(path) => orphaned_receipt(&db_tx, &path, id).await?,
                None => None,
            };

            let row = transactions::ActiveModel {
                id: ActiveValue::Set(id),
                description: ActiveValue::Set(description_or(
                    &update.description,
                    &model.description,
                )),
                date: ActiveValue::Set(update.date.unwrap_or(model.date)),
                notes: ActiveValue::Set(update.notes.clone()),
                from_user_id: ActiveValue::Set(update.from_user_id),
                to_user_id: ActiveValue::Set(update.to_user_id),
                amount_cents: ActiveValue::Set(new_amount.cents()),
                receipt_path: ActiveValue::Set(receipt_path),
                ..Default::default()
            };
            row.update(&db_tx).await?;

            // Step 3: apply the new effect.
            apply_effect(&db_tx, update.from_user_id, update.to_user_id, new_amount).await?;
            Ok(orphaned)
        })?;

        tracing::info!(id, "transaction edited");
        Ok(orphaned)
    }

    /// Deletes a transaction, reversing its balance effect first.
    ///
    /// Returns the receipt path when the deletion orphaned its file.
    pub async fn delete_transaction(&self, id: i32) -> ResultLedger<Option<String>> {
        let orphaned = with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
            let amount = Money::new(model.amount_cents);

            apply_effect(&db_tx, model.from_user_id, model.to_user_id, -amount).await?;

            let orphaned = match &model.receipt_path {
                Some(path) => orphaned_receipt(&db_tx, path, id).await?,
                None => None,
            };

            expense_items::Entity::delete_many()
                .filter(expense_items::Column::TransactionId.eq(id))
                .exec(&db_tx)
                .await?;
            transactions::Entity::delete_by_id(id).exec(&db_tx).await?;
            Ok(orphaned)
        })?;

        tracing::info!(id, "transaction deleted");
        Ok(orphaned)
    }

    /// Returns a transaction with its item rows.
    pub async fn transaction(&self, id: i32) -> ResultLedger<Transaction> {
        let rows = transactions::Entity::find_by_id(id)
            .find_with_related(expense_items::Entity)
            .all(&self.database)
            .await?;
        let (model, items) = rows
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
        Transaction::try_from((model, items))
    }

    /// All transactions of one calendar month (UTC bounds), newest first,
    /// items included.
    pub async fn month_transactions(&self, year: i32, month: u32) -> ResultLedger<Vec<Transaction>> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| LedgerError::InvalidTransaction("invalid year/month".to_string()))?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| LedgerError::InvalidTransaction("invalid year/month".to_string()))?;

        let rows = transactions::Entity::find()
            .filter(transactions::Column::Date.gte(start.and_time(NaiveTime::MIN).and_utc()))
            .filter(transactions::Column::Date.lt(end.and_time(NaiveTime::MIN).and_utc()))
            .order_by_desc(transactions::Column::Date)
            .find_with_related(expense_items::Entity)
            .all(&self.database)
            .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    /// The most recent transactions, newest first.
    pub async fn recent_transactions(&self, limit: u64) -> ResultLedger<Vec<Transaction>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let models = transactions::Entity::find()
            .order_by_desc(transactions::Column::Date)
            .limit(limit)
            .all(&self.database)
            .await?;
        models.into_iter().map(Transaction::try_from).collect()
    }

    /// Date of the oldest transaction on record, if any.
    pub async fn first_transaction_date(&self) -> ResultLedger<Option<DateTime<Utc>>> {
        let first = transactions::Entity::find()
            .order_by_asc(transactions::Column::Date)
            .one(&self.database)
            .await?;
        Ok(first.map(|model| model.date))
    }

    /// Filtered, paginated search. `page` is 1-based; a page past the end
    /// yields an empty item list.
    pub async fn search_transactions(
        &self,
        filter: &TransactionFilter,
        page: u64,
        per_page: u64,
    ) -> ResultLedger<Page<Transaction>> {
        let mut cond = Condition::all();

        if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{text}%");
            cond = cond.add(
                Condition::any()
                    .add(transactions::Column::Description.like(pattern.as_str()))
                    .add(transactions::Column::Notes.like(pattern.as_str()))
                    .add(
                        transactions::Column::Id.in_subquery(
                            Query::select()
                                .column(expense_items::Column::TransactionId)
                                .from(expense_items::Entity)
                                .and_where(
                                    Expr::col(expense_items::Column::ItemName)
                                        .like(pattern.as_str()),
                                )
                                .to_owned(),
                        ),
                    ),
            );
        }
        if let Some(kind) = filter.kind {
            cond = cond.add(transactions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(user_id) = filter.user_id {
            cond = cond.add(
                Condition::any()
                    .add(transactions::Column::FromUserId.eq(user_id))
                    .add(transactions::Column::ToUserId.eq(user_id)),
            );
        }
        if let Some(from) = filter.date_from {
            cond = cond.add(
                transactions::Column::Date.gte(from.and_time(NaiveTime::MIN).and_utc()),
            );
        }
        if let Some(to) = filter.date_to {
            let end = to.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc();
            cond = cond.add(transactions::Column::Date.lte(end));
        }
        if let Some(min) = filter.amount_min {
            cond = cond.add(transactions::Column::AmountCents.gte(min.cents()));
        }
        if let Some(max) = filter.amount_max {
            cond = cond.add(transactions::Column::AmountCents.lte(max.cents()));
        }
        if filter.has_receipt {
            cond = cond
                .add(transactions::Column::ReceiptPath.is_not_null())
                .add(transactions::Column::ReceiptPath.ne(""));
        }

        let query = transactions::Entity::find()
            .filter(cond)
            .order_by_desc(transactions::Column::Date);

        let paginator = query.paginate(&self.database, per_page.max(1));
        let counts = paginator.num_items_and_pages().await?;
        let page = page.max(1);
        let models = paginator.fetch_page(page - 1).await?;
        let items = models
            .into_iter()
            .map(Transaction::try_from)
            .collect::<ResultLedger<Vec<_>>>()?;

        Ok(Page {
            items,
            page,
            pages: counts.number_of_pages,
            total: counts.number_of_items,
        })
    }

    /// A user's transactions, newest first, paginated.
    pub async fn user_transactions(
        &self,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> ResultLedger<Page<Transaction>> {
        let query = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::FromUserId.eq(user_id))
                    .add(transactions::Column::ToUserId.eq(user_id)),
            )
            .order_by_desc(transactions::Column::Date);

        let paginator = query.paginate(&self.database, per_page.max(1));
        let counts = paginator.num_items_and_pages().await?;
        let page = page.max(1);
        let models = paginator.fetch_page(page - 1).await?;
        let items = models
            .into_iter()
            .map(Transaction::try_from)
            .collect::<ResultLedger<Vec<_>>>()?;

        Ok(Page {
            items,
            page,
            pages: counts.number_of_pages,
            total: counts.number_of_items,
        })
    }

    /// The user's latest transactions, newest first.
    pub async fn latest_user_transactions(
        &self,
        user_id: i32,
        limit: u64,
    ) -> ResultLedger<Vec<Transaction>> {
        let models = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::FromUserId.eq(user_id))
                    .add(transactions::Column::ToUserId.eq(user_id)),
            )
            .order_by_desc(transactions::Column::Date)
            .limit(limit)
            .all(&self.database)
            .await?;
        models.into_iter().map(Transaction::try_from).collect()
    }

    /// The user's transactions since `since`, newest first.
    pub async fn user_transactions_since(
        &self,
        user_id: i32,
        since: DateTime<Utc>,
    ) -> ResultLedger<Vec<Transaction>> {
        let models = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::FromUserId.eq(user_id))
                    .add(transactions::Column::ToUserId.eq(user_id)),
            )
            .filter(transactions::Column::Date.gte(since))
            .order_by_desc(transactions::Column::Date)
            .all(&self.database)
            .await?;
        models.into_iter().map(Transaction::try_from).collect()
    }
}
