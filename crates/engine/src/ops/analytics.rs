//! Point-in-time balance reconstruction and aggregate statistics.
//!
//! There is no separate event log: a historical balance is obtained by
//! starting from the user's **current** balance and undoing every transaction
//! dated after the sample cutoff. The sign convention mirrors the forward
//! ledger operations, so a transaction that credited the user is undone by
//! subtraction and one that debited is undone by addition.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};

use crate::{
    Ledger, LedgerError, Money, ResultLedger, Transaction, TransactionKind, User, expense_items,
    transactions, users,
};

pub struct AnalyticsQuery {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    /// Restrict to these users; `None` means all active users.
    pub user_ids: Option<Vec<i32>>,
}

impl AnalyticsQuery {
    /// The default range: the last 90 days up to `today`.
    pub fn last_90_days(today: NaiveDate) -> Self {
        Self {
            date_from: today - Duration::days(90),
            date_to: today,
            user_ids: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserBalance {
    pub id: i32,
    pub name: String,
    pub balance: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSeries {
    pub name: String,
    pub balances: Vec<Money>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemStat {
    pub name: String,
    pub count: u64,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindStat {
    pub kind: TransactionKind,
    pub count: u64,
    pub total: Money,
}

#[derive(Clone, Debug)]
pub struct AnalyticsReport {
    pub balances: Vec<UserBalance>,
    pub history_labels: Vec<String>,
    pub history: Vec<UserSeries>,
    pub volume_labels: Vec<String>,
    pub volume_counts: Vec<u64>,
    pub volume_amounts: Vec<Money>,
    pub by_kind: Vec<KindStat>,
    pub top_items: Vec<ItemStat>,
    pub transaction_count: u64,
    pub user_count: u64,
}

fn first_of_month(year: i32, month: u32) -> ResultLedger<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| LedgerError::InvalidTransaction("invalid sample month".to_string()))
}

/// Weekly samples within 90 days, the 1st of each month beyond; the range end
/// is always the last sample.
fn sample_dates(date_from: NaiveDate, date_to: NaiveDate) -> ResultLedger<Vec<NaiveDate>> {
    let delta_days = (date_to - date_from).num_days();
    let mut dates = Vec::new();

    if delta_days <= 90 {
        let mut d = date_from;
        while d <= date_to {
            dates.push(d);
            d += Duration::days(7);
        }
    } else {
        let (mut year, mut month) = (date_from.year(), date_from.month());
        loop {
            dates.push(first_of_month(year, month)?);
            month += 1;
            if month > 12 {
                month = 1;
                year += 1;
            }
            if first_of_month(year, month)? > date_to {
                break;
            }
        }
    }

    if dates.last().is_none_or(|last| *last < date_to) {
        dates.push(date_to);
    }
    Ok(dates)
}

impl Ledger {
    /// Builds the full analytics report for a date range.
    pub async fn analytics(&self, query: AnalyticsQuery) -> ResultLedger<AnalyticsReport> {
        let AnalyticsQuery {
            date_from,
            date_to,
            user_ids,
        } = query;

        let users: Vec<User> = match user_ids.filter(|ids| !ids.is_empty()) {
            Some(ids) => users::Entity::find()
                .filter(users::Column::Id.is_in(ids))
                .order_by_asc(users::Column::Name)
                .all(&self.database)
                .await?
                .into_iter()
                .map(User::from)
                .collect(),
            None => self.users(true).await?,
        };
        let ids: Vec<i32> = users.iter().map(|user| user.id).collect();

        let from_dt = date_from.and_time(NaiveTime::MIN).and_utc();
        let to_dt = date_to
            .and_hms_opt(23, 59, 59)
            .unwrap_or_default()
            .and_utc();

        let mut tx_query = transactions::Entity::find()
            .filter(transactions::Column::Date.gte(from_dt))
            .filter(transactions::Column::Date.lte(to_dt));
        if !ids.is_empty() {
            tx_query = tx_query.filter(
                Condition::any()
                    .add(transactions::Column::FromUserId.is_in(ids.clone()))
                    .add(transactions::Column::ToUserId.is_in(ids.clone())),
            );
        }
        let in_range: Vec<Transaction> = tx_query
            .order_by_asc(transactions::Column::Date)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect::<ResultLedger<_>>()?;

        let delta_days = (date_to - date_from).num_days();
        let samples = sample_dates(date_from, date_to)?;
        let history_labels = samples
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect();

        // Backward replay: every transaction of the user, for every sample.
        let mut history = Vec::with_capacity(users.len());
        for user in &users {
            let user_tx = transactions::Entity::find()
                .filter(
                    Condition::any()
                        .add(transactions::Column::FromUserId.eq(user.id))
                        .add(transactions::Column::ToUserId.eq(user.id)),
                )
                .all(&self.database)
                .await?;

            let mut balances = Vec::with_capacity(samples.len());
            for sample in &samples {
                let cutoff = sample
                    .succ_opt()
                    .map(|next| next.and_time(NaiveTime::MIN).and_utc())
                    .unwrap_or(to_dt);
                let mut balance = user.balance;
                for tx in &user_tx {
                    if tx.date >= cutoff {
                        if tx.to_user_id == Some(user.id) {
                            balance -= Money::new(tx.amount_cents);
                        } else if tx.from_user_id == Some(user.id) {
                            balance += Money::new(tx.amount_cents);
                        }
                    }
                }
                balances.push(balance);
            }
            history.push(UserSeries {
                name: user.name.clone(),
                balances,
            });
        }

        // Volume buckets: ISO-week start within 90 days, calendar month beyond.
        let mut volume: BTreeMap<NaiveDate, (u64, Money)> = BTreeMap::new();
        for tx in &in_range {
            let day = tx.date.date_naive();
            let key = if delta_days <= 90 {
                day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
            } else {
                first_of_month(day.year(), day.month())?
            };
            let entry = volume.entry(key).or_insert((0, Money::ZERO));
            entry.0 += 1;
            entry.1 += tx.amount;
        }
        let volume_labels = volume
            .keys()
            .map(|key| {
                if delta_days <= 90 {
                    key.format("%b %d").to_string()
                } else {
                    key.format("%b %Y").to_string()
                }
            })
            .collect();
        let volume_counts = volume.values().map(|(count, _)| *count).collect();
        let volume_amounts = volume.values().map(|(_, amount)| *amount).collect();

        // Breakdown by transaction kind.
        let by_kind = [
            TransactionKind::Deposit,
            TransactionKind::Withdrawal,
            TransactionKind::Expense,
        ]
        .into_iter()
        .map(|kind| {
            let (count, total) = in_range
                .iter()
                .filter(|tx| tx.kind == kind)
                .fold((0u64, Money::ZERO), |(count, total), tx| {
                    (count + 1, total + tx.amount)
                });
            KindStat { kind, count, total }
        })
        .collect();

        // Top expense items by total amount.
        let expense_ids: Vec<i32> = in_range
            .iter()
            .filter(|tx| tx.kind == TransactionKind::Expense)
            .map(|tx| tx.id)
            .collect();
        let mut item_stats: HashMap<String, (u64, Money)> = HashMap::new();
        if !expense_ids.is_empty() {
            let items = expense_items::Entity::find()
                .filter(expense_items::Column::TransactionId.is_in(expense_ids))
                .all(&self.database)
                .await?;
            for item in items {
                let name = item.item_name.trim().to_string();
                let entry = item_stats.entry(name).or_insert((0, Money::ZERO));
                entry.0 += 1;
                entry.1 += Money::new(item.price_cents);
            }
        }
        let mut top_items: Vec<ItemStat> = item_stats
            .into_iter()
            .map(|(name, (count, total))| ItemStat { name, count, total })
            .collect();
        top_items.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        top_items.truncate(15);

        Ok(AnalyticsReport {
            balances: users
                .iter()
                .map(|user| UserBalance {
                    id: user.id,
                    name: user.name.clone(),
                    balance: user.balance,
                })
                .collect(),
            history_labels,
            history,
            volume_labels,
            volume_counts,
            volume_amounts,
            by_kind,
            top_items,
            transaction_count: in_range.len() as u64,
            user_count: users.len() as u64,
        })
    }
}
