//! Transaction API endpoints.

use std::collections::BTreeMap;

use api_types::TransactionKind as ApiKind;
use api_types::transaction::{
    DayGroup, DepositNew, ExpenseNew, ItemView, MonthResponse, SearchResponse, TransactionCreated,
    TransactionUpdate, TransactionView, WithdrawalNew,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use engine::Money;
use serde::Deserialize;

use crate::{ServerError, server::ServerState};

pub(crate) fn map_kind(kind: engine::TransactionKind) -> ApiKind {
    match kind {
        engine::TransactionKind::Deposit => ApiKind::Deposit,
        engine::TransactionKind::Withdrawal => ApiKind::Withdrawal,
        engine::TransactionKind::Expense => ApiKind::Expense,
    }
}

pub(crate) fn view(tx: &engine::Transaction, tz: Tz) -> TransactionView {
    TransactionView {
        id: tx.id,
        kind: map_kind(tx.kind),
        date: tx.date.with_timezone(&tz).fixed_offset(),
        description: tx.description.clone(),
        amount_cents: tx.amount.cents(),
        from_user_id: tx.from_user_id,
        to_user_id: tx.to_user_id,
        receipt_path: tx.receipt_path.clone(),
        notes: tx.notes.clone(),
        items: tx
            .items
            .iter()
            .map(|item| ItemView {
                name: item.name.clone(),
                price_cents: item.price.cents(),
            })
            .collect(),
    }
}

fn parse_amount(raw: &str) -> Result<Money, ServerError> {
    Ok(raw.parse::<Money>()?)
}

fn submitted_date(date: Option<DateTime<FixedOffset>>) -> DateTime<Utc> {
    date.map_or_else(Utc::now, |dt| dt.with_timezone(&Utc))
}

/// Best-effort removal of a receipt file that no transaction references
/// anymore.
fn remove_orphaned(state: &ServerState, orphaned: Option<String>) {
    if let Some(path) = orphaned {
        let _ = std::fs::remove_file(state.upload_dir.join(path));
    }
}

pub async fn deposit(
    State(state): State<ServerState>,
    Json(payload): Json<DepositNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let amount = parse_amount(&payload.amount)?;
    let id = state
        .ledger
        .deposit(engine::DepositNew {
            user_id: payload.user_id,
            amount,
            description: payload.description,
            date: submitted_date(payload.date),
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TransactionCreated { ids: vec![id] })))
}

pub async fn withdrawal(
    State(state): State<ServerState>,
    Json(payload): Json<WithdrawalNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let amount = parse_amount(&payload.amount)?;
    let id = state
        .ledger
        .withdraw(engine::WithdrawalNew {
            user_id: payload.user_id,
            amount,
            description: payload.description,
            date: submitted_date(payload.date),
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TransactionCreated { ids: vec![id] })))
}

pub async fn expense(
    State(state): State<ServerState>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let mut items = Vec::with_capacity(payload.items.len());
    for item in payload.items {
        items.push(engine::ExpenseItemNew {
            name: item.name,
            price: parse_amount(&item.price)?,
            debtor_id: item.debtor_id,
        });
    }

    let ids = state
        .ledger
        .expense(engine::ExpenseNew {
            buyer_id: payload.buyer_id,
            description: payload.description,
            date: submitted_date(payload.date),
            items,
            receipt_path: payload.receipt_path,
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TransactionCreated { ids })))
}

#[derive(Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

pub async fn month(
    State(state): State<ServerState>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthResponse>, ServerError> {
    let tz = state.ledger.timezone().await?;
    let today = Utc::now().with_timezone(&tz).date_naive();

    let year = query.year.unwrap_or(today.year()).clamp(2000, 2100);
    let month = query.month.unwrap_or(today.month()).clamp(1, 12);

    let transactions = state.ledger.month_transactions(year, month).await?;

    // Group by local day, newest day first.
    let mut by_day: BTreeMap<NaiveDate, Vec<TransactionView>> = BTreeMap::new();
    let mut total = Money::ZERO;
    for tx in &transactions {
        total += tx.amount;
        by_day
            .entry(tx.date.with_timezone(&tz).date_naive())
            .or_default()
            .push(view(tx, tz));
    }
    let days = by_day
        .into_iter()
        .rev()
        .map(|(date, transactions)| DayGroup {
            date: date.format("%Y-%m-%d").to_string(),
            transactions,
        })
        .collect();

    let start_year = state
        .ledger
        .first_transaction_date()
        .await?
        .map_or(today.year(), |date| date.with_timezone(&tz).year());
    let year_range = (start_year..=today.year()).collect();

    Ok(Json(MonthResponse {
        year,
        month,
        days,
        transaction_count: transactions.len() as u64,
        total_cents: total.cents(),
        year_range,
    }))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub user: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub amount_min: Option<String>,
    pub amount_max: Option<String>,
    pub has_receipt: Option<String>,
    pub page: Option<u64>,
}

pub async fn search(
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ServerError> {
    let tz = state.ledger.timezone().await?;

    // Malformed filter values are ignored, matching the form behavior.
    let kind = query
        .kind
        .as_deref()
        .and_then(|raw| engine::TransactionKind::try_from(raw).ok());
    let parse_date = |raw: &Option<String>| {
        raw.as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    };
    let parse_money = |raw: &Option<String>| raw.as_deref().and_then(|s| s.parse::<Money>().ok());

    let filter = engine::TransactionFilter {
        text: query.q.clone(),
        kind,
        user_id: query.user,
        date_from: parse_date(&query.date_from),
        date_to: parse_date(&query.date_to),
        amount_min: parse_money(&query.amount_min),
        amount_max: parse_money(&query.amount_max),
        has_receipt: query.has_receipt.as_deref().is_some_and(|v| !v.is_empty()),
    };

    let page = state
        .ledger
        .search_transactions(&filter, query.page.unwrap_or(1), 25)
        .await?;

    Ok(Json(SearchResponse {
        transactions: page.items.iter().map(|tx| view(tx, tz)).collect(),
        page: page.page,
        pages: page.pages,
        total: page.total,
    }))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(payload): Json<TransactionUpdate>,
) -> Result<StatusCode, ServerError> {
    let mut items = Vec::with_capacity(payload.items.len());
    for item in payload.items {
        items.push(engine::ExpenseItemNew {
            name: item.name,
            price: parse_amount(&item.price)?,
            debtor_id: item.debtor_id,
        });
    }

    // A malformed amount keeps the stored one, like the edit form.
    let amount = payload
        .amount
        .as_deref()
        .and_then(|raw| raw.parse::<Money>().ok());

    let receipt = if payload.remove_receipt {
        engine::ReceiptUpdate::Remove
    } else if let Some(path) = payload.receipt_path {
        engine::ReceiptUpdate::Replace(path)
    } else {
        engine::ReceiptUpdate::Keep
    };

    let orphaned = state
        .ledger
        .update_transaction(
            id,
            engine::TransactionUpdate {
                description: payload.description,
                date: payload.date.map(|dt| dt.with_timezone(&Utc)),
                notes: payload.notes,
                from_user_id: payload.from_user_id,
                to_user_id: payload.to_user_id,
                amount,
                items,
                receipt,
            },
        )
        .await?;
    remove_orphaned(&state, orphaned);

    Ok(StatusCode::OK)
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServerError> {
    let orphaned = state.ledger.delete_transaction(id).await?;
    remove_orphaned(&state, orphaned);

    Ok(StatusCode::OK)
}
