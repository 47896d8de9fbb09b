//! Analytics API endpoints.

use std::collections::BTreeMap;

use api_types::analytics::{
    AnalyticsResponse, BalanceEntry, BalanceHistory, Meta, TopItems, TransactionVolume,
    TypeBreakdown,
};
use axum::{Json, extract::Query, extract::State};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::{ServerError, server::ServerState};

#[derive(Deserialize)]
pub struct DataQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// Comma-separated user ids.
    pub users: Option<String>,
}

pub async fn data(
    State(state): State<ServerState>,
    Query(query): Query<DataQuery>,
) -> Result<Json<AnalyticsResponse>, ServerError> {
    let tz = state.ledger.timezone().await?;
    let today = Utc::now().with_timezone(&tz).date_naive();

    // Malformed dates fall back to the default range (last 90 days).
    let date_from = query
        .date_from
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .unwrap_or_else(|| today - Duration::days(90));
    let date_to = query
        .date_to
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .unwrap_or(today);

    let user_ids = query.users.as_deref().map(|raw| {
        raw.split(',')
            .filter_map(|part| part.trim().parse::<i32>().ok())
            .collect::<Vec<_>>()
    });

    let report = state
        .ledger
        .analytics(engine::AnalyticsQuery {
            date_from,
            date_to,
            user_ids,
        })
        .await?;

    let datasets: BTreeMap<String, Vec<i64>> = report
        .history
        .into_iter()
        .map(|series| {
            (
                series.name,
                series.balances.iter().map(|b| b.cents()).collect(),
            )
        })
        .collect();

    Ok(Json(AnalyticsResponse {
        balances: report
            .balances
            .into_iter()
            .map(|entry| BalanceEntry {
                name: entry.name,
                balance_cents: entry.balance.cents(),
            })
            .collect(),
        balance_history: BalanceHistory {
            labels: report.history_labels,
            datasets,
        },
        transaction_volume: TransactionVolume {
            labels: report.volume_labels,
            counts: report.volume_counts,
            amounts_cents: report.volume_amounts.iter().map(|m| m.cents()).collect(),
        },
        type_breakdown: TypeBreakdown {
            kinds: report
                .by_kind
                .iter()
                .map(|stat| crate::transactions::map_kind(stat.kind))
                .collect(),
            counts: report.by_kind.iter().map(|stat| stat.count).collect(),
            amounts_cents: report
                .by_kind
                .iter()
                .map(|stat| stat.total.cents())
                .collect(),
        },
        top_items: TopItems {
            names: report.top_items.iter().map(|i| i.name.clone()).collect(),
            counts: report.top_items.iter().map(|i| i.count).collect(),
            totals_cents: report.top_items.iter().map(|i| i.total.cents()).collect(),
        },
        meta: Meta {
            date_from: date_from.format("%Y-%m-%d").to_string(),
            date_to: date_to.format("%Y-%m-%d").to_string(),
            transaction_count: report.transaction_count,
            user_count: report.user_count,
        },
    }))
}
