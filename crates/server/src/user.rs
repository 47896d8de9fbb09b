//! User API endpoints.

use api_types::user::{
    EmailDigest as ApiDigest, UserCreated, UserDetailResponse, UserNew, UserToggled, UserUpdate,
    UserView,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::{ServerError, server::ServerState, transactions};

fn map_digest(digest: engine::EmailDigest) -> ApiDigest {
    match digest {
        engine::EmailDigest::None => ApiDigest::None,
        engine::EmailDigest::Last3 => ApiDigest::Last3,
        engine::EmailDigest::ThisWeek => ApiDigest::ThisWeek,
        engine::EmailDigest::ThisMonth => ApiDigest::ThisMonth,
    }
}

fn map_digest_in(digest: ApiDigest) -> engine::EmailDigest {
    match digest {
        ApiDigest::None => engine::EmailDigest::None,
        ApiDigest::Last3 => engine::EmailDigest::Last3,
        ApiDigest::ThisWeek => engine::EmailDigest::ThisWeek,
        ApiDigest::ThisMonth => engine::EmailDigest::ThisMonth,
    }
}

pub(crate) fn view(user: &engine::User) -> UserView {
    UserView {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        balance_cents: user.balance.cents(),
        is_active: user.is_active,
        email_opt_in: user.email_opt_in,
        email_transactions: map_digest(user.email_transactions),
    }
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<Vec<UserView>>, ServerError> {
    let users = state.ledger.users(false).await?;
    Ok(Json(users.iter().map(view).collect()))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<UserNew>,
) -> Result<(StatusCode, Json<UserCreated>), ServerError> {
    let id = state
        .ledger
        .create_user(engine::UserNew {
            name: payload.name,
            email: payload.email,
            email_opt_in: payload.email_opt_in,
            email_transactions: map_digest_in(payload.email_transactions),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserCreated { id })))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(payload): Json<UserUpdate>,
) -> Result<StatusCode, ServerError> {
    let created_at = match payload.created_at.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ServerError::Generic("invalid date format".to_string()))?;
            Some(date.and_time(NaiveTime::MIN).and_utc())
        }
        None => None,
    };

    state
        .ledger
        .update_user(
            id,
            engine::UserUpdate {
                name: payload.name,
                email: payload.email,
                created_at,
                email_opt_in: payload.email_opt_in,
                email_transactions: map_digest_in(payload.email_transactions),
            },
        )
        .await?;

    Ok(StatusCode::OK)
}

pub async fn toggle_active(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<UserToggled>, ServerError> {
    let is_active = state.ledger.toggle_user_active(id).await?;
    Ok(Json(UserToggled { id, is_active }))
}

#[derive(Deserialize)]
pub struct DetailQuery {
    pub page: Option<u64>,
}

pub async fn detail(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<UserDetailResponse>, ServerError> {
    let user = state.ledger.user(id).await?;
    let tz = state.ledger.timezone().await?;
    let page = state
        .ledger
        .user_transactions(id, query.page.unwrap_or(1), 20)
        .await?;

    Ok(Json(UserDetailResponse {
        user: view(&user),
        transactions: page
            .items
            .iter()
            .map(|tx| transactions::view(tx, tz))
            .collect(),
        page: page.page,
        pages: page.pages,
        total: page.total,
    }))
}
