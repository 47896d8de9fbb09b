use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::LedgerError;

use serde::Serialize;
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod analytics;
mod health;
mod server;
mod settings;
mod transactions;
mod user;

pub mod types {
    pub mod user {
        pub use api_types::user::{UserCreated, UserDetailResponse, UserNew, UserUpdate, UserView};
    }

    pub mod transaction {
        pub use api_types::transaction::{
            DepositNew, ExpenseNew, MonthResponse, SearchResponse, TransactionCreated,
            TransactionUpdate, TransactionView, WithdrawalNew,
        };
    }

    pub mod analytics {
        pub use api_types::analytics::AnalyticsResponse;
    }

    pub mod settings {
        pub use api_types::settings::{SettingsResponse, SettingsUpdate};
    }

    pub mod health {
        pub use api_types::health::HealthResponse;
    }
}

pub enum ServerError {
    Ledger(LedgerError),
    Generic(String),
}

//TODO: Find a better solution
#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_ledger_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AlreadyExists(_) => StatusCode::CONFLICT,
        LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LedgerError::InvalidAmount(_) | LedgerError::InvalidTransaction(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn message_for_ledger_error(err: LedgerError) -> String {
    match err {
        LedgerError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Ledger(err) => {
                (status_for_ledger_error(&err), message_for_ledger_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<LedgerError> for ServerError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}
