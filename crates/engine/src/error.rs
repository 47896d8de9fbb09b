//! The module contains the errors the ledger can throw.
//!
//! The errors are:
//!
//! - [`NotFound`] thrown when a user or transaction is not found.
//! - [`AlreadyExists`] thrown when a unique name/email collides.
//! - [`InvalidAmount`] thrown for non-numeric or out-of-range amounts.
//! - [`InvalidTransaction`] thrown when parties do not match the kind.
//!
//!  [`NotFound`]: LedgerError::NotFound
//!  [`AlreadyExists`]: LedgerError::AlreadyExists
//!  [`InvalidAmount`]: LedgerError::InvalidAmount
//!  [`InvalidTransaction`]: LedgerError::InvalidTransaction
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("\"{0}\" already present!")]
    AlreadyExists(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::AlreadyExists(a), Self::AlreadyExists(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidTransaction(a), Self::InvalidTransaction(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
