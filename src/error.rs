//! Ledger Error Types
//!
//! One taxonomy shared by the stores and the transfer engine. Store errors
//! bubble to the engine unmodified; the engine never downgrades them.

use std::time::Duration;

use thiserror::Error;

use crate::core_types::{AccountId, Amount};
use crate::transfer::state::UnitOfWorkState;

/// Stable text of a lookup miss, identical for every storage backend.
pub const NO_ROWS: &str = "sql: no rows in result set";

/// SQLSTATE codes PostgreSQL uses for transaction-level conflicts
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for a foreign key violation
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE for BIGINT overflow
pub(crate) const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Input rejected before (or instead of) touching storage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be greater than zero: got {0}")]
    NonPositiveAmount(Amount),

    #[error("Source and destination account are the same: {0}")]
    SelfTransfer(AccountId),

    #[error("Account not found: {0}")]
    UnknownAccount(AccountId),

    #[error("Currency mismatch: account {from} is {from_currency}, account {to} is {to_currency}")]
    CurrencyMismatch {
        from: AccountId,
        from_currency: String,
        to: AccountId,
        to_currency: String,
    },

    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    #[error("Unsupported currency: '{0}'")]
    UnsupportedCurrency(String),

    #[error("Balance must not be negative: got {0}")]
    NegativeBalance(Amount),

    #[error("Balance overflow on account {0}")]
    BalanceOverflow(AccountId),

    #[error("Invalid pagination: limit={limit}, offset={offset}")]
    InvalidPagination { limit: i64, offset: i64 },

    #[error("Account {0} is still referenced by entries or transfers")]
    AccountInUse(AccountId),
}

/// Failure of the unit of work itself rather than of a statement inside it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Failed to begin unit of work: {0}")]
    Begin(String),

    #[error("Commit failed, unit of work rolled back: {0}")]
    Commit(String),

    #[error("Rollback failed: {0}")]
    Rollback(String),

    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Unit of work is no longer active (state: {0})")]
    Inactive(UnitOfWorkState),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: UnitOfWorkState,
        to: UnitOfWorkState,
    },

    #[error("Transfer timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Transfer cancelled before commit")]
    Cancelled,

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Ledger error taxonomy
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{}", NO_ROWS)]
    NotFound,

    #[error("Insufficient funds: account {account_id} has {balance}, needs {amount}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Amount,
        amount: Amount,
    },

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound)
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(e) => match e {
                ValidationError::NonPositiveAmount(_) => "INVALID_AMOUNT",
                ValidationError::SelfTransfer(_) => "SAME_ACCOUNT",
                ValidationError::UnknownAccount(_) => "ACCOUNT_NOT_FOUND",
                ValidationError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
                ValidationError::InvalidOwner(_) => "INVALID_OWNER",
                ValidationError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
                ValidationError::NegativeBalance(_) => "NEGATIVE_BALANCE",
                ValidationError::BalanceOverflow(_) => "OVERFLOW",
                ValidationError::InvalidPagination { .. } => "INVALID_PAGINATION",
                ValidationError::AccountInUse(_) => "ACCOUNT_IN_USE",
            },
            LedgerError::NotFound => "NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::Transaction(TransactionError::TimedOut(_)) => "TIMEOUT",
            LedgerError::Transaction(TransactionError::Cancelled) => "CANCELLED",
            LedgerError::Transaction(_) => "TRANSACTION_ERROR",
            LedgerError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Validation(ValidationError::UnknownAccount(_)) => 404,
            LedgerError::Validation(ValidationError::AccountInUse(_)) => 409,
            LedgerError::Validation(_) => 400,
            LedgerError::NotFound => 404,
            LedgerError::InsufficientFunds { .. } => 422,
            LedgerError::Transaction(TransactionError::Conflict(_)) => 409,
            LedgerError::Transaction(TransactionError::TimedOut(_)) => 504,
            LedgerError::Transaction(_) | LedgerError::Database(_) => 500,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if matches!(e, sqlx::Error::RowNotFound) {
            return LedgerError::NotFound;
        }
        if has_sql_state(&e, SERIALIZATION_FAILURE) || has_sql_state(&e, DEADLOCK_DETECTED) {
            return LedgerError::Transaction(TransactionError::Conflict(e.to_string()));
        }
        LedgerError::Database(e)
    }
}

/// True when PostgreSQL rejected the statement with the given SQLSTATE
pub(crate) fn has_sql_state(e: &sqlx::Error, code: &str) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}
