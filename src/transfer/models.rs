//! Transfer records and engine request/result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::account::Account;
use crate::core_types::{AccountId, Amount, TransferId};
use crate::entry::Entry;

/// Immutable record of one transfer intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

/// Transfer list filter.
///
/// A row matches when it matches any provided id; an empty filter matches
/// every row.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransferFilter {
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
}

impl TransferFilter {
    /// Transfers touching `account_id` on either side
    pub fn touching(account_id: AccountId) -> Self {
        Self {
            from_account_id: Some(account_id),
            to_account_id: Some(account_id),
        }
    }

    pub fn matches(&self, transfer: &Transfer) -> bool {
        if self.from_account_id.is_none() && self.to_account_id.is_none() {
            return true;
        }
        self.from_account_id == Some(transfer.from_account_id)
            || self.to_account_id == Some(transfer.to_account_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListTransfersParams {
    pub filter: TransferFilter,
    pub limit: i64,
    pub offset: i64,
}

/// Transfer engine request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Amount) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }
}

/// Everything one committed transfer produced.
///
/// The account rows are the values right after the balance update, inside
/// the same unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}
