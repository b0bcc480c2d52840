//! Core types used throughout the ledger
//!
//! Identities are issued by per-table sequences and are never reused,
//! even when the unit of work that consumed one rolled back.

/// Account ID - primary key of `accounts`.
///
/// # Usage:
/// - Lock ordering: transfers touch the smaller id first
/// - Foreign key target for entries and transfers
pub type AccountId = i64;

/// Entry ID - primary key of `entries`
pub type EntryId = i64;

/// Transfer ID - primary key of `transfers`
pub type TransferId = i64;

/// Signed amount in minor currency units (cents).
///
/// Entries use the sign: negative = debit, positive = credit.
pub type Amount = i64;
