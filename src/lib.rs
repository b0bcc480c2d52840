//! Simple Ledger - double-entry accounts with atomic transfers
//!
//! # Modules
//!
//! - [`core_types`] - Identity and amount aliases
//! - [`account`] - Accounts: models, validation, SQL repository
//! - [`entry`] - Append-only ledger entries
//! - [`transfer`] - Transfer records, unit-of-work state and the transfer engine
//! - [`store`] - Storage capability traits with PostgreSQL and in-memory backends
//! - [`error`] - Shared error taxonomy
//! - [`db`] - Connection pool and schema
//! - [`config`] / [`logging`] - Process configuration and tracing setup
//! - [`random`] - Random fixtures

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod config;
pub mod db;
pub mod entry;
pub mod error;
pub mod logging;
pub mod random;
pub mod store;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, CreateAccountParams, ListAccountsParams, UpdateAccountParams};
pub use core_types::{AccountId, Amount, EntryId, TransferId};
pub use entry::{Entry, ListEntriesParams};
pub use error::{LedgerError, NO_ROWS, TransactionError, ValidationError};
pub use store::{AccountStore, EntryStore, InMemoryLedger, Ledger, PgLedger, TransferStore, UnitOfWork};
pub use transfer::{
    ListTransfersParams, Transfer, TransferEngine, TransferFilter, TransferParams, TransferResult,
    UnitOfWorkState,
};
