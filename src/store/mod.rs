//! Storage capability traits
//!
//! The transfer engine sees storage only through these traits, so the
//! PostgreSQL backend and the in-memory fake are interchangeable.
//!
//! # Contract
//!
//! - A [`Ledger`] handle runs every store call in autocommit mode.
//! - [`Ledger::begin`] opens a [`UnitOfWork`]: its writes are visible to its
//!   own reads and to nobody else until [`UnitOfWork::commit`].
//! - [`AccountStore::add_account_balance`] is a single atomic
//!   read-modify-write. Inside a unit of work it takes the row lock and keeps
//!   it until commit or rollback.
//! - Dropping an active unit of work rolls it back.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;

use crate::account::{
    Account, AddAccountBalanceParams, CreateAccountParams, ListAccountsParams, UpdateAccountParams,
};
use crate::core_types::{AccountId, EntryId, TransferId};
use crate::entry::{CreateEntryParams, Entry, ListEntriesParams};
use crate::error::LedgerError;
use crate::transfer::models::{CreateTransferParams, ListTransfersParams, Transfer};
use crate::transfer::state::UnitOfWorkState;

#[async_trait]
pub trait AccountStore: Send {
    async fn create_account(&mut self, params: CreateAccountParams)
    -> Result<Account, LedgerError>;

    /// Fails with [`LedgerError::NotFound`] when absent
    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError>;

    /// Overwrite the balance only
    async fn update_account(&mut self, params: UpdateAccountParams)
    -> Result<Account, LedgerError>;

    async fn delete_account(&mut self, id: AccountId) -> Result<(), LedgerError>;

    async fn list_accounts(
        &mut self,
        params: ListAccountsParams,
    ) -> Result<Vec<Account>, LedgerError>;

    /// Add a signed delta to the stored balance and return the new row.
    ///
    /// Reserved for the transfer engine.
    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError>;
}

#[async_trait]
pub trait EntryStore: Send {
    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, LedgerError>;

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, LedgerError>;

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, LedgerError>;
}

#[async_trait]
pub trait TransferStore: Send {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError>;

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, LedgerError>;

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError>;
}

/// Atomic group of store operations.
///
/// State machine: `Active -> {Committed, RolledBack}`. A failed commit leaves
/// the unit of work `RolledBack` and reports a `TransactionError`.
#[async_trait]
pub trait UnitOfWork: AccountStore + EntryStore + TransferStore {
    fn state(&self) -> UnitOfWorkState;

    async fn commit(&mut self) -> Result<(), LedgerError>;

    async fn rollback(&mut self) -> Result<(), LedgerError>;
}

/// Storage handle that can open units of work
#[async_trait]
pub trait Ledger: Send + Sync {
    type Tx: UnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, LedgerError>;
}
