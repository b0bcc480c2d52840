//! PostgreSQL Ledger Backend
//!
//! `PgLedger` runs store calls in autocommit mode against the pool.
//! `PgUnitOfWork` wraps a `sqlx::Transaction`; row locks taken by
//! `UPDATE ... RETURNING` stay held until the transaction ends.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error};

use super::{AccountStore, EntryStore, Ledger, TransferStore, UnitOfWork};
use crate::account::{
    Account, AccountRepository, AddAccountBalanceParams, CreateAccountParams, ListAccountsParams,
    UpdateAccountParams,
};
use crate::core_types::{AccountId, EntryId, TransferId};
use crate::entry::{CreateEntryParams, Entry, EntryRepository, ListEntriesParams};
use crate::error::{LedgerError, TransactionError};
use crate::transfer::models::{CreateTransferParams, ListTransfersParams, Transfer};
use crate::transfer::repository::TransferRepository;
use crate::transfer::state::UnitOfWorkState;

/// Pool-backed ledger handle (cheap to clone)
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Ledger for PgLedger {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, LedgerError> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction");
            TransactionError::Begin(e.to_string())
        })?;

        Ok(PgUnitOfWork {
            tx: Some(tx),
            state: UnitOfWorkState::Active,
        })
    }
}

#[async_trait]
impl AccountStore for PgLedger {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        AccountRepository::create(&self.pool, &params).await
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        AccountRepository::get(&self.pool, id).await
    }

    async fn update_account(
        &mut self,
        params: UpdateAccountParams,
    ) -> Result<Account, LedgerError> {
        AccountRepository::update(&self.pool, &params).await
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), LedgerError> {
        AccountRepository::delete(&self.pool, id).await
    }

    async fn list_accounts(
        &mut self,
        params: ListAccountsParams,
    ) -> Result<Vec<Account>, LedgerError> {
        AccountRepository::list(&self.pool, &params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError> {
        AccountRepository::add_balance(&self.pool, &params).await
    }
}

#[async_trait]
impl EntryStore for PgLedger {
    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, LedgerError> {
        EntryRepository::create(&self.pool, &params).await
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, LedgerError> {
        EntryRepository::get(&self.pool, id).await
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, LedgerError> {
        EntryRepository::list(&self.pool, &params).await
    }
}

#[async_trait]
impl TransferStore for PgLedger {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        TransferRepository::create(&self.pool, &params).await
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, LedgerError> {
        TransferRepository::get(&self.pool, id).await
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        TransferRepository::list(&self.pool, &params).await
    }
}

/// Unit of work over one PostgreSQL transaction.
///
/// Dropping it while active lets sqlx roll the transaction back.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
    state: UnitOfWorkState,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> Result<&mut Transaction<'static, Postgres>, LedgerError> {
        self.state.ensure_active()?;
        self.tx
            .as_mut()
            .ok_or_else(|| TransactionError::Inactive(self.state).into())
    }
}

#[async_trait]
impl AccountStore for PgUnitOfWork {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        AccountRepository::create(&mut **self.conn()?, &params).await
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        AccountRepository::get(&mut **self.conn()?, id).await
    }

    async fn update_account(
        &mut self,
        params: UpdateAccountParams,
    ) -> Result<Account, LedgerError> {
        AccountRepository::update(&mut **self.conn()?, &params).await
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), LedgerError> {
        AccountRepository::delete(&mut **self.conn()?, id).await
    }

    async fn list_accounts(
        &mut self,
        params: ListAccountsParams,
    ) -> Result<Vec<Account>, LedgerError> {
        AccountRepository::list(&mut **self.conn()?, &params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError> {
        AccountRepository::add_balance(&mut **self.conn()?, &params).await
    }
}

#[async_trait]
impl EntryStore for PgUnitOfWork {
    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, LedgerError> {
        EntryRepository::create(&mut **self.conn()?, &params).await
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, LedgerError> {
        EntryRepository::get(&mut **self.conn()?, id).await
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, LedgerError> {
        EntryRepository::list(&mut **self.conn()?, &params).await
    }
}

#[async_trait]
impl TransferStore for PgUnitOfWork {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        TransferRepository::create(&mut **self.conn()?, &params).await
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, LedgerError> {
        TransferRepository::get(&mut **self.conn()?, id).await
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        TransferRepository::list(&mut **self.conn()?, &params).await
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn state(&self) -> UnitOfWorkState {
        self.state
    }

    async fn commit(&mut self) -> Result<(), LedgerError> {
        self.state.ensure_active()?;
        let tx = self
            .tx
            .take()
            .ok_or(TransactionError::Inactive(self.state))?;

        match tx.commit().await {
            Ok(()) => {
                self.state.transition(UnitOfWorkState::Committed)?;
                debug!("Transaction committed");
                Ok(())
            }
            Err(e) => {
                // PostgreSQL discards the transaction when COMMIT fails
                self.state.transition(UnitOfWorkState::RolledBack)?;
                error!(error = %e, "Commit failed");
                Err(TransactionError::Commit(e.to_string()).into())
            }
        }
    }

    async fn rollback(&mut self) -> Result<(), LedgerError> {
        self.state.ensure_active()?;
        let tx = self
            .tx
            .take()
            .ok_or(TransactionError::Inactive(self.state))?;

        self.state.transition(UnitOfWorkState::RolledBack)?;
        tx.rollback()
            .await
            .map_err(|e| TransactionError::Rollback(e.to_string()).into())
    }
}
