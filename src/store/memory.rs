//! In-Memory Ledger Backend
//!
//! Process-local stand-in for the PostgreSQL backend with the same
//! transactional behaviour:
//!
//! - every account row has its own async lock; a unit of work that writes a
//!   row holds the lock until it commits or rolls back
//! - writes are buffered per unit of work and published atomically on commit
//! - reads outside the writer see the last committed row (read committed)
//! - identities come from sequences and are never reissued
//!
//! Acquiring row locks in inconsistent order deadlocks here exactly as it
//! would in PostgreSQL, minus the deadlock detector.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::{debug, warn};

use super::{AccountStore, EntryStore, Ledger, TransferStore, UnitOfWork};
use crate::account::validation;
use crate::account::{
    Account, AddAccountBalanceParams, CreateAccountParams, ListAccountsParams, UpdateAccountParams,
};
use crate::core_types::{AccountId, EntryId, TransferId};
use crate::entry::{CreateEntryParams, Entry, ListEntriesParams};
use crate::error::{LedgerError, TransactionError, ValidationError};
use crate::transfer::models::{CreateTransferParams, ListTransfersParams, Transfer};
use crate::transfer::state::UnitOfWorkState;

struct AccountRow {
    account: Account,
    lock: Arc<RowLock<()>>,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, AccountRow>,
    entries: BTreeMap<EntryId, Entry>,
    transfers: BTreeMap<TransferId, Transfer>,
}

impl Tables {
    fn is_referenced(&self, id: AccountId) -> bool {
        self.entries.values().any(|e| e.account_id == id)
            || self
                .transfers
                .values()
                .any(|t| t.from_account_id == id || t.to_account_id == id)
    }
}

#[derive(Default)]
struct Sequence(AtomicI64);

impl Sequence {
    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    account_seq: Sequence,
    entry_seq: Sequence,
    transfer_seq: Sequence,
}

impl Shared {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, LedgerError> {
        self.tables
            .lock()
            .map_err(|_| TransactionError::Poisoned.into())
    }
}

/// Committed row counts, for assertions in tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCounts {
    pub accounts: usize,
    pub entries: usize,
    pub transfers: usize,
}

/// In-memory ledger handle (cheap to clone, clones share storage)
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    shared: Arc<Shared>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin_tx(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork {
            shared: self.shared.clone(),
            state: UnitOfWorkState::Active,
            row_locks: BTreeMap::new(),
            accounts: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }
    }

    pub fn table_counts(&self) -> Result<TableCounts, LedgerError> {
        let tables = self.shared.tables()?;
        Ok(TableCounts {
            accounts: tables.accounts.len(),
            entries: tables.entries.len(),
            transfers: tables.transfers.len(),
        })
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork, LedgerError> {
        Ok(self.begin_tx())
    }
}

/// Buffered unit of work over [`InMemoryLedger`].
///
/// Dropping it while active discards the buffers and releases its row locks.
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    state: UnitOfWorkState,
    row_locks: BTreeMap<AccountId, OwnedMutexGuard<()>>,
    /// `None` marks a pending delete
    accounts: BTreeMap<AccountId, Option<Account>>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl InMemoryUnitOfWork {
    /// Run one autocommit statement's outcome to a terminal state
    async fn finish<T: Send>(
        mut self,
        result: Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                self.rollback().await?;
                Err(e)
            }
        }
    }

    /// Row as this unit of work sees it: own writes first, then committed
    fn visible_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        if let Some(pending) = self.accounts.get(&id) {
            return Ok(pending.clone());
        }
        let tables = self.shared.tables()?;
        Ok(tables.accounts.get(&id).map(|row| row.account.clone()))
    }

    /// Take the row lock for `id`, waiting for any other holder to finish
    async fn lock_row(&mut self, id: AccountId) -> Result<(), LedgerError> {
        if self.row_locks.contains_key(&id) {
            return Ok(());
        }

        let lock = {
            let tables = self.shared.tables()?;
            match tables.accounts.get(&id) {
                Some(row) => row.lock.clone(),
                // Created by this unit of work (invisible to others) or absent
                None if self.accounts.contains_key(&id) => return Ok(()),
                None => return Err(LedgerError::NotFound),
            }
        };

        let guard = lock.lock_owned().await;
        self.row_locks.insert(id, guard);
        Ok(())
    }

    /// Lock the row and return its current value, or NotFound
    async fn lock_visible(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        self.lock_row(id).await?;
        self.visible_account(id)?.ok_or(LedgerError::NotFound)
    }

    fn require_account(&self, id: AccountId) -> Result<(), LedgerError> {
        match self.visible_account(id)? {
            Some(_) => Ok(()),
            None => Err(ValidationError::UnknownAccount(id).into()),
        }
    }

    fn discard(&mut self) {
        self.accounts.clear();
        self.entries.clear();
        self.transfers.clear();
        self.row_locks.clear();
    }

    /// Foreign keys are checked again at commit: a concurrent unit of work may
    /// have deleted a referenced account, or referenced one we delete.
    fn check_references(&self, tables: &Tables) -> Result<(), TransactionError> {
        let exists = |id: AccountId| match self.accounts.get(&id) {
            Some(pending) => pending.is_some(),
            None => tables.accounts.contains_key(&id),
        };

        for entry in &self.entries {
            if !exists(entry.account_id) {
                return Err(TransactionError::Commit(format!(
                    "entry {} references missing account {}",
                    entry.id, entry.account_id
                )));
            }
        }
        for transfer in &self.transfers {
            if !exists(transfer.from_account_id) || !exists(transfer.to_account_id) {
                return Err(TransactionError::Commit(format!(
                    "transfer {} references a missing account",
                    transfer.id
                )));
            }
        }
        for (id, pending) in &self.accounts {
            if pending.is_none() && tables.is_referenced(*id) {
                return Err(TransactionError::Commit(format!(
                    "account {} is referenced by committed rows",
                    id
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryUnitOfWork {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        self.state.ensure_active()?;
        validation::validate_create(&params)?;

        let account = Account {
            id: self.shared.account_seq.next(),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, Some(account.clone()));
        Ok(account)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        self.state.ensure_active()?;
        self.visible_account(id)?.ok_or(LedgerError::NotFound)
    }

    async fn update_account(
        &mut self,
        params: UpdateAccountParams,
    ) -> Result<Account, LedgerError> {
        self.state.ensure_active()?;
        validation::validate_update(&params)?;

        let mut account = self.lock_visible(params.id).await?;
        account.balance = params.balance;
        self.accounts.insert(account.id, Some(account.clone()));
        Ok(account)
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), LedgerError> {
        self.state.ensure_active()?;
        self.lock_visible(id).await?;

        let referenced_here = self.entries.iter().any(|e| e.account_id == id)
            || self
                .transfers
                .iter()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced_here || self.shared.tables()?.is_referenced(id) {
            return Err(ValidationError::AccountInUse(id).into());
        }

        self.accounts.insert(id, None);
        Ok(())
    }

    async fn list_accounts(
        &mut self,
        params: ListAccountsParams,
    ) -> Result<Vec<Account>, LedgerError> {
        self.state.ensure_active()?;
        validation::validate_list(&params)?;

        let mut view: BTreeMap<AccountId, Account> = {
            let tables = self.shared.tables()?;
            tables
                .accounts
                .iter()
                .map(|(id, row)| (*id, row.account.clone()))
                .collect()
        };
        for (id, pending) in &self.accounts {
            match pending {
                Some(account) => view.insert(*id, account.clone()),
                None => view.remove(id),
            };
        }

        Ok(view
            .into_values()
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .collect())
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError> {
        self.state.ensure_active()?;

        let mut account = self.lock_visible(params.id).await?;
        account.balance = account
            .balance
            .checked_add(params.amount)
            .ok_or(ValidationError::BalanceOverflow(params.id))?;
        self.accounts.insert(account.id, Some(account.clone()));
        Ok(account)
    }
}

#[async_trait]
impl EntryStore for InMemoryUnitOfWork {
    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, LedgerError> {
        self.state.ensure_active()?;
        self.require_account(params.account_id)?;

        let entry = Entry {
            id: self.shared.entry_seq.next(),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, LedgerError> {
        self.state.ensure_active()?;
        if let Some(entry) = self.entries.iter().find(|e| e.id == id) {
            return Ok(entry.clone());
        }
        let tables = self.shared.tables()?;
        tables.entries.get(&id).cloned().ok_or(LedgerError::NotFound)
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, LedgerError> {
        self.state.ensure_active()?;
        validation::validate_page(params.limit, params.offset)?;

        let mut rows: Vec<Entry> = {
            let tables = self.shared.tables()?;
            tables
                .entries
                .values()
                .filter(|e| e.account_id == params.account_id)
                .cloned()
                .collect()
        };
        rows.extend(
            self.entries
                .iter()
                .filter(|e| e.account_id == params.account_id)
                .cloned(),
        );
        rows.sort_by_key(|e| e.id);

        Ok(rows
            .into_iter()
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .collect())
    }
}

#[async_trait]
impl TransferStore for InMemoryUnitOfWork {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        self.state.ensure_active()?;
        if params.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(params.amount).into());
        }
        self.require_account(params.from_account_id)?;
        self.require_account(params.to_account_id)?;

        let transfer = Transfer {
            id: self.shared.transfer_seq.next(),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, LedgerError> {
        self.state.ensure_active()?;
        if let Some(transfer) = self.transfers.iter().find(|t| t.id == id) {
            return Ok(transfer.clone());
        }
        let tables = self.shared.tables()?;
        tables
            .transfers
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound)
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        self.state.ensure_active()?;
        validation::validate_page(params.limit, params.offset)?;

        let filter = params.filter;
        let mut rows: Vec<Transfer> = {
            let tables = self.shared.tables()?;
            tables
                .transfers
                .values()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect()
        };
        rows.extend(self.transfers.iter().filter(|t| filter.matches(t)).cloned());
        rows.sort_by_key(|t| t.id);

        Ok(rows
            .into_iter()
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn state(&self) -> UnitOfWorkState {
        self.state
    }

    async fn commit(&mut self) -> Result<(), LedgerError> {
        self.state.ensure_active()?;

        let published = {
            let shared = self.shared.clone();
            let guard = shared.tables.lock().map_err(|_| TransactionError::Poisoned);
            match guard.and_then(|tables| self.check_references(&tables).map(|()| tables)) {
                Ok(mut tables) => {
                    for (id, pending) in std::mem::take(&mut self.accounts) {
                        match pending {
                            Some(account) => match tables.accounts.get_mut(&id) {
                                Some(row) => row.account = account,
                                None => {
                                    tables.accounts.insert(
                                        id,
                                        AccountRow {
                                            account,
                                            lock: Arc::new(RowLock::new(())),
                                        },
                                    );
                                }
                            },
                            None => {
                                tables.accounts.remove(&id);
                            }
                        }
                    }
                    for entry in self.entries.drain(..) {
                        tables.entries.insert(entry.id, entry);
                    }
                    for transfer in self.transfers.drain(..) {
                        tables.transfers.insert(transfer.id, transfer);
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        match published {
            Ok(()) => {
                self.state.transition(UnitOfWorkState::Committed)?;
                self.row_locks.clear();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "In-memory commit rejected");
                self.state.transition(UnitOfWorkState::RolledBack)?;
                self.discard();
                Err(e.into())
            }
        }
    }

    async fn rollback(&mut self) -> Result<(), LedgerError> {
        self.state.transition(UnitOfWorkState::RolledBack)?;
        debug!(
            entries = self.entries.len(),
            transfers = self.transfers.len(),
            "Discarding buffered writes"
        );
        self.discard();
        Ok(())
    }
}

macro_rules! autocommit {
    ($ledger:expr, |$tx:ident| $call:expr) => {{
        let mut $tx = $ledger.begin_tx();
        let result = $call.await;
        $tx.finish(result).await
    }};
}

#[async_trait]
impl AccountStore for InMemoryLedger {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        autocommit!(self, |tx| tx.create_account(params))
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        autocommit!(self, |tx| tx.get_account(id))
    }

    async fn update_account(
        &mut self,
        params: UpdateAccountParams,
    ) -> Result<Account, LedgerError> {
        autocommit!(self, |tx| tx.update_account(params))
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), LedgerError> {
        autocommit!(self, |tx| tx.delete_account(id))
    }

    async fn list_accounts(
        &mut self,
        params: ListAccountsParams,
    ) -> Result<Vec<Account>, LedgerError> {
        autocommit!(self, |tx| tx.list_accounts(params))
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError> {
        autocommit!(self, |tx| tx.add_account_balance(params))
    }
}

#[async_trait]
impl EntryStore for InMemoryLedger {
    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, LedgerError> {
        autocommit!(self, |tx| tx.create_entry(params))
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, LedgerError> {
        autocommit!(self, |tx| tx.get_entry(id))
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, LedgerError> {
        autocommit!(self, |tx| tx.list_entries(params))
    }
}

#[async_trait]
impl TransferStore for InMemoryLedger {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        autocommit!(self, |tx| tx.create_transfer(params))
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, LedgerError> {
        autocommit!(self, |tx| tx.get_transfer(id))
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        autocommit!(self, |tx| tx.list_transfers(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn usd(owner: &str, balance: i64) -> CreateAccountParams {
        CreateAccountParams {
            owner: owner.to_string(),
            balance,
            currency: "USD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let mut ledger = InMemoryLedger::new();
        let account = ledger.create_account(usd("alice", 100)).await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        let updated = tx
            .add_account_balance(AddAccountBalanceParams {
                id: account.id,
                amount: 50,
            })
            .await
            .unwrap();
        assert_eq!(updated.balance, 150);
        assert_eq!(tx.get_account(account.id).await.unwrap().balance, 150);

        // Outside the unit of work the committed row is still visible
        assert_eq!(ledger.get_account(account.id).await.unwrap().balance, 100);

        tx.commit().await.unwrap();
        assert_eq!(ledger.get_account(account.id).await.unwrap().balance, 150);
    }

    #[tokio::test]
    async fn test_rollback_discards_everything() {
        let mut ledger = InMemoryLedger::new();
        let account = ledger.create_account(usd("alice", 100)).await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        tx.add_account_balance(AddAccountBalanceParams {
            id: account.id,
            amount: -30,
        })
        .await
        .unwrap();
        tx.create_entry(CreateEntryParams {
            account_id: account.id,
            amount: -30,
        })
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(tx.state(), UnitOfWorkState::RolledBack);
        assert_eq!(ledger.get_account(account.id).await.unwrap().balance, 100);
        assert_eq!(ledger.table_counts().unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_terminal_unit_of_work_rejects_statements() {
        let mut ledger = InMemoryLedger::new();
        let account = ledger.create_account(usd("alice", 100)).await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        tx.commit().await.unwrap();

        let err = tx.get_account(account.id).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Transaction(TransactionError::Inactive(UnitOfWorkState::Committed))
        ));
        assert!(tx.commit().await.is_err());
        assert!(tx.rollback().await.is_err());
    }

    #[tokio::test]
    async fn test_row_lock_held_until_commit() {
        let mut ledger = InMemoryLedger::new();
        let account = ledger.create_account(usd("alice", 100)).await.unwrap();

        let mut holder = ledger.begin().await.unwrap();
        holder
            .add_account_balance(AddAccountBalanceParams {
                id: account.id,
                amount: 1,
            })
            .await
            .unwrap();

        let mut waiter = ledger.clone();
        let blocked = tokio::spawn(async move {
            waiter
                .add_account_balance(AddAccountBalanceParams {
                    id: account.id,
                    amount: 1,
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "second writer must wait for the lock");

        holder.commit().await.unwrap();
        let after = blocked.await.unwrap().unwrap();
        assert_eq!(after.balance, 102, "no lost update");
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_releases_locks() {
        let mut ledger = InMemoryLedger::new();
        let account = ledger.create_account(usd("alice", 100)).await.unwrap();

        {
            let mut tx = ledger.begin().await.unwrap();
            tx.add_account_balance(AddAccountBalanceParams {
                id: account.id,
                amount: 7,
            })
            .await
            .unwrap();
        }

        let updated = tokio::time::timeout(
            Duration::from_secs(1),
            ledger.add_account_balance(AddAccountBalanceParams {
                id: account.id,
                amount: 1,
            }),
        )
        .await
        .expect("lock must be free after drop")
        .unwrap();
        assert_eq!(updated.balance, 101);
    }

    #[tokio::test]
    async fn test_delete_referenced_account_refused() {
        let mut ledger = InMemoryLedger::new();
        let account = ledger.create_account(usd("alice", 100)).await.unwrap();
        ledger
            .create_entry(CreateEntryParams {
                account_id: account.id,
                amount: 5,
            })
            .await
            .unwrap();

        let err = ledger.delete_account(account.id).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::AccountInUse(id)) if id == account.id
        ));
        assert!(ledger.get_account(account.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_commit_on_poisoned_tables_rolls_back() {
        let mut ledger = InMemoryLedger::new();
        let account = ledger.create_account(usd("alice", 100)).await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        tx.add_account_balance(AddAccountBalanceParams {
            id: account.id,
            amount: 5,
        })
        .await
        .unwrap();

        let shared = ledger.shared.clone();
        let _ = std::thread::spawn(move || {
            let _tables = shared.tables.lock().unwrap();
            panic!("poison the tables");
        })
        .join();

        let err = tx.commit().await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Transaction(TransactionError::Poisoned)
        ));
        assert_eq!(tx.state(), UnitOfWorkState::RolledBack);
        assert!(tx.row_locks.is_empty());
        assert!(tx.accounts.is_empty());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_rollback() {
        let mut ledger = InMemoryLedger::new();

        let mut tx = ledger.begin().await.unwrap();
        let discarded = tx.create_account(usd("ghost", 0)).await.unwrap();
        tx.rollback().await.unwrap();

        let kept = ledger.create_account(usd("alice", 0)).await.unwrap();
        assert!(kept.id > discarded.id);
        assert!(ledger.get_account(discarded.id).await.unwrap_err().is_not_found());
    }
}
