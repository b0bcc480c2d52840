//! Transfer Engine
//!
//! Moves money between two accounts inside one unit of work: one transfer
//! row, a debit and a credit entry, and both balance updates. Either all of
//! it commits or none of it is ever visible.
//!
//! # Lock order
//!
//! Balance updates take row locks. Both rows are always updated smaller id
//! first, whichever side is the source, so two opposite-direction transfers
//! over the same pair can never wait on each other in a cycle. There is no
//! retry loop; the ordering makes one unnecessary.

use std::future::Future;
use std::time::Duration;

use tracing::{Instrument, debug, error, info, info_span, warn};

use super::models::{CreateTransferParams, TransferParams, TransferResult};
use crate::account::{Account, AddAccountBalanceParams};
use crate::config::TransferConfig;
use crate::core_types::{AccountId, Amount};
use crate::entry::CreateEntryParams;
use crate::error::{LedgerError, TransactionError, ValidationError};
use crate::store::{EntryStore, Ledger, TransferStore, UnitOfWork};

pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Order in which a transfer's two rows are locked: smaller id first.
///
/// Independent of which account is the source.
#[inline]
pub fn lock_order(a: AccountId, b: AccountId) -> [AccountId; 2] {
    if a <= b { [a, b] } else { [b, a] }
}

/// Transactional transfer engine over any [`Ledger`] backend.
///
/// Holds no locks of its own; all mutual exclusion is the backend's.
pub struct TransferEngine<L: Ledger> {
    ledger: L,
    timeout: Duration,
}

impl<L: Ledger> TransferEngine<L> {
    pub fn new(ledger: L) -> Self {
        Self::with_timeout(ledger, DEFAULT_TRANSFER_TIMEOUT)
    }

    pub fn with_timeout(ledger: L, timeout: Duration) -> Self {
        Self { ledger, timeout }
    }

    pub fn from_config(ledger: L, config: &TransferConfig) -> Self {
        Self::with_timeout(ledger, Duration::from_millis(config.timeout_ms))
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute a transfer under the engine's timeout
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult, LedgerError> {
        self.execute_until(
            params,
            tokio::time::sleep(self.timeout),
            TransactionError::TimedOut(self.timeout),
        )
        .await
    }

    /// Execute a transfer that is abandoned when `cancel` completes.
    ///
    /// Cancellation before commit rolls everything back. Once commit has
    /// started the signal is ignored and the commit's outcome is returned.
    pub async fn transfer_with_cancel<C>(
        &self,
        params: TransferParams,
        cancel: C,
    ) -> Result<TransferResult, LedgerError>
    where
        C: Future<Output = ()>,
    {
        self.execute_until(params, cancel, TransactionError::Cancelled)
            .await
    }

    async fn execute_until<C>(
        &self,
        params: TransferParams,
        signal: C,
        fired: TransactionError,
    ) -> Result<TransferResult, LedgerError>
    where
        C: Future<Output = ()>,
    {
        validate(&params)?;

        let span = info_span!(
            "transfer",
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount
        );

        async move {
            tokio::pin!(signal);

            let mut tx = tokio::select! {
                biased;
                _ = &mut signal => {
                    warn!(reason = %fired, "Transfer abandoned before begin");
                    return Err(LedgerError::from(fired.clone()));
                }
                tx = self.ledger.begin() => tx?,
            };

            let outcome = tokio::select! {
                biased;
                _ = &mut signal => Err(LedgerError::from(fired.clone())),
                result = Self::apply(&mut tx, &params) => result,
            };

            match outcome {
                Ok(result) => {
                    tx.commit().await?;
                    info!(
                        transfer_id = result.transfer.id,
                        from_balance = result.from_account.balance,
                        to_balance = result.to_account.balance,
                        "Transfer committed"
                    );
                    Ok(result)
                }
                Err(e) => {
                    warn!(error = %e, code = e.code(), "Transfer failed, rolling back");
                    if let Err(rollback_err) = tx.rollback().await {
                        error!(error = %rollback_err, "Rollback failed");
                        return Err(TransactionError::Rollback(format!(
                            "{} (after: {})",
                            rollback_err, e
                        ))
                        .into());
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Steps inside the unit of work; any error aborts the whole transfer
    async fn apply(
        tx: &mut L::Tx,
        params: &TransferParams,
    ) -> Result<TransferResult, LedgerError> {
        let from = get_existing(tx, params.from_account_id).await?;
        let to = get_existing(tx, params.to_account_id).await?;
        if from.currency != to.currency {
            return Err(ValidationError::CurrencyMismatch {
                from: from.id,
                from_currency: from.currency,
                to: to.id,
                to_currency: to.currency,
            }
            .into());
        }

        let transfer = tx
            .create_transfer(CreateTransferParams {
                from_account_id: params.from_account_id,
                to_account_id: params.to_account_id,
                amount: params.amount,
            })
            .await?;

        let from_entry = tx
            .create_entry(CreateEntryParams {
                account_id: params.from_account_id,
                amount: -params.amount,
            })
            .await?;

        let to_entry = tx
            .create_entry(CreateEntryParams {
                account_id: params.to_account_id,
                amount: params.amount,
            })
            .await?;

        let [first, second] = lock_order(params.from_account_id, params.to_account_id);
        debug!(first, second, "Applying balance deltas");

        let (from_account, to_account) = if first == params.from_account_id {
            add_money(tx, first, -params.amount, second, params.amount).await?
        } else {
            let (to_account, from_account) =
                add_money(tx, first, params.amount, second, -params.amount).await?;
            (from_account, to_account)
        };

        if from_account.balance < 0 {
            return Err(LedgerError::InsufficientFunds {
                account_id: from_account.id,
                balance: from_account.balance + params.amount,
                amount: params.amount,
            });
        }

        Ok(TransferResult {
            transfer,
            from_entry,
            to_entry,
            from_account,
            to_account,
        })
    }
}

fn validate(params: &TransferParams) -> Result<(), ValidationError> {
    if params.amount <= 0 {
        return Err(ValidationError::NonPositiveAmount(params.amount));
    }
    if params.from_account_id == params.to_account_id {
        return Err(ValidationError::SelfTransfer(params.from_account_id));
    }
    Ok(())
}

/// Plain read; a miss means the caller named an unknown account
async fn get_existing<T: UnitOfWork>(tx: &mut T, id: AccountId) -> Result<Account, LedgerError> {
    tx.get_account(id).await.map_err(|e| {
        if e.is_not_found() {
            ValidationError::UnknownAccount(id).into()
        } else {
            e
        }
    })
}

/// Apply two deltas in exactly the order given
async fn add_money<T: UnitOfWork>(
    tx: &mut T,
    first_id: AccountId,
    first_amount: Amount,
    second_id: AccountId,
    second_amount: Amount,
) -> Result<(Account, Account), LedgerError> {
    let first = tx
        .add_account_balance(AddAccountBalanceParams {
            id: first_id,
            amount: first_amount,
        })
        .await?;

    let second = tx
        .add_account_balance(AddAccountBalanceParams {
            id: second_id,
            amount: second_amount,
        })
        .await?;

    Ok((first, second))
}
