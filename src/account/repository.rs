//! Repository layer for the `accounts` table
//!
//! Every function takes any PostgreSQL executor, so the same SQL runs against
//! the pool (autocommit) or inside an open transaction.

use sqlx::PgExecutor;

use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, ListAccountsParams, UpdateAccountParams,
};
use super::validation;
use crate::core_types::AccountId;
use crate::error::{
    FOREIGN_KEY_VIOLATION, LedgerError, NUMERIC_VALUE_OUT_OF_RANGE, ValidationError, has_sql_state,
};

/// Account repository for CRUD operations
pub struct AccountRepository;

impl AccountRepository {
    /// Create a new account
    pub async fn create<'e, E>(
        executor: E,
        params: &CreateAccountParams,
    ) -> Result<Account, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        validation::validate_create(params)?;

        let account = sqlx::query_as::<_, Account>(
            r#"INSERT INTO accounts (owner, balance, currency)
               VALUES ($1, $2, $3)
               RETURNING id, owner, balance, currency, created_at"#,
        )
        .bind(&params.owner)
        .bind(params.balance)
        .bind(&params.currency)
        .fetch_one(executor)
        .await?;

        Ok(account)
    }

    /// Get account by ID
    pub async fn get<'e, E>(executor: E, id: AccountId) -> Result<Account, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(
            r#"SELECT id, owner, balance, currency, created_at
               FROM accounts WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(LedgerError::NotFound)
    }

    /// Overwrite the balance, leaving every other column untouched
    pub async fn update<'e, E>(
        executor: E,
        params: &UpdateAccountParams,
    ) -> Result<Account, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        validation::validate_update(params)?;

        sqlx::query_as::<_, Account>(
            r#"UPDATE accounts SET balance = $2
               WHERE id = $1
               RETURNING id, owner, balance, currency, created_at"#,
        )
        .bind(params.id)
        .bind(params.balance)
        .fetch_optional(executor)
        .await?
        .ok_or(LedgerError::NotFound)
    }

    /// Hard delete. Accounts still referenced by entries or transfers are refused.
    pub async fn delete<'e, E>(executor: E, id: AccountId) -> Result<(), LedgerError>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await
            .map_err(|e| {
                if has_sql_state(&e, FOREIGN_KEY_VIOLATION) {
                    LedgerError::from(ValidationError::AccountInUse(id))
                } else {
                    LedgerError::from(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound);
        }
        Ok(())
    }

    /// List accounts ordered by id
    pub async fn list<'e, E>(
        executor: E,
        params: &ListAccountsParams,
    ) -> Result<Vec<Account>, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        validation::validate_list(params)?;

        let rows = sqlx::query_as::<_, Account>(
            r#"SELECT id, owner, balance, currency, created_at
               FROM accounts
               ORDER BY id
               LIMIT $1 OFFSET $2"#,
        )
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Atomic read-modify-write of the balance.
    ///
    /// Inside a transaction the UPDATE takes the row lock and holds it until
    /// commit or rollback.
    pub async fn add_balance<'e, E>(
        executor: E,
        params: &AddAccountBalanceParams,
    ) -> Result<Account, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(
            r#"UPDATE accounts SET balance = balance + $2
               WHERE id = $1
               RETURNING id, owner, balance, currency, created_at"#,
        )
        .bind(params.id)
        .bind(params.amount)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            if has_sql_state(&e, NUMERIC_VALUE_OUT_OF_RANGE) {
                LedgerError::from(ValidationError::BalanceOverflow(params.id))
            } else {
                LedgerError::from(e)
            }
        })?
        .ok_or(LedgerError::NotFound)
    }
}
