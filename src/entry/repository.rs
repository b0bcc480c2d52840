//! Repository layer for the append-only `entries` table

use sqlx::PgExecutor;

use super::models::{CreateEntryParams, Entry, ListEntriesParams};
use crate::account::validation::validate_page;
use crate::core_types::EntryId;
use crate::error::{FOREIGN_KEY_VIOLATION, LedgerError, ValidationError, has_sql_state};

pub struct EntryRepository;

impl EntryRepository {
    pub async fn create<'e, E>(executor: E, params: &CreateEntryParams) -> Result<Entry, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Entry>(
            r#"INSERT INTO entries (account_id, amount)
               VALUES ($1, $2)
               RETURNING id, account_id, amount, created_at"#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if has_sql_state(&e, FOREIGN_KEY_VIOLATION) {
                LedgerError::from(ValidationError::UnknownAccount(params.account_id))
            } else {
                LedgerError::from(e)
            }
        })
    }

    pub async fn get<'e, E>(executor: E, id: EntryId) -> Result<Entry, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Entry>(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(LedgerError::NotFound)
    }

    /// List one account's entries ordered by id
    pub async fn list<'e, E>(
        executor: E,
        params: &ListEntriesParams,
    ) -> Result<Vec<Entry>, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        validate_page(params.limit, params.offset)?;

        let rows = sqlx::query_as::<_, Entry>(
            r#"SELECT id, account_id, amount, created_at
               FROM entries
               WHERE account_id = $1
               ORDER BY id
               LIMIT $2 OFFSET $3"#,
        )
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}
