//! Repository layer for the append-only `transfers` table

use sqlx::PgExecutor;

use super::models::{CreateTransferParams, ListTransfersParams, Transfer};
use crate::account::validation::validate_page;
use crate::core_types::{AccountId, TransferId};
use crate::error::{FOREIGN_KEY_VIOLATION, LedgerError, ValidationError, has_sql_state};

/// Default name PostgreSQL gives the `to_account_id` reference
const TO_ACCOUNT_FKEY: &str = "transfers_to_account_id_fkey";

pub struct TransferRepository;

impl TransferRepository {
    pub async fn create<'e, E>(
        executor: E,
        params: &CreateTransferParams,
    ) -> Result<Transfer, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        if params.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(params.amount).into());
        }

        sqlx::query_as::<_, Transfer>(
            r#"INSERT INTO transfers (from_account_id, to_account_id, amount)
               VALUES ($1, $2, $3)
               RETURNING id, from_account_id, to_account_id, amount, created_at"#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if has_sql_state(&e, FOREIGN_KEY_VIOLATION) {
                let constraint = match &e {
                    sqlx::Error::Database(db) => db.constraint(),
                    _ => None,
                };
                LedgerError::from(ValidationError::UnknownAccount(missing_side(
                    constraint, params,
                )))
            } else {
                LedgerError::from(e)
            }
        })
    }

    pub async fn get<'e, E>(executor: E, id: TransferId) -> Result<Transfer, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Transfer>(
            r#"SELECT id, from_account_id, to_account_id, amount, created_at
               FROM transfers WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(LedgerError::NotFound)
    }

    /// List transfers ordered by id, filtered by either side
    pub async fn list<'e, E>(
        executor: E,
        params: &ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError>
    where
        E: PgExecutor<'e>,
    {
        validate_page(params.limit, params.offset)?;

        let rows = sqlx::query_as::<_, Transfer>(
            r#"SELECT id, from_account_id, to_account_id, amount, created_at
               FROM transfers
               WHERE ($1::BIGINT IS NULL AND $2::BIGINT IS NULL)
                  OR from_account_id = $1
                  OR to_account_id = $2
               ORDER BY id
               LIMIT $3 OFFSET $4"#,
        )
        .bind(params.filter.from_account_id)
        .bind(params.filter.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}

/// Account named by a violated foreign key; the source unless the
/// constraint is the destination's
fn missing_side(constraint: Option<&str>, params: &CreateTransferParams) -> AccountId {
    match constraint {
        Some(TO_ACCOUNT_FKEY) => params.to_account_id,
        _ => params.from_account_id,
    }
}
