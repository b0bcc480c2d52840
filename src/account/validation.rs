//! Input validation for account fields
//!
//! Checks run before any storage call so both backends reject the same
//! inputs with the same error.

use crate::core_types::Amount;
use crate::error::ValidationError;

use super::models::{CreateAccountParams, ListAccountsParams, UpdateAccountParams};

/// Currencies accounts may be opened in
pub const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "CAD"];

const MAX_OWNER_LEN: usize = 64;

/// Validate an owner name
///
/// # Validation Rules
/// - Non-empty after trimming
/// - At most 64 characters
/// - No control characters
pub fn validate_owner(owner: &str) -> Result<(), ValidationError> {
    let trimmed = owner.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::InvalidOwner(
            "owner must not be empty".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_OWNER_LEN {
        return Err(ValidationError::InvalidOwner(format!(
            "owner exceeds {} characters",
            MAX_OWNER_LEN
        )));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::InvalidOwner(
            "owner contains control characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a currency code (exact match, uppercase)
pub fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if SUPPORTED_CURRENCIES.contains(&currency) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedCurrency(currency.to_string()))
    }
}

pub fn validate_balance(balance: Amount) -> Result<(), ValidationError> {
    if balance < 0 {
        return Err(ValidationError::NegativeBalance(balance));
    }
    Ok(())
}

pub fn validate_page(limit: i64, offset: i64) -> Result<(), ValidationError> {
    if limit < 1 || offset < 0 {
        return Err(ValidationError::InvalidPagination { limit, offset });
    }
    Ok(())
}

pub fn validate_create(params: &CreateAccountParams) -> Result<(), ValidationError> {
    validate_owner(&params.owner)?;
    validate_currency(&params.currency)?;
    validate_balance(params.balance)
}

pub fn validate_update(params: &UpdateAccountParams) -> Result<(), ValidationError> {
    validate_balance(params.balance)
}

pub fn validate_list(params: &ListAccountsParams) -> Result<(), ValidationError> {
    validate_page(params.limit, params.offset)
}
