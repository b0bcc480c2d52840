//! Account management module
//!
//! PostgreSQL-backed storage for ledger accounts.

pub mod models;
pub mod repository;
pub mod validation;

// Re-export commonly used types
pub use models::{
    Account, AddAccountBalanceParams, CreateAccountParams, ListAccountsParams, UpdateAccountParams,
};
pub use repository::AccountRepository;
pub use validation::SUPPORTED_CURRENCIES;
