//! Random fixture generators for tests and local seeding

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;

use crate::account::{CreateAccountParams, SUPPORTED_CURRENCIES};
use crate::core_types::Amount;

/// Random integer in `[min, max]`
pub fn random_int(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

/// Random lowercase string of length `n`
pub fn random_string(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

pub fn random_owner() -> String {
    random_string(6)
}

/// Random amount of money in `[0, 1000]`
pub fn random_money() -> Amount {
    random_int(0, 1000)
}

pub fn random_currency() -> String {
    SUPPORTED_CURRENCIES
        .choose(&mut rand::thread_rng())
        .unwrap_or(&SUPPORTED_CURRENCIES[0])
        .to_string()
}

/// Random valid account creation request
pub fn random_account_params() -> CreateAccountParams {
    CreateAccountParams {
        owner: random_owner(),
        balance: random_money(),
        currency: random_currency(),
    }
}
