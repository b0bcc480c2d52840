//! Ledger entry module
//!
//! Entries are created only by the transfer engine, two per transfer.

pub mod models;
pub mod repository;

pub use models::{CreateEntryParams, Entry, ListEntriesParams};
pub use repository::EntryRepository;
