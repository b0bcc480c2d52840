//! Transfers
//!
//! Append-only transfer records plus the engine that creates them.
//!
//! # Flow
//!
//! ```text
//! validate ─▶ BEGIN ─▶ INSERT transfer ─▶ INSERT debit entry ─▶ INSERT credit entry
//!                 ─▶ UPDATE min(id) balance ─▶ UPDATE max(id) balance ─▶ COMMIT
//!                                  (any failure) ─▶ ROLLBACK
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All-or-nothing**: no entry, transfer or balance change is visible
//!    before commit, and none survives a rollback
//! 2. **Atomic deltas**: balances move by `balance = balance + delta`, never
//!    by read-then-overwrite
//! 3. **Global lock order**: rows are locked smaller id first
//! 4. **No overdraft**: a source balance below zero aborts the transfer

pub mod engine;
pub mod models;
pub mod repository;
pub mod state;


pub use engine::{TransferEngine, lock_order};
pub use models::{
    CreateTransferParams, ListTransfersParams, Transfer, TransferFilter, TransferParams,
    TransferResult,
};
pub use repository::TransferRepository;
pub use state::UnitOfWorkState;
