//! Stoa Contracts
//!
//! Yield-bearing stable-value protocol for Casper.
//!
//! ## Architecture
//!
//! - **ActivatedToken**: rebasing receipt token over a credit ledger
//! - **DeactivatedToken**: non-rebasing counterpart, redeemable one way
//! - **YieldController**: venue deposits and withdrawals, rebases, backing reserve
//! - **SafeManager**: per-account collateral/debt ledger and collateral ratios
//! - **SafeOperations**: account-facing safe flows (open, borrow, repay, withdraw)
//!
//! Pure math lives next to the contracts: `credits` (credit conversion and
//! supply changes), `fees` (basis-point fees) and `ratio` (collateralization).

#![cfg_attr(target_arch = "wasm32", no_std)]

#[cfg(target_arch = "wasm32")]
extern crate alloc;

// Re-export odra for downstream usage
pub use odra;

// Core module declarations
pub mod types;
pub mod errors;
pub mod credits;
pub mod fees;
pub mod ratio;
pub mod interfaces;
pub mod vault_adapter;
pub mod oracle;

// Contract modules
pub mod activated_token;
pub mod deactivated_token;
pub mod controller;
pub mod safe_manager;
pub mod safe_operations;

// Test doubles for external collaborators
#[cfg(not(target_arch = "wasm32"))]
pub mod mocks;
