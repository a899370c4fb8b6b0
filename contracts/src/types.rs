//! Common types used across the Stoa protocol.

use odra::prelude::*;
use odra::casper_types::account::AccountHash;
use odra::casper_types::U256;

/// Lifecycle of a Safe.
///
/// `ClosedByOwner` and `ClosedByLiquidation` are terminal.
#[odra::odra_type]
#[derive(Copy, Default)]
pub enum SafeStatus {
    #[default]
    NonExistent,
    Active,
    ClosedByOwner,
    ClosedByLiquidation,
}

impl SafeStatus {
    /// Whether `self -> next` is a reachable transition.
    pub fn can_transition_to(&self, next: SafeStatus) -> bool {
        matches!(
            (self, next),
            (SafeStatus::Active, SafeStatus::ClosedByOwner)
                | (SafeStatus::Active, SafeStatus::ClosedByLiquidation)
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SafeStatus::ClosedByOwner | SafeStatus::ClosedByLiquidation)
    }
}

/// Unique safe identifier.
///
/// A safe is identified by `(owner, index)` so a single owner can open many safes.
#[odra::odra_type]
#[derive(Copy)]
pub struct SafeKey {
    /// Owner address
    pub owner: Address,
    /// Owner-scoped index, assigned at open and never reused
    pub index: u64,
}

/// Safe data structure
#[odra::odra_type]
pub struct SafeData {
    /// Owner address
    pub owner: Address,
    /// Owner-scoped index
    pub index: u64,
    /// Activated (rebasing) token locked as collateral
    pub active_token: Address,
    /// Deactivated token borrowed against the collateral
    pub debt_token: Address,
    /// Collateral in yield venue shares
    pub collateral_shares: U256,
    /// Outstanding debt in debt-token units
    pub debt: U256,
    /// Mint fee recorded against the collateral, charged on release
    pub mint_fee_applied: U256,
    /// Redemption fee recorded against the collateral, charged on release
    pub redemption_fee_applied: U256,
    /// Cumulative origination fees paid on borrows
    pub origination_fees_paid: U256,
    /// Lifecycle status
    pub status: SafeStatus,
}

/// Safe query result
#[odra::odra_type]
pub struct SafeInfo {
    /// Full safe data
    pub safe: SafeData,
    /// Collateral value in underlying units (venue preview)
    pub collateral_value: U256,
    /// Current collateralization ratio in bps (U256::MAX when debt is zero)
    pub ratio_bps: U256,
    /// Whether the ratio is below the pair's MCR
    pub is_underwater: bool,
    /// Largest total debt the collateral supports at MCR
    pub max_borrow: U256,
}

/// Yield controller configuration
#[odra::odra_type]
pub struct ControllerConfig {
    /// Minimum underlying amount accepted by `deposit`
    pub min_deposit: U256,
    /// Minimum activated amount accepted by `withdraw`
    pub min_withdraw: U256,
    /// Keeper allowed to call `rebase`
    pub keeper: Address,
    /// Custodial safe operations contract (fee-exempt caller)
    pub safe_operations: Option<Address>,
    /// Whether deposits and withdrawals are paused
    pub paused: bool,
}

/// Result of a single rebase
#[odra::odra_type]
#[derive(Default)]
pub struct RebaseResult {
    /// Total yield measured (venue value minus supply)
    pub yield_amount: U256,
    /// Portion distributed to holders through the supply change
    pub holder_yield: U256,
    /// Portion minted to the protocol account
    pub protocol_yield: U256,
    /// Activated supply after the rebase
    pub new_supply: U256,
}

/// Running yield totals for observability
#[odra::odra_type]
#[derive(Default)]
pub struct YieldTotals {
    /// Sum of all measured yield
    pub total_yield: U256,
    /// Sum of all holder yield
    pub total_holder_yield: U256,
    /// Sum of all protocol yield
    pub total_protocol_yield: U256,
    /// Number of rebases that changed supply
    pub rebase_count: u64,
    /// Block time of the last supply-changing rebase
    pub last_rebase_timestamp: u64,
}

/// The null identity: an account hash of all zeros.
pub fn null_address() -> Address {
    Address::Account(AccountHash::default())
}

/// Whether `address` is the null identity.
pub fn is_null_address(address: &Address) -> bool {
    *address == null_address()
}
