//! Position ledger for Safes.
//!
//! Stores collateral, debt and fee markers per `(owner, index)` and answers
//! collateralization questions. Every mutating entry point is reserved for
//! the safe operations contract, which moves the tokens; this contract only
//! keeps the books.
//!
//! Collateral is booked as shares of the activated tokens safe operations
//! holds for all safes of that token. A safe is worth its pro-rata part of
//! that custody, before and after every rebase.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::{OrRevert, StoaError};
use crate::oracle::Oracle;
use crate::ratio::{collateral_ratio_bps, is_below_mcr, max_debt_at_mcr, unbounded_ratio};
use crate::interfaces::RebasingContractRef;
use crate::types::{SafeData, SafeInfo, SafeKey, SafeStatus};

#[odra::event]
pub struct SafeOpened {
    pub owner: Address,
    pub index: u64,
    pub active_token: Address,
    pub debt_token: Address,
    pub shares: U256,
}

#[odra::event]
pub struct SafeAdjusted {
    pub owner: Address,
    pub index: u64,
    pub collateral_shares: U256,
    pub mint_fee_applied: U256,
    pub redemption_fee_applied: U256,
}

#[odra::event]
pub struct DebtAdjusted {
    pub owner: Address,
    pub index: u64,
    pub debt: U256,
    pub origination_fee: U256,
}

#[odra::event]
pub struct SafeStatusChanged {
    pub owner: Address,
    pub index: u64,
    pub status: SafeStatus,
}

/// Safe Manager Contract
#[odra::module(events = [SafeOpened, SafeAdjusted, DebtAdjusted, SafeStatusChanged])]
pub struct SafeManager {
    /// (owner, index) -> safe
    safes: Mapping<SafeKey, SafeData>,
    /// Next index per owner
    safe_count: Mapping<Address, u64>,
    /// (active_token, debt_token) -> MCR in bps; zero means unsupported
    mcr: Mapping<(Address, Address), u32>,
    /// Collateral shares booked across all safes, per activated token
    total_collateral: Mapping<Address, U256>,
    oracle: Var<Option<Address>>,
    safe_operations: Var<Option<Address>>,
    admin: Var<Address>,
}

#[odra::module]
impl SafeManager {
    pub fn init(&mut self, admin: Address, oracle: Address) {
        self.admin.set(admin);
        self.oracle.set(Some(oracle));
        self.safe_operations.set(None);
    }

    // ========== Ledger Functions (safe operations only) ==========

    /// Open a safe for `owner` and return its index
    pub fn initialize(
        &mut self,
        owner: Address,
        active_token: Address,
        debt_token: Address,
        shares: U256,
        mint_fee_applied: U256,
        redemption_fee_applied: U256,
    ) -> u64 {
        self.require_safe_operations();
        if self.get_mcr(active_token, debt_token) == 0 {
            self.env().revert(StoaError::UnsupportedPair);
        }

        let index = self.get_safe_count(owner);
        self.safe_count.set(&owner, index + 1);

        let safe = SafeData {
            owner,
            index,
            active_token,
            debt_token,
            collateral_shares: shares,
            debt: U256::zero(),
            mint_fee_applied,
            redemption_fee_applied,
            origination_fees_paid: U256::zero(),
            status: SafeStatus::Active,
        };
        self.safes.set(&SafeKey { owner, index }, safe);
        self.move_total(active_token, shares, true);

        self.env().emit_event(SafeOpened { owner, index, active_token, debt_token, shares });
        index
    }

    /// Add or remove collateral shares; fee markers move with the collateral
    pub fn adjust_balance(
        &mut self,
        owner: Address,
        index: u64,
        shares: U256,
        add: bool,
        mint_fee_delta: U256,
        redemption_fee_delta: U256,
    ) {
        self.require_safe_operations();
        let mut safe = self.load_active(owner, index);

        if add {
            safe.collateral_shares += shares;
            safe.mint_fee_applied += mint_fee_delta;
            safe.redemption_fee_applied += redemption_fee_delta;
        } else {
            if safe.collateral_shares < shares
                || safe.mint_fee_applied < mint_fee_delta
                || safe.redemption_fee_applied < redemption_fee_delta
            {
                self.env().revert(StoaError::NegativeBalance);
            }
            safe.collateral_shares -= shares;
            safe.mint_fee_applied -= mint_fee_delta;
            safe.redemption_fee_applied -= redemption_fee_delta;
        }
        self.move_total(safe.active_token, shares, add);

        self.env().emit_event(SafeAdjusted {
            owner,
            index,
            collateral_shares: safe.collateral_shares,
            mint_fee_applied: safe.mint_fee_applied,
            redemption_fee_applied: safe.redemption_fee_applied,
        });
        self.safes.set(&SafeKey { owner, index }, safe);
    }

    /// Borrow (`add`) or repay debt
    pub fn adjust_debt(
        &mut self,
        owner: Address,
        index: u64,
        debt_token: Address,
        amount: U256,
        origination_fee: U256,
        add: bool,
    ) {
        self.require_safe_operations();
        let mut safe = self.load_active(owner, index);
        if safe.debt_token != debt_token {
            self.env().revert(StoaError::TokenMismatch);
        }

        if add {
            safe.debt += amount;
            safe.origination_fees_paid += origination_fee;
        } else {
            if amount > safe.debt {
                self.env().revert(StoaError::RepayExceedsDebt);
            }
            safe.debt -= amount;
        }

        self.env().emit_event(DebtAdjusted { owner, index, debt: safe.debt, origination_fee });
        self.safes.set(&SafeKey { owner, index }, safe);
    }

    /// Close a safe. Only Active -> ClosedByOwner and Active -> ClosedByLiquidation.
    pub fn set_status(&mut self, owner: Address, index: u64, active_token: Address, status: SafeStatus) {
        self.require_safe_operations();
        let mut safe = self.load(owner, index);
        if safe.active_token != active_token {
            self.env().revert(StoaError::TokenMismatch);
        }
        if !safe.status.can_transition_to(status) {
            self.env().revert(StoaError::InvalidStatusTransition);
        }

        safe.status = status;
        self.safes.set(&SafeKey { owner, index }, safe);
        self.env().emit_event(SafeStatusChanged { owner, index, status });
    }

    // ========== Collateralization ==========

    /// `(below MCR, ratio in bps)`. A safe without debt is never underwater.
    pub fn is_underwater(&self, owner: Address, index: u64) -> (bool, U256) {
        let safe = self.load(owner, index);
        if safe.debt.is_zero() {
            return (false, unbounded_ratio());
        }

        let mcr_bps = self.get_mcr(safe.active_token, safe.debt_token);
        if mcr_bps == 0 {
            self.env().revert(StoaError::UnsupportedPair);
        }
        let ratio = self.ratio_of(&safe);
        (is_below_mcr(ratio, mcr_bps).or_revert(&self.env()), ratio)
    }

    /// Largest total debt the safe's collateral supports at MCR
    pub fn get_max_borrow(&self, owner: Address, index: u64) -> U256 {
        let safe = self.load(owner, index);
        let mcr_bps = self.get_mcr(safe.active_token, safe.debt_token);
        let (active_price, debt_price) = self.prices(&safe);
        max_debt_at_mcr(self.value_of(&safe), active_price, debt_price, mcr_bps).or_revert(&self.env())
    }

    /// Activated tokens in custody that belong to the safe
    pub fn collateral_value(&self, owner: Address, index: u64) -> U256 {
        let safe = self.load(owner, index);
        self.value_of(&safe)
    }

    // ========== Queries ==========

    pub fn get_safe(&self, owner: Address, index: u64) -> Option<SafeData> {
        self.safes.get(&SafeKey { owner, index })
    }

    pub fn get_safe_info(&self, owner: Address, index: u64) -> Option<SafeInfo> {
        let safe = self.get_safe(owner, index)?;
        let collateral_value = self.value_of(&safe);
        let (is_underwater, ratio_bps) = self.is_underwater(owner, index);
        let max_borrow = self.get_max_borrow(owner, index);
        Some(SafeInfo { safe, collateral_value, ratio_bps, is_underwater, max_borrow })
    }

    /// Number of safes `owner` has ever opened; also the next index
    pub fn get_safe_count(&self, owner: Address) -> u64 {
        self.safe_count.get(&owner).unwrap_or(0)
    }

    pub fn get_mcr(&self, active_token: Address, debt_token: Address) -> u32 {
        self.mcr.get(&(active_token, debt_token)).unwrap_or(0)
    }

    pub fn get_total_collateral(&self, active_token: Address) -> U256 {
        self.total_collateral.get(&active_token).unwrap_or_default()
    }

    /// Activated tokens held by safe operations for all safes of `active_token`
    pub fn get_custody(&self, active_token: Address) -> U256 {
        match self.safe_operations.get().flatten() {
            Some(ops) => RebasingContractRef::new(self.env(), active_token).balance_of(ops),
            None => U256::zero(),
        }
    }

    /// Shares to book for `amount` of activated tokens about to join custody.
    /// Rounds down.
    pub fn shares_for_deposit(&self, active_token: Address, amount: U256) -> U256 {
        let total = self.get_total_collateral(active_token);
        let held = self.get_custody(active_token);
        if total.is_zero() || held.is_zero() {
            return amount;
        }
        amount * total / held
    }

    /// Shares to release for paying out `amount` of activated tokens. Rounds up.
    pub fn shares_for_withdraw(&self, active_token: Address, amount: U256) -> U256 {
        let total = self.get_total_collateral(active_token);
        let held = self.get_custody(active_token);
        if total.is_zero() || held.is_zero() {
            return amount;
        }
        (amount * total + held - 1) / held
    }

    // ========== Admin Functions ==========

    pub fn set_mcr(&mut self, active_token: Address, debt_token: Address, mcr_bps: u32) {
        self.require_admin();
        self.mcr.set(&(active_token, debt_token), mcr_bps);
    }

    pub fn set_oracle(&mut self, oracle: Address) {
        self.require_admin();
        self.oracle.set(Some(oracle));
    }

    pub fn set_safe_operations(&mut self, safe_operations: Address) {
        self.require_admin();
        self.safe_operations.set(Some(safe_operations));
    }

    pub fn get_admin(&self) -> Address {
        self.admin.get().unwrap_or_else(|| self.env().revert(StoaError::Unauthorized))
    }

    // ========== Internal Functions ==========

    fn load(&self, owner: Address, index: u64) -> SafeData {
        match self.get_safe(owner, index) {
            Some(safe) => safe,
            None => self.env().revert(StoaError::SafeNotFound),
        }
    }

    fn load_active(&self, owner: Address, index: u64) -> SafeData {
        let safe = self.load(owner, index);
        if safe.status != SafeStatus::Active {
            self.env().revert(StoaError::SafeNotActive);
        }
        safe
    }

    fn value_of(&self, safe: &SafeData) -> U256 {
        let total = self.get_total_collateral(safe.active_token);
        if total.is_zero() || safe.collateral_shares.is_zero() {
            return U256::zero();
        }
        let held = self.get_custody(safe.active_token);
        if safe.collateral_shares >= total {
            return held;
        }
        held * safe.collateral_shares / total
    }

    fn move_total(&mut self, active_token: Address, shares: U256, add: bool) {
        let total = self.get_total_collateral(active_token);
        let total = if add { total + shares } else { total.saturating_sub(shares) };
        self.total_collateral.set(&active_token, total);
    }

    fn prices(&self, safe: &SafeData) -> (U256, U256) {
        let oracle = match self.oracle.get().flatten() {
            Some(oracle) => oracle,
            None => self.env().revert(StoaError::OraclePriceUnavailable),
        };
        let active_price = Oracle::price_of(&self.env(), oracle, safe.active_token).or_revert(&self.env());
        let debt_price = Oracle::price_of(&self.env(), oracle, safe.debt_token).or_revert(&self.env());
        (active_price, debt_price)
    }

    fn ratio_of(&self, safe: &SafeData) -> U256 {
        let (active_price, debt_price) = self.prices(safe);
        collateral_ratio_bps(self.value_of(safe), active_price, safe.debt, debt_price).or_revert(&self.env())
    }

    fn require_admin(&self) {
        if self.env().caller() != self.get_admin() {
            self.env().revert(StoaError::Unauthorized);
        }
    }

    fn require_safe_operations(&self) {
        let caller = self.env().caller();
        match self.safe_operations.get().flatten() {
            Some(ops) if caller == ops => {}
            _ => self.env().revert(StoaError::UnauthorizedProtocol),
        }
    }
}
