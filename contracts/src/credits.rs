//! Rebasing credit math.
//!
//! Balances are stored as credits; the token balance of an account is
//! `credits * CREDITS_PRECISION / credits_per_token`. Distributing yield only
//! lowers `credits_per_token`, so a rebase touches one value no matter how
//! many holders exist.
//!
//! `SupplyState` carries the three supply values and enforces the ledger
//! rules. `ActivatedToken` persists it and the per-account credit map.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::StoaError;

/// Fixed-point unit (1e18). `credits_per_token` starts here.
pub const CREDITS_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Largest total supply the ledger accepts.
pub const MAX_SUPPLY: u128 = u128::MAX;

/// Credits an account may be short by when burning.
///
/// Absorbs truncation from divide-then-multiply round trips.
pub const BURN_DUST_CREDITS: u64 = 1;

/// `a * b / 1e18`, truncating.
pub fn mul_truncate(a: U256, b: U256) -> Result<U256, StoaError> {
    a.checked_mul(b)
        .map(|v| v / U256::from(CREDITS_PRECISION))
        .ok_or(StoaError::SupplyOverflow)
}

/// `a * 1e18 / b`, truncating. Zero when `b` is zero.
pub fn div_precisely(a: U256, b: U256) -> Result<U256, StoaError> {
    if b.is_zero() {
        return Ok(U256::zero());
    }
    a.checked_mul(U256::from(CREDITS_PRECISION))
        .map(|v| v / b)
        .ok_or(StoaError::SupplyOverflow)
}

/// Supply state of one rebasing token
#[odra::odra_type]
pub struct SupplyState {
    /// Sum of all token balances at the current rate
    pub total_supply: U256,
    /// Sum of all account credits
    pub total_credits: U256,
    /// Credits per token, scaled by 1e18; never zero
    pub credits_per_token: U256,
}

impl Default for SupplyState {
    fn default() -> Self {
        Self {
            total_supply: U256::zero(),
            total_credits: U256::zero(),
            credits_per_token: U256::from(CREDITS_PRECISION),
        }
    }
}

impl SupplyState {
    /// Credits equivalent of `tokens` at the current rate
    pub fn to_credits(&self, tokens: U256) -> Result<U256, StoaError> {
        mul_truncate(tokens, self.credits_per_token)
    }

    /// Token equivalent of `credits` at the current rate
    pub fn to_tokens(&self, credits: U256) -> U256 {
        div_precisely(credits, self.credits_per_token).unwrap_or(U256::MAX)
    }

    /// Mint `amount` tokens onto an account holding `account_credits`.
    ///
    /// Returns the account's new credit balance.
    pub fn mint(&mut self, account_credits: U256, amount: U256) -> Result<U256, StoaError> {
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(StoaError::SupplyOverflow)?;
        if new_supply > U256::from(MAX_SUPPLY) {
            return Err(StoaError::SupplyOverflow);
        }

        let credits = self.to_credits(amount)?;
        let new_account = account_credits
            .checked_add(credits)
            .ok_or(StoaError::SupplyOverflow)?;
        let new_total_credits = self
            .total_credits
            .checked_add(credits)
            .ok_or(StoaError::SupplyOverflow)?;

        self.total_supply = new_supply;
        self.total_credits = new_total_credits;
        Ok(new_account)
    }

    /// Burn `amount` tokens from an account holding `account_credits`.
    ///
    /// Returns the account's new credit balance.
    pub fn burn(&mut self, account_credits: U256, amount: U256) -> Result<U256, StoaError> {
        let needed = self.to_credits(amount)?;
        let tolerance = U256::from(BURN_DUST_CREDITS);
        if account_credits.saturating_add(tolerance) < needed {
            return Err(StoaError::InsufficientBalance);
        }

        // Within the dust tolerance the account is simply emptied.
        let burned = needed.min(account_credits);
        let new_total_credits = self
            .total_credits
            .checked_sub(burned)
            .ok_or(StoaError::CreditMismatch)?;
        // Balances round up after a rebase, so the last holder can own a few
        // units more than the tracked supply.
        let new_supply = self.total_supply.saturating_sub(amount);

        self.total_credits = new_total_credits;
        self.total_supply = new_supply;
        Ok(account_credits - burned)
    }

    /// Credits to move when `amount` tokens leave an account holding `from_credits`.
    pub fn transfer_credits(&self, from_credits: U256, amount: U256) -> Result<U256, StoaError> {
        if self.to_tokens(from_credits) < amount {
            return Err(StoaError::InsufficientBalance);
        }
        let credits = self.to_credits(amount)?;
        if credits > from_credits {
            return Err(StoaError::CreditMismatch);
        }
        Ok(credits)
    }

    /// Move total supply to `new_total_supply` by recomputing the rate.
    ///
    /// Returns `false` when the supply is unchanged. Leaves `self` untouched on error.
    pub fn change_supply(&mut self, new_total_supply: U256) -> Result<bool, StoaError> {
        if new_total_supply == self.total_supply {
            return Ok(false);
        }
        if new_total_supply > U256::from(MAX_SUPPLY) {
            return Err(StoaError::SupplyOverflow);
        }
        if new_total_supply.is_zero() || self.total_supply.is_zero() {
            return Err(StoaError::InvalidRebase);
        }

        let new_rate = div_precisely(self.total_credits, new_total_supply)?;
        if new_rate.is_zero() {
            return Err(StoaError::InvalidRebase);
        }

        self.credits_per_token = new_rate;
        self.total_supply = new_total_supply;
        Ok(true)
    }
}
