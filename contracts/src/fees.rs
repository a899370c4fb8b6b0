//! Fee engine.
//!
//! Pure basis-point fee math shared by the controller and safe operations:
//! - `compute_fee` multiplies before dividing so small amounts keep their fee
//! - `FeeSchedule` holds the five per-token rates
//! - a zero rate means the operation is free, never "unsupported"

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::StoaError;

/// Basis points scale (100% = 10000 bps)
pub const BPS_SCALE: u32 = 10_000;

/// Operation a fee is charged on
#[odra::odra_type]
#[derive(Copy)]
pub enum FeeKind {
    /// Depositing underlying for activated or deactivated tokens
    Mint,
    /// Redeeming tokens for underlying
    Redemption,
    /// One-way conversion of deactivated into activated tokens
    Conversion,
    /// Protocol share of measured yield
    Management,
    /// Borrowing against a safe
    Origination,
}

/// Per-token fee rates in basis points
#[odra::odra_type]
#[derive(Copy, Default)]
pub struct FeeSchedule {
    pub mint_bps: u32,
    pub redemption_bps: u32,
    pub conversion_bps: u32,
    pub management_bps: u32,
    pub origination_bps: u32,
}

impl FeeSchedule {
    /// Rate for `kind`
    pub fn rate(&self, kind: FeeKind) -> u32 {
        match kind {
            FeeKind::Mint => self.mint_bps,
            FeeKind::Redemption => self.redemption_bps,
            FeeKind::Conversion => self.conversion_bps,
            FeeKind::Management => self.management_bps,
            FeeKind::Origination => self.origination_bps,
        }
    }

    /// Copy of the schedule with `kind` set to `rate_bps`.
    pub fn with_rate(mut self, kind: FeeKind, rate_bps: u32) -> Result<Self, StoaError> {
        validate_rate(rate_bps)?;
        match kind {
            FeeKind::Mint => self.mint_bps = rate_bps,
            FeeKind::Redemption => self.redemption_bps = rate_bps,
            FeeKind::Conversion => self.conversion_bps = rate_bps,
            FeeKind::Management => self.management_bps = rate_bps,
            FeeKind::Origination => self.origination_bps = rate_bps,
        }
        Ok(self)
    }

    /// Fee owed on `amount` for `kind`
    pub fn fee_for(&self, amount: U256, kind: FeeKind) -> U256 {
        compute_fee(amount, self.rate(kind))
    }
}

/// Reject rates above 100%.
pub fn validate_rate(rate_bps: u32) -> Result<(), StoaError> {
    if rate_bps > BPS_SCALE {
        return Err(StoaError::InvalidFeeRate);
    }
    Ok(())
}

/// `amount * rate_bps / 10_000`, truncating.
///
/// Rates above 10 000 are clamped so a fee can never exceed the amount.
pub fn compute_fee(amount: U256, rate_bps: u32) -> U256 {
    if amount.is_zero() || rate_bps == 0 {
        return U256::zero();
    }
    let rate = rate_bps.min(BPS_SCALE);
    match amount.checked_mul(U256::from(rate)) {
        Some(scaled) => scaled / U256::from(BPS_SCALE),
        // amount * rate overflowed; fall back to divide-first for huge amounts
        None => amount / U256::from(BPS_SCALE) * U256::from(rate),
    }
}

/// Divide-first formula used by earlier deployments.
///
/// Collapses to zero for any `amount < 10_000`. Kept only to quantify the
/// difference against `compute_fee`; no contract charges with it.
pub fn legacy_compute_fee(amount: U256, rate_bps: u32) -> U256 {
    amount / U256::from(BPS_SCALE) * U256::from(rate_bps)
}

/// Split `amount` into `(net, fee)`.
pub fn split_fee(amount: U256, rate_bps: u32) -> (U256, U256) {
    let fee = compute_fee(amount, rate_bps);
    (amount - fee, fee)
}

/// Portion of a tracked fee that belongs to `part` out of `whole`.
///
/// Used to release fee markers pro rata when collateral leaves a safe.
pub fn pro_rata(tracked: U256, part: U256, whole: U256) -> U256 {
    if whole.is_zero() || part >= whole {
        return tracked;
    }
    tracked * part / whole
}
