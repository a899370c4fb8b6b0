//! Collateralization ratio math for safes.
//!
//! Values are in underlying units, prices are 1e18 fixed point, ratios are
//! basis points. Every product is formed before the single division so the
//! truncation happens once.

use odra::casper_types::U256;
use crate::errors::StoaError;
use crate::fees::BPS_SCALE;

/// Ratio reported for a safe without debt.
pub fn unbounded_ratio() -> U256 {
    U256::MAX
}

/// `collateral_value * collateral_price * 10_000 / (debt * debt_price)`.
///
/// Debt of zero yields `unbounded_ratio()`.
pub fn collateral_ratio_bps(
    collateral_value: U256,
    collateral_price: U256,
    debt: U256,
    debt_price: U256,
) -> Result<U256, StoaError> {
    if debt.is_zero() {
        return Ok(unbounded_ratio());
    }
    if debt_price.is_zero() {
        return Err(StoaError::OraclePriceUnavailable);
    }

    let numerator = collateral_value
        .checked_mul(collateral_price)
        .and_then(|v| v.checked_mul(U256::from(BPS_SCALE)))
        .ok_or(StoaError::SupplyOverflow)?;
    let denominator = debt
        .checked_mul(debt_price)
        .ok_or(StoaError::SupplyOverflow)?;

    Ok(numerator / denominator)
}

/// Whether `ratio_bps` is strictly below `mcr_bps`.
///
/// An MCR of zero marks an unsupported pair and is rejected, never treated as
/// "infinitely collateralized".
pub fn is_below_mcr(ratio_bps: U256, mcr_bps: u32) -> Result<bool, StoaError> {
    if mcr_bps == 0 {
        return Err(StoaError::UnsupportedPair);
    }
    Ok(ratio_bps < U256::from(mcr_bps))
}

/// Largest total debt that keeps the ratio at exactly `mcr_bps`.
///
/// `collateral_value * collateral_price * 10_000 / (mcr_bps * debt_price)`
pub fn max_debt_at_mcr(
    collateral_value: U256,
    collateral_price: U256,
    debt_price: U256,
    mcr_bps: u32,
) -> Result<U256, StoaError> {
    if mcr_bps == 0 {
        return Err(StoaError::UnsupportedPair);
    }
    if debt_price.is_zero() {
        return Err(StoaError::OraclePriceUnavailable);
    }

    let numerator = collateral_value
        .checked_mul(collateral_price)
        .and_then(|v| v.checked_mul(U256::from(BPS_SCALE)))
        .ok_or(StoaError::SupplyOverflow)?;
    let denominator = U256::from(mcr_bps)
        .checked_mul(debt_price)
        .ok_or(StoaError::SupplyOverflow)?;

    Ok(numerator / denominator)
}
