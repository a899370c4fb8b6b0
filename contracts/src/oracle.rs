//! Price oracle integration
//!
//! Prices are quoted per token in a common unit of account, scaled by 1e18.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::StoaError;

/// Price scale (1e18)
pub const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Price oracle trait for cross-contract calls
#[odra::external_contract]
pub trait PriceOracle {
    /// Price of `token`, scaled by 1e18. Zero means no price.
    fn get_price(&self, token: Address) -> U256;
}

/// Helper for oracle queries
pub struct Oracle;

impl Oracle {
    /// Price of `token`, rejecting a missing (zero) price
    pub fn price_of(
        env: &Rc<odra::ContractEnv>,
        oracle: Address,
        token: Address,
    ) -> Result<U256, StoaError> {
        let price = PriceOracleContractRef::new(env.clone(), oracle).get_price(token);
        Self::sanitize(price)
    }

    pub fn sanitize(price: U256) -> Result<U256, StoaError> {
        if price.is_zero() {
            return Err(StoaError::OraclePriceUnavailable);
        }
        Ok(price)
    }
}
