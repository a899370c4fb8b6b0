//! Yield venue integration
//!
//! The venue is an ERC-4626 style vault over the underlying asset. The
//! adapter only translates underlying amounts to venue shares and back; all
//! bookkeeping lives in the controller.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::StoaError;

/// Yield venue trait for cross-contract calls
#[odra::external_contract]
pub trait YieldVenue {
    /// Pull `assets` of underlying from `depositor`, credit shares to `receiver`
    fn deposit(&mut self, assets: U256, receiver: Address, depositor: Address) -> U256;
    /// Burn `shares` owned by `owner`, send the underlying to `receiver`
    fn redeem(&mut self, shares: U256, receiver: Address, owner: Address) -> U256;
    fn preview_redeem(&self, shares: U256) -> U256;
    fn convert_to_shares(&self, assets: U256) -> U256;
    fn max_withdraw(&self, account: Address) -> U256;
}

/// Helper for venue calls
pub struct VaultAdapter;

impl VaultAdapter {
    /// Deposit `assets` held by the calling contract and check the share count
    /// against the venue's own preview.
    pub fn deposit_checked(
        env: &Rc<odra::ContractEnv>,
        venue: Address,
        assets: U256,
    ) -> Result<U256, StoaError> {
        let this = env.self_address();
        let mut vault = YieldVenueContractRef::new(env.clone(), venue);
        let expected = vault.convert_to_shares(assets);
        let received = vault.deposit(assets, this, this);
        if received != expected {
            return Err(StoaError::VenueSlippage);
        }
        Ok(received)
    }

    /// Redeem the shares worth `assets` to `receiver`, requiring at least
    /// `min_assets_out` back.
    pub fn redeem_assets(
        env: &Rc<odra::ContractEnv>,
        venue: Address,
        assets: U256,
        receiver: Address,
        min_assets_out: U256,
    ) -> Result<U256, StoaError> {
        let this = env.self_address();
        let mut vault = YieldVenueContractRef::new(env.clone(), venue);
        let shares = vault.convert_to_shares(assets.min(vault.max_withdraw(this)));
        let returned = vault.redeem(shares, receiver, this);
        if returned < min_assets_out {
            return Err(StoaError::VenueSlippage);
        }
        Ok(returned)
    }

    /// Underlying the calling contract could withdraw right now
    pub fn withdrawable(env: &Rc<odra::ContractEnv>, venue: Address) -> U256 {
        let this = env.self_address();
        YieldVenueContractRef::new(env.clone(), venue).max_withdraw(this)
    }
}
