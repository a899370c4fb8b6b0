//! Test doubles for the external collaborators.
//!
//! Native targets only. Deployed by the integration tests in place of a real
//! underlying token, yield venue and price feed.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::StoaError;
use crate::fees::{compute_fee, BPS_SCALE};
use crate::interfaces::{Cep18TokenContractRef, ControllerContractRef};

/// CEP-18 token anyone can mint
#[odra::module]
pub struct MockUnderlying {
    total_supply: Var<U256>,
    balances: Mapping<Address, U256>,
    allowances: Mapping<(Address, Address), U256>,
}

#[odra::module]
impl MockUnderlying {
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.balances.set(&to, self.balance_of(to) + amount);
        self.total_supply.set(self.total_supply() + amount);
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply.get().unwrap_or(U256::zero())
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).unwrap_or(U256::zero())
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or(U256::zero())
    }

    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.allowances.set(&(owner, spender), amount);
        true
    }

    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.move_balance(sender, recipient, amount);
        true
    }

    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        let spender = self.env().caller();
        let allowance = self.allowance(owner, spender);
        if allowance < amount {
            self.env().revert(StoaError::InsufficientAllowance);
        }
        self.allowances.set(&(owner, spender), allowance - amount);
        self.move_balance(owner, recipient, amount);
        true
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            self.env().revert(StoaError::InsufficientBalance);
        }
        self.balances.set(&from, from_balance - amount);
        self.balances.set(&to, self.balance_of(to) + amount);
    }
}

/// ERC-4626 style vault over a `MockUnderlying`.
///
/// Yield is simulated by minting underlying straight to the vault. A deposit
/// haircut makes `deposit` issue fewer shares than previewed. A reentry
/// target makes `deposit` call back into that controller.
#[odra::module]
pub struct MockVault {
    asset: Var<Address>,
    total_shares: Var<U256>,
    shares: Mapping<Address, U256>,
    deposit_haircut_bps: Var<u32>,
    reentry_target: Var<Option<Address>>,
}

#[odra::module]
impl MockVault {
    pub fn init(&mut self, asset: Address) {
        self.asset.set(asset);
        self.total_shares.set(U256::zero());
        self.deposit_haircut_bps.set(0);
        self.reentry_target.set(None);
    }

    pub fn deposit(&mut self, assets: U256, receiver: Address, depositor: Address) -> U256 {
        let this = self.env().self_address();
        let previewed = self.convert_to_shares(assets);
        let haircut = compute_fee(previewed, self.deposit_haircut_bps.get().unwrap_or(0));
        let minted = previewed - haircut;

        if let Some(target) = self.reentry_target.get().flatten() {
            ControllerContractRef::new(self.env(), target).deposit(this, assets, true);
        }
        self.token().transfer_from(depositor, this, assets);
        self.shares.set(&receiver, self.shares_of(receiver) + minted);
        self.total_shares.set(self.total_shares() + minted);
        minted
    }

    pub fn redeem(&mut self, shares: U256, receiver: Address, owner: Address) -> U256 {
        if self.env().caller() != owner {
            self.env().revert(StoaError::Unauthorized);
        }
        let held = self.shares_of(owner);
        if held < shares {
            self.env().revert(StoaError::InsufficientBalance);
        }
        let assets = self.preview_redeem(shares);

        self.shares.set(&owner, held - shares);
        self.total_shares.set(self.total_shares() - shares);
        self.token().transfer(receiver, assets);
        assets
    }

    pub fn preview_redeem(&self, shares: U256) -> U256 {
        let total_shares = self.total_shares();
        if total_shares.is_zero() {
            return shares;
        }
        shares * self.total_assets() / total_shares
    }

    pub fn convert_to_shares(&self, assets: U256) -> U256 {
        let total_shares = self.total_shares();
        let total_assets = self.total_assets();
        if total_shares.is_zero() || total_assets.is_zero() {
            return assets;
        }
        assets * total_shares / total_assets
    }

    pub fn max_withdraw(&self, account: Address) -> U256 {
        self.preview_redeem(self.shares_of(account))
    }

    pub fn total_assets(&self) -> U256 {
        let this = self.env().self_address();
        self.token().balance_of(this)
    }

    pub fn total_shares(&self) -> U256 {
        self.total_shares.get().unwrap_or(U256::zero())
    }

    pub fn shares_of(&self, account: Address) -> U256 {
        self.shares.get(&account).unwrap_or(U256::zero())
    }

    pub fn set_deposit_haircut(&mut self, haircut_bps: u32) {
        self.deposit_haircut_bps.set(haircut_bps.min(BPS_SCALE));
    }

    pub fn set_reentry_target(&mut self, controller: Address) {
        self.reentry_target.set(Some(controller));
    }

    fn token(&self) -> Cep18TokenContractRef {
        let asset = self.asset.get().unwrap_or_else(|| self.env().revert(StoaError::UnsupportedPair));
        Cep18TokenContractRef::new(self.env(), asset)
    }
}

/// Price feed with prices set by hand
#[odra::module]
pub struct MockOracle {
    prices: Mapping<Address, U256>,
}

#[odra::module]
impl MockOracle {
    pub fn set_price(&mut self, token: Address, price: U256) {
        self.prices.set(&token, price);
    }

    pub fn get_price(&self, token: Address) -> U256 {
        self.prices.get(&token).unwrap_or(U256::zero())
    }
}
