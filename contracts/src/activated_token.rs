//! Activated (rebasing) token
//!
//! CEP-18 style token whose balances grow as yield accrues.
//!
//! ## Accounting
//!
//! - each account holds credits, never raw tokens
//! - balance = credits * 1e18 / credits_per_token
//! - a rebase only moves `credits_per_token` (see `credits::SupplyState`)
//!
//! ## Roles
//!
//! - minters (the yield controller) mint, burn and move tokens for the protocol
//! - the rebaser (the yield controller) changes total supply
//! - the admin manages both roles

use odra::prelude::*;
use odra::casper_types::U256;
use crate::credits::SupplyState;
use crate::errors::{OrRevert, StoaError};
use crate::types::is_null_address;

/// Tokens moved between accounts. `None` marks a mint or a burn.
#[odra::event]
pub struct Transfer {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub amount: U256,
    pub credits: U256,
}

#[odra::event]
pub struct Approval {
    pub owner: Address,
    pub spender: Address,
    pub amount: U256,
}

/// Total supply moved by a rebase
#[odra::event]
pub struct SupplyChanged {
    pub previous_supply: U256,
    pub new_supply: U256,
    pub credits_per_token: U256,
}

#[odra::event]
pub struct MinterChanged {
    pub minter: Address,
    pub enabled: bool,
}

/// Activated token contract
#[odra::module(events = [Transfer, Approval, SupplyChanged, MinterChanged])]
pub struct ActivatedToken {
    name: Var<String>,
    symbol: Var<String>,
    decimals: Var<u8>,
    /// Supply, credits and the credits-per-token rate
    supply: Var<SupplyState>,
    /// Credits per account
    credits: Mapping<Address, U256>,
    /// Allowance mapping (owner, spender) -> token amount
    allowances: Mapping<(Address, Address), U256>,
    /// Protocol contracts allowed to mint, burn and move balances
    minters: Mapping<Address, bool>,
    /// Only account allowed to change supply
    rebaser: Var<Option<Address>>,
    admin: Var<Address>,
}

#[odra::module]
impl ActivatedToken {
    /// Initialize the token
    pub fn init(&mut self, name: String, symbol: String, decimals: u8, admin: Address) {
        self.name.set(name);
        self.symbol.set(symbol);
        self.decimals.set(decimals);
        self.supply.set(SupplyState::default());
        self.rebaser.set(None);
        self.admin.set(admin);
    }

    // ===== CEP-18 Standard Functions =====

    pub fn name(&self) -> String {
        self.name.get().unwrap_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get().unwrap_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get().unwrap_or(18)
    }

    /// Total supply at the current rate
    pub fn total_supply(&self) -> U256 {
        self.supply_state().total_supply
    }

    /// Token balance of `account`, rounded down
    pub fn balance_of(&self, account: Address) -> U256 {
        self.supply_state().to_tokens(self.credits_of(account))
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or(U256::zero())
    }

    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.transfer_internal(sender, recipient, amount);
        true
    }

    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.allowances.set(&(owner, spender), amount);
        self.env().emit_event(Approval { owner, spender, amount });
        true
    }

    /// Transfer from owner to recipient (requires allowance)
    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        let spender = self.env().caller();

        let current_allowance = self.allowance(owner, spender);
        if current_allowance < amount {
            self.env().revert(StoaError::InsufficientAllowance);
        }

        self.transfer_internal(owner, recipient, amount);
        self.allowances.set(&(owner, spender), current_allowance - amount);
        true
    }

    // ===== Credit Ledger =====

    /// Raw credits held by `account`
    pub fn credits_of(&self, account: Address) -> U256 {
        self.credits.get(&account).unwrap_or(U256::zero())
    }

    pub fn total_credits(&self) -> U256 {
        self.supply_state().total_credits
    }

    /// Credits per token, scaled by 1e18
    pub fn credits_per_token(&self) -> U256 {
        self.supply_state().credits_per_token
    }

    /// Tokens represented by `credits` at the current rate
    pub fn convert_to_assets(&self, credits: U256) -> U256 {
        self.supply_state().to_tokens(credits)
    }

    /// Credits represented by `tokens` at the current rate
    pub fn convert_to_credits(&self, tokens: U256) -> U256 {
        self.supply_state().to_credits(tokens).or_revert(&self.env())
    }

    // ===== Protocol Functions (Restricted) =====

    /// Mint `amount` tokens to `account` (minters only)
    pub fn mint(&mut self, account: Address, amount: U256) {
        self.require_minter();
        if is_null_address(&account) {
            self.env().revert(StoaError::InvalidAccount);
        }

        let mut state = self.supply_state();
        let before = self.credits_of(account);
        let after = state.mint(before, amount).or_revert(&self.env());

        self.credits.set(&account, after);
        self.supply.set(state);
        self.env().emit_event(Transfer {
            from: None,
            to: Some(account),
            amount,
            credits: after - before,
        });
    }

    /// Burn `amount` tokens from `account` (minters only)
    pub fn burn(&mut self, account: Address, amount: U256) {
        self.require_minter();

        let mut state = self.supply_state();
        let before = self.credits_of(account);
        let after = state.burn(before, amount).or_revert(&self.env());

        self.credits.set(&account, after);
        self.supply.set(state);
        self.env().emit_event(Transfer {
            from: Some(account),
            to: None,
            amount,
            credits: before - after,
        });
    }

    /// Move tokens between accounts without an allowance (minters only)
    pub fn protocol_transfer(&mut self, from: Address, to: Address, amount: U256) {
        self.require_minter();
        self.transfer_internal(from, to, amount);
    }

    /// Move total supply to `new_total_supply` (rebaser only).
    ///
    /// Returns `false` when the supply was already at that value.
    pub fn change_supply(&mut self, new_total_supply: U256) -> bool {
        self.require_rebaser();

        let mut state = self.supply_state();
        let previous_supply = state.total_supply;
        let changed = state.change_supply(new_total_supply).or_revert(&self.env());
        if !changed {
            return false;
        }

        self.supply.set(state.clone());
        self.env().emit_event(SupplyChanged {
            previous_supply,
            new_supply: state.total_supply,
            credits_per_token: state.credits_per_token,
        });
        true
    }

    // ===== Admin Functions =====

    pub fn add_minter(&mut self, minter: Address) {
        self.require_admin();
        self.minters.set(&minter, true);
        self.env().emit_event(MinterChanged { minter, enabled: true });
    }

    pub fn remove_minter(&mut self, minter: Address) {
        self.require_admin();
        self.minters.set(&minter, false);
        self.env().emit_event(MinterChanged { minter, enabled: false });
    }

    pub fn is_minter(&self, account: Address) -> bool {
        self.minters.get(&account).unwrap_or(false)
    }

    pub fn set_rebaser(&mut self, rebaser: Address) {
        self.require_admin();
        self.rebaser.set(Some(rebaser));
    }

    pub fn get_rebaser(&self) -> Option<Address> {
        self.rebaser.get().flatten()
    }

    pub fn get_admin(&self) -> Address {
        self.admin.get().unwrap_or_else(|| self.env().revert(StoaError::Unauthorized))
    }

    pub fn transfer_admin(&mut self, new_admin: Address) {
        self.require_admin();
        self.admin.set(new_admin);
    }

    // ===== Internal Functions =====

    fn supply_state(&self) -> SupplyState {
        self.supply.get().unwrap_or_default()
    }

    fn transfer_internal(&mut self, from: Address, to: Address, amount: U256) {
        if is_null_address(&to) {
            self.env().revert(StoaError::InvalidAccount);
        }

        let state = self.supply_state();
        let from_credits = self.credits_of(from);
        let moved = state.transfer_credits(from_credits, amount).or_revert(&self.env());

        // Same credits leave and arrive, total_credits is untouched
        self.credits.set(&from, from_credits - moved);
        let to_credits = self.credits_of(to);
        self.credits.set(&to, to_credits + moved);

        self.env().emit_event(Transfer {
            from: Some(from),
            to: Some(to),
            amount,
            credits: moved,
        });
    }

    fn require_admin(&self) {
        if self.env().caller() != self.get_admin() {
            self.env().revert(StoaError::Unauthorized);
        }
    }

    fn require_minter(&self) {
        let caller = self.env().caller();
        if !self.is_minter(caller) {
            self.env().revert(StoaError::UnauthorizedProtocol);
        }
    }

    fn require_rebaser(&self) {
        let caller = self.env().caller();
        match self.get_rebaser() {
            Some(rebaser) if caller == rebaser => {}
            _ => self.env().revert(StoaError::UnauthorizedProtocol),
        }
    }
}
