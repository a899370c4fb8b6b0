//! Deactivated (non-rebasing) token
//!
//! CEP-18 token whose supply is controlled by the protocol. Balances never
//! move on a rebase; the yield controller holds activated tokens as backing
//! for every unit it issues, and safe operations mint it as debt.
//!
//! Every balance, allowance and supply write is mirrored into the standard
//! CEP-18 named keys and dictionaries so wallets and explorers can read them.

use odra::prelude::*;
use odra::casper_types::{U256, Key};
use odra::casper_types::bytesrepr::ToBytes;
use crate::credits::MAX_SUPPLY;
use crate::errors::StoaError;
use crate::types::is_null_address;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

/// Names of the CEP-18 keys wallets look up
mod cep18_keys {
    pub const NAME: &str = "name";
    pub const SYMBOL: &str = "symbol";
    pub const DECIMALS: &str = "decimals";
    pub const TOTAL_SUPPLY: &str = "total_supply";
    pub const BALANCES: &str = "balances";
    pub const ALLOWANCES: &str = "allowances";
}

/// Dictionary item key: base64 of the serialized `Key`s, concatenated
fn dictionary_key(accounts: &[Address]) -> String {
    let mut bytes = Vec::new();
    for account in accounts {
        bytes.extend_from_slice(&Key::from(*account).to_bytes().unwrap_or_default());
    }
    BASE64_STANDARD.encode(bytes)
}

#[odra::event]
pub struct Transfer {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub amount: U256,
}

#[odra::event]
pub struct Approval {
    pub owner: Address,
    pub spender: Address,
    pub amount: U256,
}

#[odra::event]
pub struct MinterChanged {
    pub minter: Address,
    pub enabled: bool,
}

/// Deactivated Token Contract
#[odra::module(events = [Transfer, Approval, MinterChanged])]
pub struct DeactivatedToken {
    name: Var<String>,
    symbol: Var<String>,
    decimals: Var<u8>,
    supply: Var<U256>,
    holdings: Mapping<Address, U256>,
    /// (owner, spender) -> remaining allowance
    allowances: Mapping<(Address, Address), U256>,
    /// Yield controller and safe operations
    minters: Mapping<Address, bool>,
    admin: Var<Address>,
}

#[odra::module]
impl DeactivatedToken {
    pub fn init(&mut self, name: String, symbol: String, decimals: u8, admin: Address) {
        let env = self.env();
        env.init_dictionary(cep18_keys::BALANCES);
        env.init_dictionary(cep18_keys::ALLOWANCES);
        env.set_named_value(cep18_keys::NAME, name.clone());
        env.set_named_value(cep18_keys::SYMBOL, symbol.clone());
        env.set_named_value(cep18_keys::DECIMALS, decimals);

        self.name.set(name);
        self.symbol.set(symbol);
        self.decimals.set(decimals);
        self.admin.set(admin);
        self.write_supply(U256::zero());
    }

    // ===== CEP-18 =====

    pub fn name(&self) -> String {
        self.name.get().unwrap_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get().unwrap_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get().unwrap_or(18)
    }

    pub fn total_supply(&self) -> U256 {
        self.supply.get().unwrap_or_default()
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.holdings.get(&account).unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or_default()
    }

    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.move_tokens(sender, recipient, amount);
        true
    }

    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.write_allowance(owner, spender, amount);
        true
    }

    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        let spender = self.env().caller();
        let remaining = match self.allowance(owner, spender).checked_sub(amount) {
            Some(remaining) => remaining,
            None => self.env().revert(StoaError::InsufficientAllowance),
        };

        self.move_tokens(owner, recipient, amount);
        self.write_allowance(owner, spender, remaining);
        true
    }

    // ===== Supply (minters only) =====

    /// Issue `amount` to `to`. Supply is capped at `u128::MAX`.
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.require_minter();
        if is_null_address(&to) {
            self.env().revert(StoaError::InvalidAccount);
        }

        let supply = self.total_supply().checked_add(amount);
        match supply {
            Some(supply) if supply <= U256::from(MAX_SUPPLY) => self.write_supply(supply),
            _ => self.env().revert(StoaError::SupplyOverflow),
        }
        self.write_balance(to, self.balance_of(to) + amount);

        self.env().emit_event(Transfer { from: None, to: Some(to), amount });
    }

    /// Destroy `amount` of the caller's own tokens
    pub fn burn(&mut self, amount: U256) {
        let caller = self.env().caller();
        self.destroy(caller, amount);
    }

    /// Destroy `amount` held by `from`, for repayments and redemptions
    pub fn burn_from(&mut self, from: Address, amount: U256) {
        self.require_minter();
        self.destroy(from, amount);
    }

    pub fn protocol_transfer(&mut self, from: Address, to: Address, amount: U256) {
        self.require_minter();
        self.move_tokens(from, to, amount);
    }

    // ===== Admin =====

    pub fn add_minter(&mut self, minter: Address) {
        self.set_minter(minter, true);
    }

    pub fn remove_minter(&mut self, minter: Address) {
        self.set_minter(minter, false);
    }

    pub fn is_minter(&self, account: Address) -> bool {
        self.minters.get(&account).unwrap_or(false)
    }

    pub fn get_admin(&self) -> Address {
        self.admin.get().unwrap_or_else(|| self.env().revert(StoaError::Unauthorized))
    }

    pub fn transfer_admin(&mut self, new_admin: Address) {
        self.require_admin();
        self.admin.set(new_admin);
    }

    // ===== Internal =====

    fn move_tokens(&mut self, from: Address, to: Address, amount: U256) {
        if is_null_address(&to) {
            self.env().revert(StoaError::InvalidAccount);
        }
        let from_left = self.debit(from, amount);
        self.write_balance(from, from_left);
        self.write_balance(to, self.balance_of(to) + amount);

        self.env().emit_event(Transfer { from: Some(from), to: Some(to), amount });
    }

    fn destroy(&mut self, from: Address, amount: U256) {
        let from_left = self.debit(from, amount);
        self.write_balance(from, from_left);
        // Supply is the sum of balances, so it covers `amount`
        self.write_supply(self.total_supply() - amount);

        self.env().emit_event(Transfer { from: Some(from), to: None, amount });
    }

    /// Balance of `account` after taking `amount` out of it
    fn debit(&self, account: Address, amount: U256) -> U256 {
        match self.balance_of(account).checked_sub(amount) {
            Some(left) => left,
            None => self.env().revert(StoaError::InsufficientBalance),
        }
    }

    fn set_minter(&mut self, minter: Address, enabled: bool) {
        self.require_admin();
        self.minters.set(&minter, enabled);
        self.env().emit_event(MinterChanged { minter, enabled });
    }

    fn write_balance(&mut self, account: Address, amount: U256) {
        self.holdings.set(&account, amount);
        self.env().set_dictionary_value(
            cep18_keys::BALANCES,
            dictionary_key(&[account]).as_bytes(),
            amount,
        );
    }

    fn write_allowance(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.set(&(owner, spender), amount);
        self.env().set_dictionary_value(
            cep18_keys::ALLOWANCES,
            dictionary_key(&[owner, spender]).as_bytes(),
            amount,
        );
        self.env().emit_event(Approval { owner, spender, amount });
    }

    fn write_supply(&mut self, supply: U256) {
        self.supply.set(supply);
        self.env().set_named_value(cep18_keys::TOTAL_SUPPLY, supply);
    }

    fn require_minter(&self) {
        if !self.is_minter(self.env().caller()) {
            self.env().revert(StoaError::UnauthorizedProtocol);
        }
    }

    fn require_admin(&self) {
        if self.env().caller() != self.get_admin() {
            self.env().revert(StoaError::Unauthorized);
        }
    }
}
