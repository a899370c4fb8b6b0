//! Cross-contract interfaces for the Stoa protocol.
//!
//! Each trait lists only the entry points another protocol contract calls.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::fees::FeeSchedule;
use crate::types::{SafeData, SafeStatus};

/// CEP-18 underlying asset
#[odra::external_contract]
pub trait Cep18Token {
    fn transfer(&mut self, recipient: Address, amount: U256) -> bool;
    fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool;
    fn approve(&mut self, spender: Address, amount: U256) -> bool;
    fn allowance(&self, owner: Address, spender: Address) -> U256;
    fn balance_of(&self, account: Address) -> U256;
}

/// Rebasing credit ledger
#[odra::external_contract]
pub trait Rebasing {
    fn total_supply(&self) -> U256;
    fn balance_of(&self, account: Address) -> U256;
    fn transfer(&mut self, recipient: Address, amount: U256) -> bool;
    fn mint(&mut self, account: Address, amount: U256);
    fn burn(&mut self, account: Address, amount: U256);
    fn protocol_transfer(&mut self, from: Address, to: Address, amount: U256);
    fn change_supply(&mut self, new_total_supply: U256) -> bool;
}

/// Protocol-minted, non-rebasing token
#[odra::external_contract]
pub trait ProtocolMinted {
    fn balance_of(&self, account: Address) -> U256;
    fn mint(&mut self, to: Address, amount: U256);
    fn burn_from(&mut self, from: Address, amount: U256);
}

/// Yield controller surface used by safe operations
#[odra::external_contract]
pub trait Controller {
    fn deposit(&mut self, depositor: Address, amount: U256, activated: bool) -> U256;
    fn withdraw(&mut self, receiver: Address, amount: U256, min_amount_out: U256) -> U256;
    fn get_fee_schedule(&self, token: Address) -> FeeSchedule;
    fn get_activated_token(&self) -> Address;
    fn get_deactivated_token(&self) -> Address;
    fn get_underlying(&self) -> Address;
}

/// Position ledger surface used by safe operations
#[odra::external_contract]
pub trait PositionLedger {
    fn initialize(
        &mut self,
        owner: Address,
        active_token: Address,
        debt_token: Address,
        shares: U256,
        mint_fee_applied: U256,
        redemption_fee_applied: U256,
    ) -> u64;
    fn adjust_balance(
        &mut self,
        owner: Address,
        index: u64,
        shares: U256,
        add: bool,
        mint_fee_delta: U256,
        redemption_fee_delta: U256,
    );
    fn adjust_debt(
        &mut self,
        owner: Address,
        index: u64,
        debt_token: Address,
        amount: U256,
        origination_fee: U256,
        add: bool,
    );
    fn set_status(&mut self, owner: Address, index: u64, active_token: Address, status: SafeStatus);
    fn is_underwater(&self, owner: Address, index: u64) -> (bool, U256);
    fn get_max_borrow(&self, owner: Address, index: u64) -> U256;
    fn get_safe(&self, owner: Address, index: u64) -> Option<SafeData>;
    fn collateral_value(&self, owner: Address, index: u64) -> U256;
    fn shares_for_deposit(&self, active_token: Address, amount: U256) -> U256;
    fn shares_for_withdraw(&self, active_token: Address, amount: U256) -> U256;
}
