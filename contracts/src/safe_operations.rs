//! Safe operations: account-facing entry point for Safes.
//!
//! Sequences the token movements around the position ledger:
//! - open / deposit: pull underlying, deposit through the controller (no
//!   mint fee), record custody shares and fee markers
//! - withdraw / close: release shares and markers, pay the markers to the
//!   protocol, withdraw the rest through the controller
//! - borrow / repay: mint or burn the debt token
//!
//! Activated tokens backing every safe stay in this contract's custody. The
//! position ledger converts between custody shares and token amounts, and
//! every payout is checked against the ledger only after it has left.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::StoaError;
use crate::fees::{compute_fee, pro_rata, FeeSchedule};
use crate::interfaces::{
    Cep18TokenContractRef, ControllerContractRef, PositionLedgerContractRef,
    ProtocolMintedContractRef, RebasingContractRef,
};
use crate::types::{SafeData, SafeStatus};

/// Collateral withdrawn from a safe
#[odra::event]
pub struct CollateralWithdrawn {
    pub owner: Address,
    pub index: u64,
    pub amount: U256,
    pub fees: U256,
    pub assets_out: U256,
}

#[odra::event]
pub struct Borrowed {
    pub owner: Address,
    pub index: u64,
    pub amount: U256,
    pub fee: U256,
}

#[odra::event]
pub struct Repaid {
    pub owner: Address,
    pub index: u64,
    pub amount: U256,
}

#[odra::event]
pub struct LiquidationFlagged {
    pub owner: Address,
    pub index: u64,
    pub ratio_bps: U256,
}

/// Safe Operations Contract
#[odra::module(events = [CollateralWithdrawn, Borrowed, Repaid, LiquidationFlagged])]
pub struct SafeOperations {
    /// Position ledger
    safe_manager: Var<Address>,
    /// Yield controller per activated token
    controllers: Mapping<Address, Address>,
    /// Allowed to flag underwater safes
    keeper: Var<Address>,
    admin: Var<Address>,
    busy: Var<bool>,
}

#[odra::module]
impl SafeOperations {
    pub fn init(&mut self, admin: Address, keeper: Address, safe_manager: Address) {
        self.admin.set(admin);
        self.keeper.set(keeper);
        self.safe_manager.set(safe_manager);
        self.busy.set(false);
    }

    // ========== Collateral ==========

    /// Open a safe backed by `amount` of underlying. Returns the new index.
    pub fn open_safe(&mut self, active_token: Address, debt_token: Address, amount: U256) -> u64 {
        self.enter();
        let owner = self.env().caller();

        let (shares, schedule) = self.deposit_collateral(owner, active_token, amount);
        let index = self.ledger().initialize(
            owner,
            active_token,
            debt_token,
            shares,
            compute_fee(amount, schedule.mint_bps),
            compute_fee(amount, schedule.redemption_bps),
        );

        self.exit();
        index
    }

    /// Add `amount` of underlying to an Active safe of the caller
    pub fn deposit_to(&mut self, index: u64, amount: U256) {
        self.enter();
        let owner = self.env().caller();
        let safe = self.load_active(owner, index);

        let (shares, schedule) = self.deposit_collateral(owner, safe.active_token, amount);
        self.ledger().adjust_balance(
            owner,
            index,
            shares,
            true,
            compute_fee(amount, schedule.mint_bps),
            compute_fee(amount, schedule.redemption_bps),
        );
        self.exit();
    }

    /// Withdraw `amount` of collateral value to the caller. The released fee
    /// markers are paid to the protocol. Returns the underlying received.
    pub fn withdraw_from(&mut self, index: u64, amount: U256, min_amount_out: U256) -> U256 {
        self.enter();
        let owner = self.env().caller();
        if amount.is_zero() {
            self.env().revert(StoaError::ZeroAmount);
        }
        let safe = self.load_active(owner, index);
        let controller = self.controller_for(safe.active_token);

        let shares = self.ledger().shares_for_withdraw(safe.active_token, amount);
        if shares > safe.collateral_shares {
            self.env().revert(StoaError::NegativeBalance);
        }
        let fees = self.release_collateral(&safe, shares);
        let assets_out = self.pay_out(owner, &safe, controller, amount, fees, min_amount_out);
        self.require_above_mcr(owner, index);

        self.env().emit_event(CollateralWithdrawn { owner, index, amount, fees, assets_out });
        self.exit();
        assets_out
    }

    /// Move `amount` of collateral value from the caller's safe to another
    /// Active safe with the same activated token
    pub fn transfer_balance(&mut self, from_index: u64, to_owner: Address, to_index: u64, amount: U256) {
        self.enter();
        let owner = self.env().caller();
        let from = self.load_active(owner, from_index);
        let to = self.load(to_owner, to_index);
        if from.active_token != to.active_token {
            self.env().revert(StoaError::TokenMismatch);
        }

        let mut ledger = self.ledger();
        let shares = ledger.shares_for_withdraw(from.active_token, amount);
        if shares > from.collateral_shares {
            self.env().revert(StoaError::NegativeBalance);
        }
        let mint_fee = pro_rata(from.mint_fee_applied, shares, from.collateral_shares);
        let redemption_fee = pro_rata(from.redemption_fee_applied, shares, from.collateral_shares);

        ledger.adjust_balance(owner, from_index, shares, false, mint_fee, redemption_fee);
        ledger.adjust_balance(to_owner, to_index, shares, true, mint_fee, redemption_fee);
        self.require_above_mcr(owner, from_index);
        self.exit();
    }

    /// Close a debt-free safe, withdrawing all of its collateral to the
    /// caller. Returns the underlying received.
    pub fn close_safe(&mut self, index: u64) -> U256 {
        self.enter();
        let owner = self.env().caller();
        let safe = self.load(owner, index);
        if !safe.debt.is_zero() {
            self.env().revert(StoaError::DebtOutstanding);
        }
        if safe.status != SafeStatus::Active {
            self.env().revert(StoaError::SafeNotActive);
        }

        let controller = self.controller_for(safe.active_token);
        let amount = self.ledger().collateral_value(owner, index);
        let fees = self.release_collateral(&safe, safe.collateral_shares);
        let assets_out = if amount.is_zero() {
            U256::zero()
        } else {
            self.pay_out(owner, &safe, controller, amount, fees, U256::zero())
        };

        self.ledger().set_status(owner, index, safe.active_token, SafeStatus::ClosedByOwner);
        self.env().emit_event(CollateralWithdrawn { owner, index, amount, fees, assets_out });
        self.exit();
        assets_out
    }

    // ========== Debt ==========

    /// Borrow `amount` of the safe's debt token. The origination fee is
    /// minted to the protocol, the rest to the caller.
    pub fn borrow(&mut self, index: u64, amount: U256) {
        self.enter();
        let owner = self.env().caller();
        if amount.is_zero() {
            self.env().revert(StoaError::ZeroAmount);
        }
        let safe = self.load_active(owner, index);
        let controller = self.controller_for(safe.active_token);

        let schedule = ControllerContractRef::new(self.env(), controller).get_fee_schedule(safe.debt_token);
        let fee = compute_fee(amount, schedule.origination_bps);

        let mut ledger = self.ledger();
        let max_borrow = ledger.get_max_borrow(owner, index);
        if safe.debt + amount > max_borrow {
            self.env().revert(StoaError::BelowMcr);
        }
        ledger.adjust_debt(owner, index, safe.debt_token, amount, fee, true);

        let mut debt_token = ProtocolMintedContractRef::new(self.env(), safe.debt_token);
        debt_token.mint(owner, amount - fee);
        if !fee.is_zero() {
            debt_token.mint(controller, fee);
        }

        self.env().emit_event(Borrowed { owner, index, amount, fee });
        self.exit();
    }

    /// Burn `amount` of the caller's debt tokens against the safe's debt
    pub fn repay(&mut self, index: u64, amount: U256) {
        self.enter();
        let owner = self.env().caller();
        if amount.is_zero() {
            self.env().revert(StoaError::ZeroAmount);
        }
        let safe = self.load_active(owner, index);

        self.ledger().adjust_debt(owner, index, safe.debt_token, amount, U256::zero(), false);
        ProtocolMintedContractRef::new(self.env(), safe.debt_token).burn_from(owner, amount);

        self.env().emit_event(Repaid { owner, index, amount });
        self.exit();
    }

    // ========== Keeper Functions ==========

    /// Mark an underwater safe as closed by liquidation. Collateral is not seized.
    pub fn flag_liquidation(&mut self, owner: Address, index: u64) {
        self.require_keeper();
        self.enter();
        let safe = self.load(owner, index);

        let mut ledger = self.ledger();
        let (underwater, ratio_bps) = ledger.is_underwater(owner, index);
        if !underwater {
            self.env().revert(StoaError::NotUnderwater);
        }
        ledger.set_status(owner, index, safe.active_token, SafeStatus::ClosedByLiquidation);

        self.env().emit_event(LiquidationFlagged { owner, index, ratio_bps });
        self.exit();
    }

    // ========== Admin Functions ==========

    /// Route safes of `active_token` through `controller`
    pub fn set_controller(&mut self, active_token: Address, controller: Address) {
        self.require_admin();
        self.controllers.set(&active_token, controller);
    }

    pub fn set_safe_manager(&mut self, safe_manager: Address) {
        self.require_admin();
        self.safe_manager.set(safe_manager);
    }

    pub fn set_keeper(&mut self, keeper: Address) {
        self.require_admin();
        self.keeper.set(keeper);
    }

    pub fn transfer_admin(&mut self, new_admin: Address) {
        self.require_admin();
        self.admin.set(new_admin);
    }

    // ========== Queries ==========

    pub fn get_controller(&self, active_token: Address) -> Option<Address> {
        self.controllers.get(&active_token)
    }

    pub fn get_safe_manager(&self) -> Address {
        self.safe_manager.get().unwrap_or_else(|| self.env().revert(StoaError::UnauthorizedProtocol))
    }

    pub fn get_keeper(&self) -> Address {
        self.keeper.get().unwrap_or_else(|| self.env().revert(StoaError::Unauthorized))
    }

    pub fn get_admin(&self) -> Address {
        self.admin.get().unwrap_or_else(|| self.env().revert(StoaError::Unauthorized))
    }

    // ========== Internal Functions ==========

    /// Pull `amount` of underlying from `owner` and deposit it fee-free.
    /// Returns the custody shares credited and the activated token's fee schedule.
    fn deposit_collateral(&mut self, owner: Address, active_token: Address, amount: U256) -> (U256, FeeSchedule) {
        if amount.is_zero() {
            self.env().revert(StoaError::ZeroAmount);
        }
        let this = self.env().self_address();
        let controller_address = self.controller_for(active_token);
        let mut controller = ControllerContractRef::new(self.env(), controller_address);

        let mut underlying = Cep18TokenContractRef::new(self.env(), controller.get_underlying());
        if underlying.balance_of(owner) < amount {
            self.env().revert(StoaError::InsufficientFunds);
        }
        underlying.transfer_from(owner, this, amount);
        underlying.approve(controller_address, amount);

        let shares = self.ledger().shares_for_deposit(active_token, amount);
        controller.deposit(this, amount, true);
        (shares, controller.get_fee_schedule(active_token))
    }

    /// Remove `shares` and their pro-rata fee markers from `safe`.
    /// Returns the released markers.
    fn release_collateral(&mut self, safe: &SafeData, shares: U256) -> U256 {
        let mint_fee = pro_rata(safe.mint_fee_applied, shares, safe.collateral_shares);
        let redemption_fee = pro_rata(safe.redemption_fee_applied, shares, safe.collateral_shares);
        self.ledger().adjust_balance(safe.owner, safe.index, shares, false, mint_fee, redemption_fee);
        mint_fee + redemption_fee
    }

    /// Pay `fees` to the protocol and withdraw the rest of `amount` to `owner`
    fn pay_out(
        &mut self,
        owner: Address,
        safe: &SafeData,
        controller: Address,
        amount: U256,
        fees: U256,
        min_amount_out: U256,
    ) -> U256 {
        let fees = fees.min(amount);
        if !fees.is_zero() {
            RebasingContractRef::new(self.env(), safe.active_token).transfer(controller, fees);
        }
        let net = amount - fees;
        if net.is_zero() {
            return U256::zero();
        }
        ControllerContractRef::new(self.env(), controller).withdraw(owner, net, min_amount_out)
    }

    fn load(&self, owner: Address, index: u64) -> SafeData {
        match self.ledger().get_safe(owner, index) {
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

    fn ledger(&self) -> PositionLedgerContractRef {
        PositionLedgerContractRef::new(self.env(), self.get_safe_manager())
    }

    fn controller_for(&self, active_token: Address) -> Address {
        match self.get_controller(active_token) {
            Some(controller) => controller,
            None => self.env().revert(StoaError::UnsupportedPair),
        }
    }

    fn require_above_mcr(&self, owner: Address, index: u64) {
        let (underwater, _) = self.ledger().is_underwater(owner, index);
        if underwater {
            self.env().revert(StoaError::BelowMcr);
        }
    }

    fn require_admin(&self) {
        if self.env().caller() != self.get_admin() {
            self.env().revert(StoaError::Unauthorized);
        }
    }

    fn require_keeper(&self) {
        if self.env().caller() != self.get_keeper() {
            self.env().revert(StoaError::Unauthorized);
        }
    }

    fn enter(&mut self) {
        if self.busy.get().unwrap_or(false) {
            self.env().revert(StoaError::Reentrancy);
        }
        self.busy.set(true);
    }

    fn exit(&mut self) {
        self.busy.set(false);
    }
}
