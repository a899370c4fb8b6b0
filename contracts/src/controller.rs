//! Yield controller
//!
//! Owns the yield venue position for one underlying asset and issues the
//! activated/deactivated token pair against it.
//!
//! ## Deposit Flow
//!
//! 1. Validate the amount and the depositor's underlying balance
//! 2. Pull the underlying and deposit it into the venue (shares must match
//!    the venue's preview)
//! 3. Charge the mint fee (skipped for safe operations)
//! 4. Activated: mint to the depositor. Deactivated: mint the full amount of
//!    activated tokens to the controller as backing, mint deactivated tokens
//!    to the depositor and record the reserve and redemption allowance
//!
//! ## Rebase (Keeper)
//!
//! Yield is the venue value above activated supply. Holders receive their
//! share through `change_supply`; the management share is minted to the
//! controller, which is the protocol account.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::{OrRevert, StoaError};
use crate::fees::{compute_fee, validate_rate, FeeKind, FeeSchedule, BPS_SCALE};
use crate::interfaces::{Cep18TokenContractRef, ProtocolMintedContractRef, RebasingContractRef};
use crate::types::{ControllerConfig, RebaseResult, YieldTotals};
use crate::vault_adapter::VaultAdapter;

/// Split the venue value above `supply` between holders and the protocol.
///
/// Returns zeros when there is nothing to distribute (empty token or no
/// growth). `new_supply` is the supply once both shares are issued.
pub fn split_yield(supply: U256, venue_value: U256, management_bps: u32) -> RebaseResult {
    if supply.is_zero() || venue_value <= supply {
        return RebaseResult::default();
    }

    let yield_amount = venue_value - supply;
    let holder_bps = BPS_SCALE - management_bps.min(BPS_SCALE);
    let holder_yield = compute_fee(yield_amount, holder_bps);
    let protocol_yield = yield_amount - holder_yield;

    RebaseResult {
        yield_amount,
        holder_yield,
        protocol_yield,
        new_supply: venue_value,
    }
}

#[odra::event]
pub struct Deposited {
    pub depositor: Address,
    pub amount: U256,
    pub minted: U256,
    pub fee: U256,
    pub activated: bool,
}

#[odra::event]
pub struct Withdrawn {
    pub holder: Address,
    pub receiver: Address,
    pub amount: U256,
    pub fee: U256,
    pub assets_out: U256,
}

#[odra::event]
pub struct DeactivatedRedeemed {
    pub holder: Address,
    pub receiver: Address,
    pub amount: U256,
    pub fee: U256,
    pub assets_out: U256,
}

#[odra::event]
pub struct Converted {
    pub holder: Address,
    pub amount: U256,
    pub fee: U256,
}

#[odra::event]
pub struct Rebased {
    pub yield_amount: U256,
    pub holder_yield: U256,
    pub protocol_yield: U256,
    pub new_supply: U256,
}

/// Backing reserve of `wild_token` in `backing_token` moved
#[odra::event]
pub struct ReserveChanged {
    pub wild_token: Address,
    pub backing_token: Address,
    pub reserve: U256,
}

#[odra::event]
pub struct FeesCollected {
    pub recipient: Address,
    pub amount: U256,
}

#[odra::event]
pub struct FeeRateChanged {
    pub token: Address,
    pub kind: FeeKind,
    pub rate_bps: u32,
}

/// Yield Controller Contract
#[odra::module(events = [
    Deposited,
    Withdrawn,
    DeactivatedRedeemed,
    Converted,
    Rebased,
    ReserveChanged,
    FeesCollected,
    FeeRateChanged
])]
pub struct YieldController {
    /// CEP-18 underlying asset
    underlying: Var<Address>,
    /// Yield venue holding every deposit
    vault: Var<Address>,
    activated_token: Var<Address>,
    deactivated_token: Var<Address>,
    /// Fee schedule per token (activated or deactivated)
    fee_schedules: Mapping<Address, FeeSchedule>,
    config: Var<ControllerConfig>,
    /// (wild_token, backing_token) -> backing units
    reserves: Mapping<(Address, Address), U256>,
    /// Activated tokens held by the controller as backing
    total_backing: Var<U256>,
    /// (deactivated_token, account) -> redeemable amount
    redemption_allowance: Mapping<(Address, Address), U256>,
    yield_totals: Var<YieldTotals>,
    admin: Var<Address>,
    busy: Var<bool>,
}

#[odra::module]
impl YieldController {
    /// Initialize the controller
    pub fn init(
        &mut self,
        admin: Address,
        keeper: Address,
        underlying: Address,
        vault: Address,
        activated_token: Address,
        deactivated_token: Address,
        min_deposit: U256,
        min_withdraw: U256,
    ) {
        self.admin.set(admin);
        self.underlying.set(underlying);
        self.vault.set(vault);
        self.activated_token.set(activated_token);
        self.deactivated_token.set(deactivated_token);
        self.total_backing.set(U256::zero());
        self.yield_totals.set(YieldTotals::default());
        self.busy.set(false);

        self.config.set(ControllerConfig {
            min_deposit,
            min_withdraw,
            keeper,
            safe_operations: None,
            paused: false,
        });
    }

    // ========== Account Functions ==========

    /// Deposit `amount` of `depositor`'s underlying for activated
    /// (`activated = true`) or deactivated tokens, minted to the depositor.
    /// The caller may be a custodian; the depositor must have approved the
    /// controller. Returns the amount minted.
    pub fn deposit(&mut self, depositor: Address, amount: U256, activated: bool) -> U256 {
        self.enter();
        self.require_not_paused();

        let caller = self.env().caller();

        let config = self.get_config();
        if amount.is_zero() {
            self.env().revert(StoaError::ZeroAmount);
        }
        if amount < config.min_deposit {
            self.env().revert(StoaError::AmountTooLow);
        }

        let this = self.env().self_address();
        let mut underlying = Cep18TokenContractRef::new(self.env(), self.get_underlying());
        if underlying.balance_of(depositor) < amount {
            self.env().revert(StoaError::InsufficientFunds);
        }

        // Deposited-to-Venue
        let vault = self.get_vault();
        underlying.transfer_from(depositor, this, amount);
        underlying.approve(vault, amount);
        VaultAdapter::deposit_checked(&self.env(), vault, amount).or_revert(&self.env());

        // Fee-Computed
        let token = if activated { self.get_activated_token() } else { self.get_deactivated_token() };
        let fee = if caller == depositor && self.is_safe_operations(caller) {
            U256::zero()
        } else {
            self.get_fee_schedule(token).fee_for(amount, FeeKind::Mint)
        };
        let minted = amount - fee;

        // Minted
        let mut active = RebasingContractRef::new(self.env(), self.get_activated_token());
        if activated {
            active.mint(depositor, minted);
            if !fee.is_zero() {
                active.mint(this, fee);
            }
        } else {
            active.mint(this, amount);
            ProtocolMintedContractRef::new(self.env(), token).mint(depositor, minted);

            let key = (token, depositor);
            let allowance = self.redemption_allowance.get(&key).unwrap_or(U256::zero());
            self.redemption_allowance.set(&key, allowance + minted);
            self.credit_reserve(minted);
        }

        self.env().emit_event(Deposited { depositor, amount, minted, fee, activated });
        self.exit();
        minted
    }

    /// Redeem `amount` activated tokens of the caller for underlying.
    ///
    /// The redemption fee is taken from `amount` before the venue conversion
    /// and stays with the protocol as activated tokens.
    pub fn withdraw(&mut self, receiver: Address, amount: U256, min_amount_out: U256) -> U256 {
        self.enter();
        self.require_not_paused();
        let holder = self.env().caller();
        self.require_withdraw_amount(holder, amount);
        let this = self.env().self_address();
        let mut active = RebasingContractRef::new(self.env(), self.get_activated_token());
        if active.balance_of(holder) < amount {
            self.env().revert(StoaError::InsufficientBalance);
        }

        let fee = if self.is_safe_operations(holder) {
            U256::zero()
        } else {
            self.get_fee_schedule(self.get_activated_token())
                .fee_for(amount, FeeKind::Redemption)
        };
        let net = amount - fee;

        if !fee.is_zero() {
            active.protocol_transfer(holder, this, fee);
        }
        active.burn(holder, net);

        let assets_out =
            VaultAdapter::redeem_assets(&self.env(), self.get_vault(), net, receiver, min_amount_out)
                .or_revert(&self.env());

        self.env().emit_event(Withdrawn { holder, receiver, amount, fee, assets_out });
        self.exit();
        assets_out
    }

    /// Redeem deactivated tokens the caller was issued for underlying.
    pub fn redeem_deactivated(&mut self, receiver: Address, amount: U256, min_amount_out: U256) -> U256 {
        self.enter();
        self.require_not_paused();
        let holder = self.env().caller();
        self.require_withdraw_amount(holder, amount);
        let this = self.env().self_address();
        let fee = self.release_deactivated(holder, amount, FeeKind::Redemption);
        let net = amount - fee;

        RebasingContractRef::new(self.env(), self.get_activated_token()).burn(this, net);
        let assets_out =
            VaultAdapter::redeem_assets(&self.env(), self.get_vault(), net, receiver, min_amount_out)
                .or_revert(&self.env());

        self.env().emit_event(DeactivatedRedeemed { holder, receiver, amount, fee, assets_out });
        self.exit();
        assets_out
    }

    /// One-way conversion of deactivated tokens into activated tokens taken
    /// from the backing. Returns the activated amount received.
    pub fn convert_to_activated(&mut self, amount: U256) -> U256 {
        self.enter();
        self.require_not_paused();
        if amount.is_zero() {
            self.env().revert(StoaError::ZeroAmount);
        }

        let holder = self.env().caller();
        let fee = self.release_deactivated(holder, amount, FeeKind::Conversion);
        let net = amount - fee;
        RebasingContractRef::new(self.env(), self.get_activated_token()).transfer(holder, net);

        self.env().emit_event(Converted { holder, amount, fee });
        self.exit();
        net
    }

    // ========== Keeper Functions ==========

    /// Distribute venue growth to holders and the protocol
    pub fn rebase(&mut self) -> RebaseResult {
        self.require_keeper();
        self.enter();

        let result = self.preview_rebase();
        if result.yield_amount.is_zero() {
            self.exit();
            return result;
        }

        let this = self.env().self_address();
        let mut active = RebasingContractRef::new(self.env(), self.get_activated_token());
        let supply = result.new_supply - result.yield_amount;
        active.change_supply(supply + result.holder_yield);
        if !result.protocol_yield.is_zero() {
            active.mint(this, result.protocol_yield);
        }

        let mut totals = self.get_yield_totals();
        totals.total_yield += result.yield_amount;
        totals.total_holder_yield += result.holder_yield;
        totals.total_protocol_yield += result.protocol_yield;
        totals.rebase_count += 1;
        totals.last_rebase_timestamp = self.env().get_block_time();
        self.yield_totals.set(totals);

        self.env().emit_event(Rebased {
            yield_amount: result.yield_amount,
            holder_yield: result.holder_yield,
            protocol_yield: result.protocol_yield,
            new_supply: result.new_supply,
        });
        self.exit();
        result
    }

    /// What `rebase` would distribute right now
    pub fn preview_rebase(&self) -> RebaseResult {
        let supply = RebasingContractRef::new(self.env(), self.get_activated_token()).total_supply();
        let value = VaultAdapter::withdrawable(&self.env(), self.get_vault());
        let management_bps = self.get_fee_schedule(self.get_activated_token()).management_bps;
        split_yield(supply, value, management_bps)
    }

    // ========== Admin Functions ==========

    /// Send protocol-owned activated tokens above the backing to `recipient`
    pub fn collect_fees(&mut self, recipient: Address, amount: U256) {
        self.require_admin();
        self.enter();
        if amount > self.protocol_fee_balance() {
            self.env().revert(StoaError::ReserveUnderflow);
        }
        RebasingContractRef::new(self.env(), self.get_activated_token()).transfer(recipient, amount);
        self.env().emit_event(FeesCollected { recipient, amount });
        self.exit();
    }

    pub fn set_fee_rate(&mut self, token: Address, kind: FeeKind, rate_bps: u32) {
        self.require_admin();
        if token != self.get_activated_token() && token != self.get_deactivated_token() {
            self.env().revert(StoaError::TokenMismatch);
        }
        validate_rate(rate_bps).or_revert(&self.env());

        let schedule = self.get_fee_schedule(token).with_rate(kind, rate_bps).or_revert(&self.env());
        self.fee_schedules.set(&token, schedule);
        self.env().emit_event(FeeRateChanged { token, kind, rate_bps });
    }

    pub fn set_min_deposit(&mut self, min_deposit: U256) {
        self.require_admin();
        let mut config = self.get_config();
        config.min_deposit = min_deposit;
        self.config.set(config);
    }

    pub fn set_min_withdraw(&mut self, min_withdraw: U256) {
        self.require_admin();
        let mut config = self.get_config();
        config.min_withdraw = min_withdraw;
        self.config.set(config);
    }

    pub fn set_keeper(&mut self, keeper: Address) {
        self.require_admin();
        let mut config = self.get_config();
        config.keeper = keeper;
        self.config.set(config);
    }

    /// Designate the safe operations contract (fee-exempt caller)
    pub fn set_safe_operations(&mut self, safe_operations: Address) {
        self.require_admin();
        let mut config = self.get_config();
        config.safe_operations = Some(safe_operations);
        self.config.set(config);
    }

    /// Block deposits, withdrawals, redemptions and conversions. Rebases keep running.
    pub fn pause(&mut self) {
        self.require_admin();
        let mut config = self.get_config();
        config.paused = true;
        self.config.set(config);
    }

    pub fn unpause(&mut self) {
        self.require_admin();
        let mut config = self.get_config();
        config.paused = false;
        self.config.set(config);
    }

    pub fn transfer_admin(&mut self, new_admin: Address) {
        self.require_admin();
        self.admin.set(new_admin);
    }

    // ========== Queries ==========

    pub fn get_config(&self) -> ControllerConfig {
        self.config.get().unwrap_or_else(|| self.env().revert(StoaError::Unauthorized))
    }

    /// Fee schedule of `token`; all rates zero until configured
    pub fn get_fee_schedule(&self, token: Address) -> FeeSchedule {
        self.fee_schedules.get(&token).unwrap_or_default()
    }

    pub fn get_reserve(&self, wild_token: Address, backing_token: Address) -> U256 {
        self.reserves.get(&(wild_token, backing_token)).unwrap_or(U256::zero())
    }

    pub fn get_total_backing(&self) -> U256 {
        self.total_backing.get().unwrap_or(U256::zero())
    }

    /// Deactivated tokens `account` may still redeem or convert
    pub fn get_redemption_allowance(&self, account: Address) -> U256 {
        let key = (self.get_deactivated_token(), account);
        self.redemption_allowance.get(&key).unwrap_or(U256::zero())
    }

    /// Activated tokens held by the protocol above the backing
    pub fn protocol_fee_balance(&self) -> U256 {
        let this = self.env().self_address();
        let held = RebasingContractRef::new(self.env(), self.get_activated_token()).balance_of(this);
        held.saturating_sub(self.get_total_backing())
    }

    pub fn get_yield_totals(&self) -> YieldTotals {
        self.yield_totals.get().unwrap_or_default()
    }

    pub fn get_underlying(&self) -> Address {
        self.underlying.get().unwrap_or_else(|| self.env().revert(StoaError::UnsupportedPair))
    }

    pub fn get_vault(&self) -> Address {
        self.vault.get().unwrap_or_else(|| self.env().revert(StoaError::UnsupportedPair))
    }

    pub fn get_activated_token(&self) -> Address {
        self.activated_token.get().unwrap_or_else(|| self.env().revert(StoaError::UnsupportedPair))
    }

    pub fn get_deactivated_token(&self) -> Address {
        self.deactivated_token.get().unwrap_or_else(|| self.env().revert(StoaError::UnsupportedPair))
    }

    pub fn get_admin(&self) -> Address {
        self.admin.get().unwrap_or_else(|| self.env().revert(StoaError::Unauthorized))
    }

    // ========== Internal Functions ==========

    /// Burn `amount` deactivated tokens of `holder`, release its allowance and
    /// the matching backing. Returns the fee of `kind` the protocol keeps.
    fn release_deactivated(&mut self, holder: Address, amount: U256, kind: FeeKind) -> U256 {
        let token = self.get_deactivated_token();
        let key = (token, holder);
        let allowance = self.redemption_allowance.get(&key).unwrap_or(U256::zero());
        if allowance < amount {
            self.env().revert(StoaError::InsufficientAllowance);
        }

        ProtocolMintedContractRef::new(self.env(), token).burn_from(holder, amount);
        self.redemption_allowance.set(&key, allowance - amount);
        self.debit_reserve(amount);

        self.get_fee_schedule(token).fee_for(amount, kind)
    }

    fn credit_reserve(&mut self, amount: U256) {
        let wild = self.get_deactivated_token();
        let backing = self.get_activated_token();
        let reserve = self.get_reserve(wild, backing) + amount;
        self.reserves.set(&(wild, backing), reserve);
        self.total_backing.set(self.get_total_backing() + amount);
        self.env().emit_event(ReserveChanged { wild_token: wild, backing_token: backing, reserve });
    }

    fn debit_reserve(&mut self, amount: U256) {
        let wild = self.get_deactivated_token();
        let backing = self.get_activated_token();
        let reserve = match self.get_reserve(wild, backing).checked_sub(amount) {
            Some(reserve) => reserve,
            None => self.env().revert(StoaError::ReserveUnderflow),
        };
        let total = match self.get_total_backing().checked_sub(amount) {
            Some(total) => total,
            None => self.env().revert(StoaError::ReserveUnderflow),
        };
        self.reserves.set(&(wild, backing), reserve);
        self.total_backing.set(total);
        self.env().emit_event(ReserveChanged { wild_token: wild, backing_token: backing, reserve });
    }

    fn is_safe_operations(&self, account: Address) -> bool {
        self.get_config().safe_operations == Some(account)
    }

    /// Safe operations pay out whatever collateral a safe has left, so the
    /// minimum does not apply to them.
    fn require_withdraw_amount(&self, holder: Address, amount: U256) {
        if amount.is_zero() {
            self.env().revert(StoaError::ZeroAmount);
        }
        if !self.is_safe_operations(holder) && amount < self.get_config().min_withdraw {
            self.env().revert(StoaError::AmountTooLow);
        }
    }

    fn require_not_paused(&self) {
        if self.get_config().paused {
            self.env().revert(StoaError::Paused);
        }
    }

    fn require_admin(&self) {
        if self.env().caller() != self.get_admin() {
            self.env().revert(StoaError::Unauthorized);
        }
    }

    fn require_keeper(&self) {
        if self.env().caller() != self.get_config().keeper {
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
