//! Deploys and wires a full protocol instance on the Odra test VM.

use odra::casper_types::U256;
use odra::host::{Deployer, HostEnv, HostRef, NoArgs};
use odra::prelude::*;

use stoa_contracts::activated_token::{ActivatedToken, ActivatedTokenHostRef, ActivatedTokenInitArgs};
use stoa_contracts::controller::{YieldController, YieldControllerHostRef, YieldControllerInitArgs};
use stoa_contracts::deactivated_token::{
    DeactivatedToken, DeactivatedTokenHostRef, DeactivatedTokenInitArgs,
};
use stoa_contracts::fees::FeeKind;
use stoa_contracts::mocks::{
    MockOracle, MockOracleHostRef, MockUnderlying, MockUnderlyingHostRef, MockVault,
    MockVaultHostRef, MockVaultInitArgs,
};
use stoa_contracts::safe_manager::{SafeManager, SafeManagerHostRef, SafeManagerInitArgs};
use stoa_contracts::safe_operations::{
    SafeOperations, SafeOperationsHostRef, SafeOperationsInitArgs,
};

/// 150%
pub const MCR_BPS: u32 = 15_000;

/// Underlying each test account starts with, in whole tokens
pub const STARTING_BALANCE: u64 = 1_000_000;

/// `n` whole tokens at 18 decimals
pub fn tokens(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

/// A price of `n` units of account, scaled by 1e18
pub fn price(n: u64) -> U256 {
    tokens(n)
}

/// Assert `actual` is within a few thousand base units of `expected`.
///
/// Rebases truncate the credits-per-token rate, which shows up in the last
/// digits of an 18-decimal balance.
pub fn assert_close(actual: U256, expected: U256) {
    let diff = if actual > expected { actual - expected } else { expected - actual };
    assert!(
        diff <= U256::from(10_000u64),
        "expected {} to be close to {}",
        actual,
        expected
    );
}

pub struct Protocol {
    pub env: HostEnv,
    pub admin: Address,
    pub keeper: Address,
    pub alice: Address,
    pub bob: Address,
    pub underlying: MockUnderlyingHostRef,
    pub vault: MockVaultHostRef,
    pub oracle: MockOracleHostRef,
    pub active: ActivatedTokenHostRef,
    pub deactivated: DeactivatedTokenHostRef,
    pub controller: YieldControllerHostRef,
    pub manager: SafeManagerHostRef,
    pub ops: SafeOperationsHostRef,
}

impl Protocol {
    pub fn deploy() -> Self {
        let env = odra_test::env();
        let admin = env.get_account(0);
        let keeper = env.get_account(1);
        let alice = env.get_account(2);
        let bob = env.get_account(3);
        env.set_caller(admin);

        let mut underlying = MockUnderlying::deploy(&env, NoArgs);
        let vault = MockVault::deploy(
            &env,
            MockVaultInitArgs { asset: underlying.address().clone() },
        );
        let mut oracle = MockOracle::deploy(&env, NoArgs);

        let mut active = ActivatedToken::deploy(
            &env,
            ActivatedTokenInitArgs {
                name: String::from("Stoa Dollar"),
                symbol: String::from("stUSD"),
                decimals: 18,
                admin,
            },
        );
        let mut deactivated = DeactivatedToken::deploy(
            &env,
            DeactivatedTokenInitArgs {
                name: String::from("Stoa Dollar (deactivated)"),
                symbol: String::from("USDST"),
                decimals: 18,
                admin,
            },
        );

        let mut controller = YieldController::deploy(
            &env,
            YieldControllerInitArgs {
                admin,
                keeper,
                underlying: underlying.address().clone(),
                vault: vault.address().clone(),
                activated_token: active.address().clone(),
                deactivated_token: deactivated.address().clone(),
                min_deposit: U256::one(),
                min_withdraw: U256::one(),
            },
        );
        let mut manager = SafeManager::deploy(
            &env,
            SafeManagerInitArgs { admin, oracle: oracle.address().clone() },
        );
        let ops = SafeOperations::deploy(
            &env,
            SafeOperationsInitArgs {
                admin,
                keeper,
                safe_manager: manager.address().clone(),
            },
        );

        let active_addr = active.address().clone();
        let deactivated_addr = deactivated.address().clone();
        let controller_addr = controller.address().clone();
        let ops_addr = ops.address().clone();

        active.add_minter(controller_addr);
        active.set_rebaser(controller_addr);
        deactivated.add_minter(controller_addr);
        deactivated.add_minter(ops_addr);

        controller.set_safe_operations(ops_addr);
        manager.set_safe_operations(ops_addr);
        manager.set_mcr(active_addr, deactivated_addr, MCR_BPS);

        oracle.set_price(active_addr, price(1500));
        oracle.set_price(deactivated_addr, price(1));

        underlying.mint(alice, tokens(STARTING_BALANCE));
        underlying.mint(bob, tokens(STARTING_BALANCE));

        let mut protocol = Self {
            env,
            admin,
            keeper,
            alice,
            bob,
            underlying,
            vault,
            oracle,
            active,
            deactivated,
            controller,
            manager,
            ops,
        };
        protocol.ops.set_controller(active_addr, controller_addr);
        protocol
    }

    pub fn active_addr(&self) -> Address {
        self.active.address().clone()
    }

    pub fn deactivated_addr(&self) -> Address {
        self.deactivated.address().clone()
    }

    pub fn controller_addr(&self) -> Address {
        self.controller.address().clone()
    }

    pub fn ops_addr(&self) -> Address {
        self.ops.address().clone()
    }

    pub fn vault_addr(&self) -> Address {
        self.vault.address().clone()
    }

    /// Set a fee rate as admin
    pub fn set_fee(&mut self, token: Address, kind: FeeKind, rate_bps: u32) {
        self.env.set_caller(self.admin);
        self.controller.set_fee_rate(token, kind, rate_bps);
    }

    /// Approve the controller and deposit as `account`
    pub fn deposit(&mut self, account: Address, amount: U256, activated: bool) -> U256 {
        let controller = self.controller_addr();
        self.env.set_caller(account);
        self.underlying.approve(controller, amount);
        self.controller.deposit(account, amount, activated)
    }

    /// Approve safe operations and open a safe as `account`
    pub fn open_safe(&mut self, account: Address, amount: U256) -> u64 {
        let ops = self.ops_addr();
        let active = self.active_addr();
        let deactivated = self.deactivated_addr();
        self.env.set_caller(account);
        self.underlying.approve(ops, amount);
        self.ops.open_safe(active, deactivated, amount)
    }

    /// Simulate venue yield by minting underlying straight into it
    pub fn accrue_yield(&mut self, amount: U256) {
        let vault = self.vault_addr();
        self.underlying.mint(vault, amount);
    }

    pub fn underlying_of(&self, account: Address) -> U256 {
        self.underlying.balance_of(account)
    }
}
