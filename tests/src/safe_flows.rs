//! Safe lifecycle: open, borrow, repay, withdraw, transfer, close and
//! liquidation flagging.

use odra::casper_types::U256;
use odra::prelude::Addressable;
use odra::host::HostRef;
use pretty_assertions::assert_eq;

use stoa_contracts::errors::StoaError;
use stoa_contracts::fees::FeeKind;
use stoa_contracts::types::SafeStatus;

use crate::fixture::{assert_close, price, tokens, Protocol, STARTING_BALANCE};

/// Alice opens a 100 token safe and borrows `debt` against it
fn indebted_safe(debt: u64) -> Protocol {
    let mut p = Protocol::deploy();
    p.open_safe(p.alice, tokens(100));
    p.env.set_caller(p.alice);
    p.ops.borrow(0, tokens(debt));
    p
}

// ===== Opening =====

#[test]
fn test_open_safe_records_shares_and_fee_markers() {
    let mut p = Protocol::deploy();
    let active = p.active_addr();
    p.set_fee(active, FeeKind::Mint, 30);
    p.set_fee(active, FeeKind::Redemption, 100);

    let index = p.open_safe(p.alice, tokens(100));
    assert_eq!(index, 0);

    let safe = p.manager.get_safe(p.alice, 0).unwrap();
    assert_eq!(safe.status, SafeStatus::Active);
    assert_eq!(safe.collateral_shares, tokens(100));
    assert_eq!(safe.debt, U256::zero());
    assert_eq!(safe.mint_fee_applied, tokens(3) / 10);
    assert_eq!(safe.redemption_fee_applied, tokens(1));

    // Safe deposits skip the mint fee; the activated tokens sit with safe operations
    assert_eq!(p.active.balance_of(p.ops_addr()), tokens(100));
    assert_eq!(p.active.balance_of(p.controller_addr()), U256::zero());
    assert_eq!(p.manager.get_total_collateral(active), tokens(100));
    assert_eq!(p.manager.get_safe_count(p.alice), 1);
    assert_eq!(p.underlying_of(p.alice), tokens(STARTING_BALANCE) - tokens(100));

    let second = p.open_safe(p.alice, tokens(10));
    assert_eq!(second, 1);
    assert_eq!(p.manager.get_safe_count(p.alice), 2);
}

#[test]
fn test_open_safe_for_unsupported_pair() {
    let mut p = Protocol::deploy();
    let ops = p.ops_addr();
    let active = p.active_addr();
    let underlying = p.underlying.address().clone();

    p.env.set_caller(p.alice);
    p.underlying.approve(ops, tokens(100));
    assert_eq!(
        p.ops.try_open_safe(active, underlying, tokens(100)),
        Err(StoaError::UnsupportedPair.into())
    );
    // The pulled collateral went back with the revert
    assert_eq!(p.underlying_of(p.alice), tokens(STARTING_BALANCE));
    assert_eq!(p.manager.get_safe_count(p.alice), 0);
}

#[test]
fn test_deposit_to_adds_collateral() {
    let mut p = Protocol::deploy();
    p.open_safe(p.alice, tokens(100));

    let ops = p.ops_addr();
    p.env.set_caller(p.alice);
    p.underlying.approve(ops, tokens(25));
    p.ops.deposit_to(0, tokens(25));

    assert_eq!(p.manager.get_safe(p.alice, 0).unwrap().collateral_shares, tokens(125));
    assert_eq!(p.manager.collateral_value(p.alice, 0), tokens(125));
}

// ===== Borrowing =====

#[test]
fn test_borrow_within_mcr() {
    let p = indebted_safe(60_000);

    assert_eq!(p.deactivated.balance_of(p.alice), tokens(60_000));
    let safe = p.manager.get_safe(p.alice, 0).unwrap();
    assert_eq!(safe.debt, tokens(60_000));

    // 100 tokens at 1500 against 60000 at 1 -> 250%
    assert_eq!(p.manager.is_underwater(p.alice, 0), (false, U256::from(25_000u64)));
    assert_eq!(p.manager.get_max_borrow(p.alice, 0), tokens(100_000));
}

#[test]
fn test_borrow_beyond_mcr_rejected() {
    let mut p = indebted_safe(60_000);
    assert_eq!(
        p.ops.try_borrow(0, tokens(40_001)),
        Err(StoaError::BelowMcr.into())
    );

    // Exactly at MCR is allowed
    p.ops.borrow(0, tokens(40_000));
    assert_eq!(p.manager.get_safe(p.alice, 0).unwrap().debt, tokens(100_000));
}

#[test]
fn test_borrow_origination_fee_goes_to_protocol() {
    let mut p = Protocol::deploy();
    let deactivated = p.deactivated_addr();
    p.set_fee(deactivated, FeeKind::Origination, 50);
    p.open_safe(p.alice, tokens(100));

    p.env.set_caller(p.alice);
    p.ops.borrow(0, tokens(10_000));

    assert_eq!(p.deactivated.balance_of(p.alice), tokens(9_950));
    assert_eq!(p.deactivated.balance_of(p.controller_addr()), tokens(50));
    let safe = p.manager.get_safe(p.alice, 0).unwrap();
    assert_eq!(safe.debt, tokens(10_000));
    assert_eq!(safe.origination_fees_paid, tokens(50));
}

#[test]
fn test_borrow_from_missing_safe() {
    let mut p = Protocol::deploy();
    p.env.set_caller(p.bob);
    assert_eq!(
        p.ops.try_borrow(0, tokens(1)),
        Err(StoaError::SafeNotFound.into())
    );
}

// ===== Repaying =====

#[test]
fn test_repay_reduces_debt_and_burns() {
    let mut p = indebted_safe(60_000);
    p.ops.repay(0, tokens(10_000));

    assert_eq!(p.manager.get_safe(p.alice, 0).unwrap().debt, tokens(50_000));
    assert_eq!(p.deactivated.balance_of(p.alice), tokens(50_000));
    assert_eq!(p.deactivated.total_supply(), tokens(50_000));

    assert_eq!(
        p.ops.try_repay(0, tokens(50_001)),
        Err(StoaError::RepayExceedsDebt.into())
    );
}

// ===== Withdrawing =====

#[test]
fn test_withdraw_releases_fee_markers_to_protocol() {
    let mut p = Protocol::deploy();
    let active = p.active_addr();
    p.set_fee(active, FeeKind::Mint, 30);
    p.set_fee(active, FeeKind::Redemption, 100);
    p.open_safe(p.alice, tokens(100));

    p.env.set_caller(p.alice);
    let out = p.ops.withdraw_from(0, tokens(50), U256::zero());

    // Half the markers: 0.15 mint + 0.5 redemption
    let fees = tokens(65) / 100;
    assert_eq!(out, tokens(50) - fees);
    assert_eq!(p.active.balance_of(p.controller_addr()), fees);
    assert_eq!(p.active.balance_of(p.ops_addr()), tokens(50));
    assert_eq!(
        p.underlying_of(p.alice),
        tokens(STARTING_BALANCE) - tokens(100) + tokens(50) - fees
    );

    let safe = p.manager.get_safe(p.alice, 0).unwrap();
    assert_eq!(safe.collateral_shares, tokens(50));
    assert_eq!(safe.mint_fee_applied, tokens(15) / 100);
    assert_eq!(safe.redemption_fee_applied, tokens(5) / 10);
}

#[test]
fn test_withdraw_below_mcr_rejected() {
    let mut p = indebted_safe(60_000);

    // 50 left would cover 125%
    assert_eq!(
        p.ops.try_withdraw_from(0, tokens(50), U256::zero()),
        Err(StoaError::BelowMcr.into())
    );

    // 70 left covers 175%
    p.ops.withdraw_from(0, tokens(30), U256::zero());
    assert_eq!(p.manager.is_underwater(p.alice, 0), (false, U256::from(17_500u64)));
}

#[test]
fn test_withdraw_more_than_collateral() {
    let mut p = Protocol::deploy();
    p.open_safe(p.alice, tokens(100));
    p.open_safe(p.bob, tokens(100));

    p.env.set_caller(p.alice);
    assert_eq!(
        p.ops.try_withdraw_from(0, tokens(101), U256::zero()),
        Err(StoaError::NegativeBalance.into())
    );
}

#[test]
fn test_shared_custody_splits_management_fee_evenly() {
    let mut p = Protocol::deploy();
    let active = p.active_addr();
    p.set_fee(active, FeeKind::Management, 1_000);
    p.open_safe(p.alice, tokens(100));
    p.open_safe(p.bob, tokens(100));

    // 10 of yield, 1 kept by the protocol
    p.accrue_yield(tokens(10));
    p.env.set_caller(p.keeper);
    p.controller.rebase();

    let custody = p.active.balance_of(p.ops_addr());
    assert_close(custody, tokens(209));
    let alice_value = p.manager.collateral_value(p.alice, 0);
    let bob_value = p.manager.collateral_value(p.bob, 0);
    assert_eq!(alice_value, bob_value);
    assert!(alice_value + bob_value <= custody);
    assert_close(alice_value, tokens(209) / 2);

    // Alice takes her full value first; Bob still gets the same
    p.env.set_caller(p.alice);
    let alice_out = p.ops.withdraw_from(0, alice_value, U256::zero());
    p.env.set_caller(p.bob);
    let bob_out = p.ops.close_safe(0);

    assert_close(alice_out, tokens(209) / 2);
    assert_close(bob_out, alice_out);
    assert_eq!(p.manager.get_safe(p.bob, 0).unwrap().status, SafeStatus::ClosedByOwner);
}

#[test]
fn test_deposit_after_rebase_books_fewer_shares() {
    let mut p = Protocol::deploy();
    p.open_safe(p.alice, tokens(100));
    p.accrue_yield(tokens(100));
    p.env.set_caller(p.keeper);
    p.controller.rebase();

    // Custody doubled, so 100 more buys half as many shares
    p.open_safe(p.bob, tokens(100));
    let bob = p.manager.get_safe(p.bob, 0).unwrap();
    assert_close(bob.collateral_shares, tokens(50));
    assert_close(p.manager.collateral_value(p.bob, 0), tokens(100));
    assert_close(p.manager.collateral_value(p.alice, 0), tokens(200));
}

// ===== Transfers =====

#[test]
fn test_transfer_balance_between_safes() {
    let mut p = Protocol::deploy();
    p.open_safe(p.alice, tokens(100));
    p.open_safe(p.bob, tokens(50));

    p.env.set_caller(p.alice);
    p.ops.transfer_balance(0, p.bob, 0, tokens(40));

    assert_eq!(p.manager.get_safe(p.alice, 0).unwrap().collateral_shares, tokens(60));
    assert_eq!(p.manager.get_safe(p.bob, 0).unwrap().collateral_shares, tokens(90));
    // Custody is unchanged, only the books moved
    assert_eq!(p.manager.get_total_collateral(p.active_addr()), tokens(150));
    assert_eq!(p.active.balance_of(p.ops_addr()), tokens(150));

    assert_eq!(
        p.ops.try_transfer_balance(0, p.bob, 0, tokens(61)),
        Err(StoaError::NegativeBalance.into())
    );
}

#[test]
fn test_transfer_balance_cannot_break_mcr() {
    let mut p = indebted_safe(60_000);
    p.open_safe(p.bob, tokens(10));

    p.env.set_caller(p.alice);
    assert_eq!(
        p.ops.try_transfer_balance(0, p.bob, 0, tokens(50)),
        Err(StoaError::BelowMcr.into())
    );
}

// ===== Closing =====

#[test]
fn test_close_safe_requires_zero_debt() {
    let mut p = indebted_safe(1_000);
    assert_eq!(p.ops.try_close_safe(0), Err(StoaError::DebtOutstanding.into()));

    p.ops.repay(0, tokens(1_000));
    let out = p.ops.close_safe(0);

    assert_eq!(out, tokens(100));
    assert_eq!(p.underlying_of(p.alice), tokens(STARTING_BALANCE));
    let safe = p.manager.get_safe(p.alice, 0).unwrap();
    assert_eq!(safe.status, SafeStatus::ClosedByOwner);
    assert_eq!(safe.collateral_shares, U256::zero());
    assert_eq!(p.active.total_supply(), U256::zero());
}

#[test]
fn test_closed_safe_is_terminal() {
    let mut p = Protocol::deploy();
    p.open_safe(p.alice, tokens(100));
    p.env.set_caller(p.alice);
    p.ops.close_safe(0);

    assert_eq!(p.ops.try_close_safe(0), Err(StoaError::SafeNotActive.into()));
    assert_eq!(p.ops.try_borrow(0, tokens(1)), Err(StoaError::SafeNotActive.into()));

    let ops = p.ops_addr();
    p.underlying.approve(ops, tokens(10));
    assert_eq!(p.ops.try_deposit_to(0, tokens(10)), Err(StoaError::SafeNotActive.into()));
}

#[test]
fn test_close_safe_pays_out_rebased_collateral() {
    let mut p = Protocol::deploy();
    p.open_safe(p.alice, tokens(100));
    p.accrue_yield(tokens(10));
    p.env.set_caller(p.keeper);
    p.controller.rebase();

    p.env.set_caller(p.alice);
    let out = p.ops.close_safe(0);

    assert_eq!(out, tokens(110));
    assert_eq!(p.underlying_of(p.alice), tokens(STARTING_BALANCE) + tokens(10));
}

#[test]
fn test_close_dust_safe_below_min_withdraw() {
    let mut p = Protocol::deploy();
    p.env.set_caller(p.admin);
    p.controller.set_min_withdraw(tokens(1));
    p.open_safe(p.alice, tokens(100));

    p.env.set_caller(p.alice);
    p.ops.withdraw_from(0, tokens(995) / 10, U256::zero());
    assert_eq!(p.manager.collateral_value(p.alice, 0), tokens(5) / 10);

    let out = p.ops.close_safe(0);
    assert_eq!(out, tokens(5) / 10);
    assert_eq!(p.manager.get_safe(p.alice, 0).unwrap().status, SafeStatus::ClosedByOwner);
    assert_eq!(p.underlying_of(p.alice), tokens(STARTING_BALANCE));

    // Holders outside safes still face the minimum
    p.deposit(p.bob, tokens(10), true);
    assert_eq!(
        p.controller.try_withdraw(p.bob, tokens(5) / 10, U256::zero()),
        Err(StoaError::AmountTooLow.into())
    );
}

// ===== Liquidation flagging =====

#[test]
fn test_flag_underwater_safe() {
    let mut p = indebted_safe(60_000);
    let active = p.active_addr();
    p.oracle.set_price(active, price(500));

    // 100 tokens at 500 against 60000 -> 83.33%
    assert_eq!(p.manager.is_underwater(p.alice, 0), (true, U256::from(8_333u64)));

    p.env.set_caller(p.alice);
    assert_eq!(
        p.ops.try_flag_liquidation(p.alice, 0),
        Err(StoaError::Unauthorized.into())
    );

    p.env.set_caller(p.keeper);
    p.ops.flag_liquidation(p.alice, 0);
    let safe = p.manager.get_safe(p.alice, 0).unwrap();
    assert_eq!(safe.status, SafeStatus::ClosedByLiquidation);
    // Nothing is seized
    assert_eq!(safe.collateral_shares, tokens(100));
    assert_eq!(p.active.balance_of(p.ops_addr()), tokens(100));

    assert_eq!(
        p.ops.try_flag_liquidation(p.alice, 0),
        Err(StoaError::InvalidStatusTransition.into())
    );
}

#[test]
fn test_flag_healthy_safe_rejected() {
    let mut p = indebted_safe(60_000);
    p.env.set_caller(p.keeper);
    assert_eq!(
        p.ops.try_flag_liquidation(p.alice, 0),
        Err(StoaError::NotUnderwater.into())
    );
}

#[test]
fn test_safe_without_debt_is_never_underwater() {
    let mut p = Protocol::deploy();
    p.open_safe(p.alice, tokens(100));
    let active = p.active_addr();
    p.oracle.set_price(active, price(1));

    assert_eq!(p.manager.is_underwater(p.alice, 0), (false, U256::MAX));
    p.env.set_caller(p.keeper);
    assert_eq!(
        p.ops.try_flag_liquidation(p.alice, 0),
        Err(StoaError::NotUnderwater.into())
    );
}
