//! Deploy the Stoa contracts to Casper livenet/testnet using the Odra livenet environment.
//!
//! Usage:
//!   cargo run --bin deploy_livenet --release
//!
//! Requires .env file with:
//!   ODRA_CASPER_LIVENET_SECRET_KEY_PATH=/path/to/secret_key.pem
//!   ODRA_CASPER_LIVENET_NODE_ADDRESS=https://node.testnet.casper.network
//!   ODRA_CASPER_LIVENET_CHAIN_NAME=casper-test
//!   ODRA_CASPER_LIVENET_PAYMENT_AMOUNT=200000000000
//!
//! and the external collaborators, as formatted Casper addresses:
//!   STOA_UNDERLYING=hash-...
//!   STOA_VAULT=hash-...
//!   STOA_ORACLE=hash-...
//!   STOA_KEEPER=account-hash-...   (optional, defaults to the deployer)

use std::process;
use std::str::FromStr;

use odra::casper_types::U256;
use odra::host::Deployer;
use odra::prelude::*;

use stoa_contracts::activated_token::{ActivatedToken, ActivatedTokenInitArgs};
use stoa_contracts::controller::{YieldController, YieldControllerInitArgs};
use stoa_contracts::deactivated_token::{DeactivatedToken, DeactivatedTokenInitArgs};
use stoa_contracts::fees::FeeKind;
use stoa_contracts::safe_manager::{SafeManager, SafeManagerInitArgs};
use stoa_contracts::safe_operations::{SafeOperations, SafeOperationsInitArgs};

fn address_from_env(name: &str) -> Result<Address, String> {
    let raw = std::env::var(name).map_err(|_| format!("{} is not set", name))?;
    Address::from_str(raw.trim()).map_err(|_| format!("{} is not a valid address: {}", name, raw))
}

fn main() {
    // Load environment from .env file
    dotenv::dotenv().ok();

    println!("=== Stoa Livenet Deployment ===");
    println!();

    let (underlying, vault, oracle) = match (
        address_from_env("STOA_UNDERLYING"),
        address_from_env("STOA_VAULT"),
        address_from_env("STOA_ORACLE"),
    ) {
        (Ok(underlying), Ok(vault), Ok(oracle)) => (underlying, vault, oracle),
        (underlying, vault, oracle) => {
            for err in [underlying.err(), vault.err(), oracle.err()].into_iter().flatten() {
                eprintln!("error: {}", err);
            }
            process::exit(1);
        }
    };

    // Initialize Odra livenet environment
    let env = odra_casper_livenet_env::env();

    // Configure payment amount for deployments/calls (required for Casper 2.0 txs)
    let payment_amount: u64 = std::env::var("ODRA_CASPER_LIVENET_PAYMENT_AMOUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(200_000_000_000);
    env.set_gas(payment_amount);

    let deployer = env.caller();
    let keeper = address_from_env("STOA_KEEPER").unwrap_or(deployer);
    println!("Deployer: {:?}", deployer);
    println!("Keeper:   {:?}", keeper);
    println!();

    // Protocol parameters
    let mcr_bps: u32 = 15_000; // 150%
    let min_deposit = U256::exp10(18); // 1 token
    let min_withdraw = U256::exp10(18);
    let mint_fee_bps: u32 = 30; // 0.3%
    let redemption_fee_bps: u32 = 30;
    let management_fee_bps: u32 = 1_000; // 10% of yield
    let origination_fee_bps: u32 = 50; // 0.5%

    // ==================== Phase 1: Tokens ====================
    println!("=== Phase 1: Deploying Tokens ===");
    println!();

    println!("Deploying ActivatedToken...");
    let mut active = ActivatedToken::deploy(
        &env,
        ActivatedTokenInitArgs {
            name: String::from("Stoa Dollar"),
            symbol: String::from("stUSD"),
            decimals: 18,
            admin: deployer,
        },
    );
    let active_addr = active.address().clone();
    println!("ActivatedToken deployed at: {:?}", active_addr);

    println!("Deploying DeactivatedToken...");
    let mut deactivated = DeactivatedToken::deploy(
        &env,
        DeactivatedTokenInitArgs {
            name: String::from("Stoa Dollar (deactivated)"),
            symbol: String::from("USDST"),
            decimals: 18,
            admin: deployer,
        },
    );
    let deactivated_addr = deactivated.address().clone();
    println!("DeactivatedToken deployed at: {:?}", deactivated_addr);

    println!();

    // ==================== Phase 2: Controller and Safes ====================
    println!("=== Phase 2: Deploying Controller and Safe Contracts ===");
    println!();

    println!("Deploying YieldController...");
    let mut controller = YieldController::deploy(
        &env,
        YieldControllerInitArgs {
            admin: deployer,
            keeper,
            underlying,
            vault,
            activated_token: active_addr,
            deactivated_token: deactivated_addr,
            min_deposit,
            min_withdraw,
        },
    );
    let controller_addr = controller.address().clone();
    println!("YieldController deployed at: {:?}", controller_addr);

    println!("Deploying SafeManager...");
    let mut manager = SafeManager::deploy(&env, SafeManagerInitArgs { admin: deployer, oracle });
    let manager_addr = manager.address().clone();
    println!("SafeManager deployed at: {:?}", manager_addr);

    println!("Deploying SafeOperations...");
    let mut ops = SafeOperations::deploy(
        &env,
        SafeOperationsInitArgs {
            admin: deployer,
            keeper,
            safe_manager: manager_addr,
        },
    );
    let ops_addr = ops.address().clone();
    println!("SafeOperations deployed at: {:?}", ops_addr);

    println!();

    // ==================== Phase 3: Roles and Parameters ====================
    println!("=== Phase 3: Wiring Roles and Parameters ===");
    println!();

    println!("Granting token roles...");
    active.add_minter(controller_addr);
    active.set_rebaser(controller_addr);
    deactivated.add_minter(controller_addr);
    deactivated.add_minter(ops_addr);
    println!("Done.");

    println!("Configuring YieldController...");
    controller.set_safe_operations(ops_addr);
    controller.set_fee_rate(active_addr, FeeKind::Mint, mint_fee_bps);
    controller.set_fee_rate(active_addr, FeeKind::Redemption, redemption_fee_bps);
    controller.set_fee_rate(active_addr, FeeKind::Management, management_fee_bps);
    controller.set_fee_rate(deactivated_addr, FeeKind::Mint, mint_fee_bps);
    controller.set_fee_rate(deactivated_addr, FeeKind::Redemption, redemption_fee_bps);
    controller.set_fee_rate(deactivated_addr, FeeKind::Origination, origination_fee_bps);
    println!("Done.");

    println!("Configuring SafeManager...");
    manager.set_safe_operations(ops_addr);
    manager.set_mcr(active_addr, deactivated_addr, mcr_bps);
    println!("Done.");

    println!("Configuring SafeOperations...");
    ops.set_controller(active_addr, controller_addr);
    println!("Done.");

    println!();
    println!("=== Deployment Complete ===");
    println!();
    println!("Contract Addresses:");
    println!("  ActivatedToken:     {:?}", active_addr);
    println!("  DeactivatedToken:   {:?}", deactivated_addr);
    println!("  YieldController:    {:?}", controller_addr);
    println!("  SafeManager:        {:?}", manager_addr);
    println!("  SafeOperations:     {:?}", ops_addr);
}
