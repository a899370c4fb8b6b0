//! Protocol error definitions.

use odra::prelude::*;

/// Broad class of a protocol error.
///
/// Callers use the kind to decide whether a failure is routine (retry with a
/// corrected amount) or an alarm that should page an operator.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Malformed arguments or amounts, rejected before any mutation.
    Validation,
    /// Balance, allowance or collateral shortfall.
    Insufficient,
    /// The operation would break a ledger invariant.
    InvariantViolation,
    /// The yield venue or oracle returned something unusable.
    ExternalVenue,
    /// Caller lacks the required role.
    Access,
}

/// Stoa protocol errors
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StoaError {
    // Validation errors (1xx)
    AmountTooLow = 100,
    ZeroAmount = 101,
    InvalidAccount = 102,
    InvalidFeeRate = 103,
    UnsupportedPair = 104,
    TokenMismatch = 105,
    InvalidStatusTransition = 106,
    SafeNotActive = 107,
    SafeNotFound = 108,
    Paused = 109,

    // Shortfall errors (2xx)
    InsufficientBalance = 200,
    InsufficientAllowance = 201,
    InsufficientFunds = 202,
    NegativeBalance = 203,
    RepayExceedsDebt = 204,
    BelowMcr = 205,
    NotUnderwater = 206,
    DebtOutstanding = 207,

    // Invariant violations (3xx)
    InvalidRebase = 300,
    SupplyOverflow = 301,
    ReserveUnderflow = 302,
    CreditMismatch = 303,
    Reentrancy = 304,

    // External venue / oracle errors (4xx)
    VenueSlippage = 400,
    OraclePriceUnavailable = 401,

    // Access control errors (5xx)
    Unauthorized = 500,
    UnauthorizedProtocol = 501,
}

impl StoaError {
    pub const fn message(&self) -> &'static str {
        match self {
            // Validation
            StoaError::AmountTooLow => "Amount below configured minimum",
            StoaError::ZeroAmount => "Amount must be non-zero",
            StoaError::InvalidAccount => "Invalid account: null identity",
            StoaError::InvalidFeeRate => "Fee rate above 10000 bps",
            StoaError::UnsupportedPair => "Collateral/debt pair not supported",
            StoaError::TokenMismatch => "Token does not match safe",
            StoaError::InvalidStatusTransition => "Invalid safe status transition",
            StoaError::SafeNotActive => "Safe is not active",
            StoaError::SafeNotFound => "Safe not found",
            StoaError::Paused => "Operation blocked: controller paused",

            // Shortfall
            StoaError::InsufficientBalance => "Insufficient balance",
            StoaError::InsufficientAllowance => "Insufficient allowance",
            StoaError::InsufficientFunds => "Depositor has insufficient underlying",
            StoaError::NegativeBalance => "Adjustment would make collateral negative",
            StoaError::RepayExceedsDebt => "Repay amount exceeds safe debt",
            StoaError::BelowMcr => "Below minimum collateralization ratio",
            StoaError::NotUnderwater => "Safe is not underwater",
            StoaError::DebtOutstanding => "Safe still has outstanding debt",

            // Invariants
            StoaError::InvalidRebase => "Rebase would zero the credits per token rate",
            StoaError::SupplyOverflow => "Total supply above maximum",
            StoaError::ReserveUnderflow => "Backing reserve would go negative",
            StoaError::CreditMismatch => "Credit totals out of balance",
            StoaError::Reentrancy => "Re-entrant call rejected",

            // External
            StoaError::VenueSlippage => "Yield venue returned less than expected",
            StoaError::OraclePriceUnavailable => "Oracle price unavailable",

            // Access control
            StoaError::Unauthorized => "Unauthorized caller",
            StoaError::UnauthorizedProtocol => "Unauthorized: caller is not protocol contract",
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match *self as u16 {
            100..=199 => ErrorKind::Validation,
            200..=299 => ErrorKind::Insufficient,
            300..=399 => ErrorKind::InvariantViolation,
            400..=499 => ErrorKind::ExternalVenue,
            _ => ErrorKind::Access,
        }
    }
}

impl core::fmt::Display for StoaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<StoaError> for OdraError {
    fn from(error: StoaError) -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            OdraError::user(error as u16)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            OdraError::user(error as u16, error.message())
        }
    }
}

/// Revert the running call with the carried error.
///
/// Pure helpers return `Result<_, StoaError>`; contracts unwrap them with
/// `.or_revert(&self.env())`.
pub trait OrRevert<T> {
    fn or_revert(self, env: &odra::ContractEnv) -> T;
}

impl<T> OrRevert<T> for Result<T, StoaError> {
    fn or_revert(self, env: &odra::ContractEnv) -> T {
        match self {
            Ok(value) => value,
            Err(error) => env.revert(error),
        }
    }
}
