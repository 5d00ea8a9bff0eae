//! The fixed-point boundary of the pipeline. Collateral amounts are integers
//! in 6-decimal stablecoin units, outcome-token amounts are integers in
//! 18-decimal units. Raw chain quantities stay `U256` until the moment a
//! ledger field is set; these helpers are that moment.

use {crate::conversions::u256_to_f64, alloy_primitives::U256};

pub const COLLATERAL_DECIMALS: u32 = 6;
pub const OUTCOME_TOKEN_DECIMALS: u32 = 18;

const COLLATERAL_UNIT: f64 = 1e6;
const OUTCOME_TOKEN_UNIT: f64 = 1e18;

/// Raw outcome-token units minted per raw collateral unit (`10^12`).
pub fn tokens_per_collateral_unit() -> U256 {
    U256::from(10u64).pow(U256::from(
        (OUTCOME_TOKEN_DECIMALS - COLLATERAL_DECIMALS) as u64,
    ))
}

pub fn collateral_scalar(raw: U256) -> f64 {
    u256_to_f64(raw) / COLLATERAL_UNIT
}

pub fn outcome_scalar(raw: U256) -> f64 {
    u256_to_f64(raw) / OUTCOME_TOKEN_UNIT
}

/// The token quantity a collateral amount expands to when no transfer legs
/// are present to tell us otherwise (split and merge fallbacks).
pub fn collateral_as_outcome_scalar(raw_collateral: U256) -> f64 {
    outcome_scalar(raw_collateral * tokens_per_collateral_unit())
}
