//! Conversions between token amounts and liquidity for a price range.
//!
//! These are quoting helpers for building mint requests; the pool itself
//! never calls them.

use crate::Q96;
use crate::error::{Error, MathError};
use crate::math::math_helpers::mul_div;
use crate::math::sqrt_price_math::{get_amount_0_delta_base, get_amount_1_delta_base};
use alloy_primitives::U256;

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a > b { (b, a) } else { (a, b) }
}

fn to_u128(x: U256) -> Result<u128, MathError> {
    u128::try_from(x).map_err(|_| MathError::Overflow)
}

/// Liquidity provided by `amount0` across `[sqrt_ratio_a_x96, sqrt_ratio_b_x96]`.
pub fn get_liquidity_for_amount_0(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    amount0: U256,
) -> Result<u128, MathError> {
    let (a, b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    let intermediate = mul_div(a, b, Q96)?;
    to_u128(mul_div(amount0, intermediate, b - a)?)
}

/// Liquidity provided by `amount1` across `[sqrt_ratio_a_x96, sqrt_ratio_b_x96]`.
pub fn get_liquidity_for_amount_1(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    amount1: U256,
) -> Result<u128, MathError> {
    let (a, b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    to_u128(mul_div(amount1, Q96, b - a)?)
}

/// Maximum liquidity that `amount0` and `amount1` can back for the range
/// at the current price `sqrt_ratio_x96`.
///
/// Below the range only token0 counts, above it only token1; inside the
/// range the scarcer side wins.
pub fn get_liquidity_for_amounts(
    sqrt_ratio_x96: U256,
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    amount0: U256,
    amount1: U256,
) -> Result<u128, MathError> {
    let (a, b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);

    if sqrt_ratio_x96 <= a {
        get_liquidity_for_amount_0(a, b, amount0)
    } else if sqrt_ratio_x96 < b {
        let liquidity0 = get_liquidity_for_amount_0(sqrt_ratio_x96, b, amount0)?;
        let liquidity1 = get_liquidity_for_amount_1(a, sqrt_ratio_x96, amount1)?;
        Ok(liquidity0.min(liquidity1))
    } else {
        get_liquidity_for_amount_1(a, b, amount1)
    }
}

/// Token amounts backing `liquidity` over the range at `sqrt_ratio_x96`,
/// rounded down.
pub fn get_amounts_for_liquidity(
    sqrt_ratio_x96: U256,
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
) -> Result<(U256, U256), Error> {
    let (a, b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);

    if sqrt_ratio_x96 <= a {
        Ok((get_amount_0_delta_base(a, b, liquidity, false)?, U256::ZERO))
    } else if sqrt_ratio_x96 < b {
        Ok((
            get_amount_0_delta_base(sqrt_ratio_x96, b, liquidity, false)?,
            get_amount_1_delta_base(a, sqrt_ratio_x96, liquidity, false)?,
        ))
    } else {
        Ok((U256::ZERO, get_amount_1_delta_base(a, b, liquidity, false)?))
    }
}
