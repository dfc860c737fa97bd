use crate::RESOLUTION;
use crate::math::math_helpers::{div_rounding_up, mul_div, mul_div_rounding_up, unlikely};
use crate::{
    Q96, U160_MAX,
    error::{Error, MathError, StateError},
};
use alloy_primitives::{I256, U256};

/// Next sqrt price after adding or removing `amount` of token0, rounded
/// up so the pool never hands out more than the exact price implies.
///
/// Solves `L * sqrtP / (L ± amount * sqrtP)`; when `amount * sqrtP`
/// overflows, falls back to the algebraically equal
/// `L / (L / sqrtP ± amount)` which loses a little precision instead.
pub fn get_next_sqrt_price_from_amount_0_rounding_up(
    sqrt_p_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, Error> {
    if amount.is_zero() {
        return Ok(sqrt_p_x96);
    }

    let numerator1: U256 = U256::from(liquidity) << RESOLUTION as usize;
    let product = amount.checked_mul(sqrt_p_x96);

    if add {
        if let Some(product) = product {
            if let Some(denominator) = numerator1.checked_add(product) {
                return mul_div_rounding_up(numerator1, sqrt_p_x96, denominator)
                    .map_err(Error::from);
            }
        }
        let denominator = (numerator1 / sqrt_p_x96)
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        Ok(div_rounding_up(numerator1, denominator))
    } else {
        let product = match product {
            Some(product) if numerator1 > product => product,
            _ => return Err(StateError::InsufficientReserves.into()),
        };
        let result = mul_div_rounding_up(numerator1, sqrt_p_x96, numerator1 - product)?;
        if result > U160_MAX {
            return Err(MathError::Overflow.into());
        }
        Ok(result)
    }
}

/// Next sqrt price after adding or removing `amount` of token1, rounded
/// down. Token1 moves the price additively: `sqrtP ± amount / L`.
pub fn get_next_sqrt_price_from_amount_1_rounding_down(
    sqrt_p_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, Error> {
    let liquidity = U256::from(liquidity);
    if add {
        let quotient: U256 = if amount <= U160_MAX {
            (amount << RESOLUTION as usize) / liquidity
        } else {
            mul_div(amount, Q96, liquidity)?
        };

        match sqrt_p_x96.checked_add(quotient) {
            Some(result) if result <= U160_MAX => Ok(result),
            _ => Err(MathError::Overflow.into()),
        }
    } else {
        let quotient: U256 = if amount <= U160_MAX {
            div_rounding_up(amount << RESOLUTION as usize, liquidity)
        } else {
            mul_div_rounding_up(amount, Q96, liquidity)?
        };

        if sqrt_p_x96 <= quotient {
            return Err(StateError::InsufficientReserves.into());
        }
        Ok(sqrt_p_x96 - quotient)
    }
}

/// Token0 amount between two sqrt prices for `liquidity`:
/// `L * (sqrtB - sqrtA) / (sqrtA * sqrtB)`. Argument order does not matter.
pub fn get_amount_0_delta_base(
    mut sqrt_ratio_a_x96: U256,
    mut sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, Error> {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = (sqrt_ratio_b_x96, sqrt_ratio_a_x96)
    };

    if sqrt_ratio_a_x96.is_zero() {
        return Err(StateError::SqrtRatioIsZero.into());
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION as usize;
    let numerator2 = sqrt_ratio_b_x96 - sqrt_ratio_a_x96;

    if round_up {
        Ok(div_rounding_up(
            mul_div_rounding_up(numerator1, numerator2, sqrt_ratio_b_x96)?,
            sqrt_ratio_a_x96,
        ))
    } else {
        Ok(mul_div(numerator1, numerator2, sqrt_ratio_b_x96)? / sqrt_ratio_a_x96)
    }
}

/// Token1 amount between two sqrt prices for `liquidity`:
/// `L * (sqrtB - sqrtA)`. Argument order does not matter.
pub fn get_amount_1_delta_base(
    mut sqrt_ratio_a_x96: U256,
    mut sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = (sqrt_ratio_b_x96, sqrt_ratio_a_x96)
    };
    let liquidity = U256::from(liquidity);

    if round_up {
        mul_div_rounding_up(liquidity, sqrt_ratio_b_x96 - sqrt_ratio_a_x96, Q96)
    } else {
        mul_div(liquidity, sqrt_ratio_b_x96 - sqrt_ratio_a_x96, Q96)
    }
}

fn to_signed(amount: U256, negative: bool) -> Result<I256, MathError> {
    let amount = I256::try_from(amount).map_err(|_| MathError::Overflow)?;
    Ok(if negative { -amount } else { amount })
}

/// Signed token0 delta for a signed liquidity change. Added liquidity is
/// owed to the pool and rounds up; removed liquidity is owed by the pool,
/// rounds down and comes back negative.
pub fn get_amount_0_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: i128,
) -> Result<I256, Error> {
    let negative = liquidity < 0;
    let amount = get_amount_0_delta_base(
        sqrt_ratio_a_x96,
        sqrt_ratio_b_x96,
        liquidity.unsigned_abs(),
        !negative,
    )?;
    Ok(to_signed(amount, negative)?)
}

/// Signed token1 delta for a signed liquidity change, rounding in the
/// pool's favour like [`get_amount_0_delta`].
pub fn get_amount_1_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: i128,
) -> Result<I256, MathError> {
    let negative = liquidity < 0;
    let amount = get_amount_1_delta_base(
        sqrt_ratio_a_x96,
        sqrt_ratio_b_x96,
        liquidity.unsigned_abs(),
        !negative,
    )?;
    to_signed(amount, negative)
}

/// Computes the next sqrt price when swapping *into* the pool
/// (`amount_in`), choosing the correct branch for token0/token1
/// depending on `zero_for_one`. The price moves down for token0 input and
/// up for token1 input.
pub fn get_next_sqrt_price_from_input(
    sqrt_p_x96: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, Error> {
    if unlikely(sqrt_p_x96.is_zero()) {
        return Err(StateError::SqrtPriceIsZero.into());
    }
    if unlikely(liquidity == 0) {
        return Err(StateError::LiquidityIsZero.into());
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount_0_rounding_up(sqrt_p_x96, liquidity, amount_in, true)
    } else {
        get_next_sqrt_price_from_amount_1_rounding_down(sqrt_p_x96, liquidity, amount_in, true)
    }
}

/// Computes the next sqrt price when swapping *out of* the pool
/// (`amount_out`). Fails with `InsufficientReserves` when the output
/// cannot be sourced from `liquidity` without exhausting it.
pub fn get_next_sqrt_price_from_output(
    sqrt_p_x96: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256, Error> {
    if unlikely(sqrt_p_x96.is_zero()) {
        return Err(StateError::SqrtPriceIsZero.into());
    }
    if unlikely(liquidity == 0) {
        return Err(StateError::LiquidityIsZero.into());
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount_1_rounding_down(sqrt_p_x96, liquidity, amount_out, false)
    } else {
        get_next_sqrt_price_from_amount_0_rounding_up(sqrt_p_x96, liquidity, amount_out, false)
    }
}
