use crate::error::MathError;

/// Applies a signed liquidity delta to an unsigned liquidity amount.
///
/// Fails with `LiquidityUnderflow` when removing more than `x` and with
/// `LiquidityOverflow` when the sum exceeds `u128::MAX`.
#[inline]
pub fn add_delta(x: u128, y: i128) -> Result<u128, MathError> {
    if y < 0 {
        let (z, underflow) = x.overflowing_sub(y.unsigned_abs());
        if underflow {
            return Err(MathError::LiquidityUnderflow);
        }
        Ok(z)
    } else {
        let (z, overflow) = x.overflowing_add(y as u128);
        if overflow {
            return Err(MathError::LiquidityOverflow);
        }
        Ok(z)
    }
}
