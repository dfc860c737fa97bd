use crate::error::MathError;
use alloy_primitives::U256;

/// Index (0–255) of the most significant set bit of `x`.
///
/// Used by the tick bitmap when scanning a word towards lower ticks.
/// Fails with `MathError::ZeroValue` on zero, which has no set bit.
#[inline]
pub fn most_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok((255 - x.leading_zeros()) as u8)
}

/// Index (0–255) of the least significant set bit of `x`.
///
/// Used by the tick bitmap when scanning a word towards higher ticks.
#[inline]
pub fn least_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(x.trailing_zeros() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_errors_on_zero() {
        assert!(matches!(
            most_significant_bit(U256::ZERO),
            Err(MathError::ZeroValue)
        ));
    }

    #[test]
    fn msb_of_one_is_zero() {
        assert_eq!(most_significant_bit(U256::ONE).unwrap(), 0);
    }

    #[test]
    fn msb_of_every_power_of_two() {
        for i in 0..256usize {
            let x = U256::ONE << i;
            assert_eq!(most_significant_bit(x).unwrap() as usize, i);
        }
    }

    #[test]
    fn msb_ignores_lower_bits() {
        // binary: 1001_0100
        let x = U256::from(0b1001_0100u64);
        assert_eq!(most_significant_bit(x).unwrap(), 7);
        assert_eq!(most_significant_bit(U256::MAX).unwrap(), 255);
    }

    #[test]
    fn lsb_errors_on_zero() {
        assert!(matches!(
            least_significant_bit(U256::ZERO),
            Err(MathError::ZeroValue)
        ));
    }

    #[test]
    fn lsb_of_every_power_of_two() {
        for i in 0..256usize {
            let x = U256::ONE << i;
            assert_eq!(least_significant_bit(x).unwrap() as usize, i);
        }
    }

    #[test]
    fn lsb_ignores_higher_bits() {
        // binary: 10_1100_1000
        let x = U256::from(0b1011001000u64);
        assert_eq!(least_significant_bit(x).unwrap(), 3);
        assert_eq!(least_significant_bit(U256::MAX).unwrap(), 0);
    }
}
