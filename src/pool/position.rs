use crate::Q128;
use crate::error::{Error, PoolError};
use crate::math::liquidity_math::add_delta;
use crate::math::math_helpers::mul_div;
use alloy_primitives::{Address, B256, U256, keccak256};
use serde::{Deserialize, Serialize};

/// Liquidity owned by one owner over one tick range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub liquidity: u128,
    /// Fee growth inside the range as of the last update.
    pub fee_growth_inside_0_last_x128: U256,
    pub fee_growth_inside_1_last_x128: U256,
    /// Fees and burned principal ready to be collected.
    pub tokens_owed_0: u128,
    pub tokens_owed_1: u128,
}

/// Ledger key for a position: keccak256 of the packed owner address and
/// both ticks as 24-bit big-endian integers.
pub fn position_key(owner: Address, tick_lower: i32, tick_upper: i32) -> B256 {
    let mut packed = [0u8; 26];
    packed[..20].copy_from_slice(owner.as_slice());
    packed[20..23].copy_from_slice(&tick_lower.to_be_bytes()[1..]);
    packed[23..].copy_from_slice(&tick_upper.to_be_bytes()[1..]);
    keccak256(packed)
}

/// Fees earned by `liquidity` for a given growth delta, truncated to
/// 128 bits. Overflow of the owed amount is accepted by contract: owners
/// must collect before it can happen.
fn fees_owed(growth_delta: U256, liquidity: u128) -> Result<u128, Error> {
    let fees = mul_div(growth_delta, U256::from(liquidity), Q128)?;
    Ok(fees.as_limbs()[0] as u128 | ((fees.as_limbs()[1] as u128) << 64))
}

impl Position {
    /// Returns the position after applying `liquidity_delta` and crediting
    /// fees accrued since the last update at the old liquidity.
    ///
    /// A zero delta is a poke, which only makes sense for a position that
    /// holds liquidity.
    pub fn update(
        &self,
        liquidity_delta: i128,
        fee_growth_inside_0_x128: U256,
        fee_growth_inside_1_x128: U256,
    ) -> Result<Position, Error> {
        let liquidity_next = if liquidity_delta == 0 {
            if self.liquidity == 0 {
                return Err(PoolError::EmptyPosition.into());
            }
            self.liquidity
        } else {
            add_delta(self.liquidity, liquidity_delta)?
        };

        let owed_0 = fees_owed(
            fee_growth_inside_0_x128.wrapping_sub(self.fee_growth_inside_0_last_x128),
            self.liquidity,
        )?;
        let owed_1 = fees_owed(
            fee_growth_inside_1_x128.wrapping_sub(self.fee_growth_inside_1_last_x128),
            self.liquidity,
        )?;

        Ok(Position {
            liquidity: liquidity_next,
            fee_growth_inside_0_last_x128: fee_growth_inside_0_x128,
            fee_growth_inside_1_last_x128: fee_growth_inside_1_x128,
            tokens_owed_0: self.tokens_owed_0.wrapping_add(owed_0),
            tokens_owed_1: self.tokens_owed_1.wrapping_add(owed_1),
        })
    }

    /// A position with nothing left to collect and no liquidity.
    pub fn is_empty(&self) -> bool {
        self.liquidity == 0 && self.tokens_owed_0 == 0 && self.tokens_owed_1 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, hex};

    #[test]
    fn key_matches_packed_encoding() {
        let owner = address!("0x1111111111111111111111111111111111111111");
        let mut expected = owner.to_vec();
        expected.extend_from_slice(&hex!("fffda8")); // -600 as int24
        expected.extend_from_slice(&hex!("000258")); // 600 as int24
        assert_eq!(position_key(owner, -600, 600), keccak256(&expected));
        assert_ne!(position_key(owner, -600, 600), position_key(owner, 600, -600));
    }

    #[test]
    fn poke_of_empty_position_fails() {
        let res = Position::default().update(0, U256::ZERO, U256::ZERO);
        assert_eq!(res, Err(Error::PoolError(PoolError::EmptyPosition)));
    }

    #[test]
    fn update_credits_fees_at_previous_liquidity() {
        let position = Position::default()
            .update(1_000, U256::ZERO, U256::ZERO)
            .unwrap();
        assert_eq!(position.liquidity, 1_000);
        assert_eq!(position.tokens_owed_0, 0);

        // 3 tokens per unit of liquidity for token0, 0.5 for token1
        let growth0 = Q128 * U256::from(3);
        let growth1 = Q128 >> 1usize;
        let position = position.update(-400, growth0, growth1).unwrap();
        assert_eq!(position.liquidity, 600);
        assert_eq!(position.tokens_owed_0, 3_000);
        assert_eq!(position.tokens_owed_1, 500);
        assert_eq!(position.fee_growth_inside_0_last_x128, growth0);

        // poke with no new growth changes nothing
        let poked = position.update(0, growth0, growth1).unwrap();
        assert_eq!(poked, position);
    }

    #[test]
    fn fee_growth_wrap_is_handled() {
        let start = U256::MAX - Q128 + U256::from(1);
        let position = Position {
            liquidity: 10,
            fee_growth_inside_0_last_x128: start,
            ..Position::default()
        };
        // growth wrapped past 2^256: delta is exactly 2 * Q128
        let position = position
            .update(0, start.wrapping_add(Q128 * U256::from(2)), U256::ZERO)
            .unwrap();
        assert_eq!(position.tokens_owed_0, 20);
    }

    #[test]
    fn removing_more_than_owned_fails() {
        let position = Position {
            liquidity: 5,
            ..Position::default()
        };
        assert!(position.update(-6, U256::ZERO, U256::ZERO).is_err());
        assert!(!position.is_empty());
    }
}
