//! Construction parameters for a pool.
//!
//! A `PoolConfig` carries everything a factory fixes at deployment time.
//! Both types derive serde so hosts can keep pool parameters in JSON/TOML.

use alloy_primitives::{Address, U160};
use serde::{Deserialize, Serialize};

/// Standard fee tiers and the tick spacing each one is deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    /// 0.05%
    Low,
    /// 0.3%
    Medium,
    /// 1%
    High,
}

impl FeeTier {
    pub const ALL: [FeeTier; 3] = [FeeTier::Low, FeeTier::Medium, FeeTier::High];

    /// Swap fee in pips (hundredths of a basis point).
    #[inline]
    pub const fn fee(self) -> u32 {
        match self {
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10000,
        }
    }

    #[inline]
    pub const fn tick_spacing(self) -> i32 {
        match self {
            FeeTier::Low => 10,
            FeeTier::Medium => 60,
            FeeTier::High => 200,
        }
    }

    /// Looks up the tier for a fee in pips, if it is one of the standard ones.
    pub fn from_fee(fee: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.fee() == fee)
    }
}

/// Compares addresses by numeric value.
#[inline(always)]
pub fn address_to_u160(address: Address) -> U160 {
    address.into()
}

/// Returns the token pair in canonical `(token0, token1)` order, lowest
/// address first.
pub fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if address_to_u160(token_a) < address_to_u160(token_b) {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

/// Immutable parameters of a pool, fixed when it is created.
///
/// `owner` is the protocol owner allowed to set and collect protocol fees.
/// The engine trusts `tick_spacing`; pairing it with `fee` is the
/// factory's job (see [`FeeTier`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub factory: Address,
    pub owner: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_spacing: i32,
}

impl PoolConfig {
    /// Builds a config with tokens sorted into canonical order.
    pub fn new(
        factory: Address,
        owner: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
        tick_spacing: i32,
    ) -> Self {
        let (token0, token1) = sort_tokens(token_a, token_b);
        Self {
            factory,
            owner,
            token0,
            token1,
            fee,
            tick_spacing,
        }
    }

    pub fn from_fee_tier(
        factory: Address,
        owner: Address,
        token_a: Address,
        token_b: Address,
        tier: FeeTier,
    ) -> Self {
        Self::new(
            factory,
            owner,
            token_a,
            token_b,
            tier.fee(),
            tier.tick_spacing(),
        )
    }

    /// Returns the same config with tokens put back in canonical order.
    ///
    /// Useful after deserializing a hand-written file.
    pub fn canonical(self) -> Self {
        let (token0, token1) = sort_tokens(self.token0, self.token1);
        Self {
            token0,
            token1,
            ..self
        }
    }
}
