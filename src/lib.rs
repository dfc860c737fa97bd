//! Uniswap V3–style concentrated liquidity pool engine in pure Rust.
//!
//! This crate exposes:
//! - Low‑level math primitives (`math::*`) for ticks, prices, bitmaps,
//!   liquidity deltas and single swap steps.
//! - A stateful `V3Pool` engine that owns the tick ledger, positions,
//!   fee growth accumulators and the price oracle, and implements
//!   initialize / mint / burn / collect / swap / flash and admin calls.
//! - Collaborator traits (`pool::callback`) through which the pool pulls
//!   payments and moves tokens, plus an in‑memory `MemoryHost`.
//!
//! # Examples
//!
//! ## Pure math
//! ```no_run
//! use clmm_pool_engine::{math::tick_math, RESOLUTION, U256};
//!
//! let sqrt_price = tick_math::get_sqrt_ratio_at_tick(0).unwrap();
//! assert!(sqrt_price > U256::ZERO);
//! assert_eq!(RESOLUTION, 96);
//! ```
//!
//! ## Minting and swapping against a pool
//! ```no_run
//! use clmm_pool_engine::{
//!     config::{FeeTier, PoolConfig},
//!     pool::callback::{MemoryHost, PayingCallback},
//!     pool::liquidity::MintParams,
//!     pool::swap::SwapParams,
//!     math::tick_math::MIN_SQRT_RATIO,
//!     Address, V3Pool, I256, U256, Q96,
//! };
//!
//! let token0 = Address::repeat_byte(0x01);
//! let token1 = Address::repeat_byte(0x02);
//! let config = PoolConfig::from_fee_tier(
//!     Address::repeat_byte(0xfa),
//!     Address::repeat_byte(0x0a),
//!     token0,
//!     token1,
//!     FeeTier::Medium,
//! );
//! let mut pool = V3Pool::new(Address::repeat_byte(0xaa), config).unwrap();
//! let mut host = MemoryHost::new(1_000);
//! pool.initialize(Q96, host.block_timestamp).unwrap();
//!
//! let lp = Address::repeat_byte(0x11);
//! host.mint_tokens(token0, lp, U256::from(10u128.pow(24)));
//! host.mint_tokens(token1, lp, U256::from(10u128.pow(24)));
//! let mut payer = PayingCallback::new(lp);
//!
//! pool.mint(
//!     &mut host,
//!     MintParams::new(lp, -600, 600, 10u128.pow(18)),
//!     &mut payer,
//!     &[],
//! )
//! .unwrap();
//!
//! let params = SwapParams::new(
//!     lp,
//!     true,
//!     I256::from_raw(U256::from(10u128.pow(15))),
//!     MIN_SQRT_RATIO + U256::ONE,
//! );
//! let result = pool.swap(&mut host, params, &mut payer, &[]).unwrap();
//! println!("amount0: {}, amount1: {}", result.amount0_delta, result.amount1_delta);
//! ```

pub use alloy_primitives::{Address, B256, I256, U160, U256};

pub mod config;
pub mod error;
mod hash;
pub mod math;

pub use hash::FastMap;

pub mod pool;

pub use pool::v3_pool::V3Pool;

const U256_1: U256 = U256::from_limbs([1, 0, 0, 0]);

const U160_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, u32::MAX as u64, 0]);
const U256_E6: U256 = U256::from_limbs([1000000, 0, 0, 0]);

pub const RESOLUTION: u8 = 96;
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);
