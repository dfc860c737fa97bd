use crate::FastMap;
use crate::config::PoolConfig;
use crate::error::{Error, PoolError};
use crate::math::tick_bitmap;
use crate::math::tick_math::{
    MAX_TICK, MIN_TICK, get_tick_at_sqrt_ratio, tick_spacing_to_max_liquidity_per_tick,
};
use crate::pool::callback::{Host, atomically};
use crate::pool::oracle::{Observation, Observations};
use crate::pool::position::{Position, position_key};
use crate::pool::tick::TickInfo;
use alloy_primitives::{Address, B256, I256, U160, U256};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use tracing::instrument;

/// Pool header: price, oracle cursor, protocol fee shares and the lock.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    /// Most recently written observation.
    pub observation_index: u16,
    /// Number of observations in the ring.
    pub observation_cardinality: u16,
    /// Ring size to grow into on the next write at the end of the ring.
    pub observation_cardinality_next: u16,
    /// Protocol share denominators: token0 in the low nibble, token1 in the
    /// high one. 0 disables the protocol fee for that token.
    pub fee_protocol: u8,
    pub unlocked: bool,
}

/// Protocol fees accrued and not yet collected.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolFees {
    pub token0: u128,
    pub token1: u128,
}

/// Observable state transitions, logged at debug level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    Initialize {
        sqrt_price_x96: U256,
        tick: i32,
    },
    Mint {
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        amount0: U256,
        amount1: U256,
    },
    Burn {
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        amount0: U256,
        amount1: U256,
    },
    Collect {
        owner: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0: u128,
        amount1: u128,
    },
    Swap {
        recipient: Address,
        amount0: I256,
        amount1: I256,
        sqrt_price_x96: U256,
        liquidity: u128,
        tick: i32,
    },
    Flash {
        recipient: Address,
        amount0: U256,
        amount1: U256,
        paid0: U256,
        paid1: U256,
    },
    IncreaseObservationCardinalityNext {
        old: u16,
        new: u16,
    },
    SetFeeProtocol {
        old0: u8,
        old1: u8,
        new0: u8,
        new1: u8,
    },
    CollectProtocol {
        recipient: Address,
        amount0: u128,
        amount1: u128,
    },
    OwnerChanged {
        old: Address,
        new: Address,
    },
}

/// In-memory concentrated liquidity pool.
///
/// Owns the tick ledger and bitmap, the position ledger, the global fee
/// accumulators and the oracle ring. Mutating entry points hold the slot0
/// lock through an RAII guard for their whole duration, so a callback that calls
/// back into the pool gets `PoolError::Locked`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct V3Pool {
    pub(crate) pool_address: Address,
    pub(crate) config: PoolConfig,
    pub(crate) max_liquidity_per_tick: u128,
    pub(crate) slot0: Slot0,
    pub(crate) fee_growth_global_0_x128: U256,
    pub(crate) fee_growth_global_1_x128: U256,
    pub(crate) protocol_fees: ProtocolFees,
    pub(crate) liquidity: u128,
    pub(crate) ticks: FastMap<i32, TickInfo>,
    pub(crate) bitmap: FastMap<i16, U256>,
    pub(crate) positions: FastMap<B256, Position>,
    pub(crate) observations: Observations,
}

/// Exclusive access to an initialized, unlocked pool. The lock is released
/// when the guard is dropped, whichever way the operation exits.
pub(crate) struct PoolLock<'a> {
    pool: &'a mut V3Pool,
}

impl<'a> PoolLock<'a> {
    pub(crate) fn acquire(pool: &'a mut V3Pool) -> Result<Self, PoolError> {
        if pool.slot0.sqrt_price_x96.is_zero() {
            return Err(PoolError::NotInitialized);
        }
        if !pool.slot0.unlocked {
            return Err(PoolError::Locked);
        }
        pool.slot0.unlocked = false;
        Ok(Self { pool })
    }
}

impl Deref for PoolLock<'_> {
    type Target = V3Pool;

    fn deref(&self) -> &V3Pool {
        self.pool
    }
}

impl DerefMut for PoolLock<'_> {
    fn deref_mut(&mut self) -> &mut V3Pool {
        self.pool
    }
}

impl Drop for PoolLock<'_> {
    fn drop(&mut self) {
        self.pool.slot0.unlocked = true;
    }
}

/// Validates a position range: ordered, inside the tick domain and aligned
/// to the spacing.
pub(crate) fn check_ticks(
    tick_lower: i32,
    tick_upper: i32,
    tick_spacing: i32,
) -> Result<(), PoolError> {
    if tick_lower >= tick_upper
        || tick_lower < MIN_TICK
        || tick_upper > MAX_TICK
        || tick_lower % tick_spacing != 0
        || tick_upper % tick_spacing != 0
    {
        return Err(PoolError::InvalidTick);
    }
    Ok(())
}

/// Allowed non-zero protocol fee shares.
const MIN_FEE_PROTOCOL: u8 = 4;
const MAX_FEE_PROTOCOL: u8 = 10;

fn valid_fee_protocol(share: u8) -> bool {
    share == 0 || (MIN_FEE_PROTOCOL..=MAX_FEE_PROTOCOL).contains(&share)
}

impl V3Pool {
    /// Creates an uninitialized pool. It rejects every operation but
    /// [`V3Pool::initialize`] until a price is set. Fails with
    /// `InvalidTickSpacing` unless the spacing lies in `1..=MAX_TICK`.
    pub fn new(pool_address: Address, config: PoolConfig) -> Result<Self, Error> {
        let config = config.canonical();
        let max_liquidity_per_tick = tick_spacing_to_max_liquidity_per_tick(config.tick_spacing)?;
        Ok(Self {
            pool_address,
            max_liquidity_per_tick,
            config,
            slot0: Slot0::default(),
            fee_growth_global_0_x128: U256::ZERO,
            fee_growth_global_1_x128: U256::ZERO,
            protocol_fees: ProtocolFees::default(),
            liquidity: 0u128,
            ticks: FastMap::default(),
            bitmap: FastMap::default(),
            positions: FastMap::default(),
            observations: Observations::default(),
        })
    }

    pub(crate) fn emit(&self, event: PoolEvent) {
        tracing::debug!(
            ?event,
            address = ?self.pool_address,
            sqrt_price = ?self.slot0.sqrt_price_x96,
            liquidity = ?self.liquidity,
            tick = ?self.slot0.tick,
            "pool event"
        );
    }

    /// Sets the starting price and seeds the oracle. Unlocks the pool.
    #[instrument(skip(self), fields(pool = ?self.pool_address), level = "debug")]
    pub fn initialize(&mut self, sqrt_price_x96: U256, time: u32) -> Result<(), Error> {
        if !self.slot0.sqrt_price_x96.is_zero() {
            return Err(PoolError::AlreadyInitialized.into());
        }

        let tick = get_tick_at_sqrt_ratio(sqrt_price_x96)?;
        let (cardinality, cardinality_next) = self.observations.initialize(time);

        self.slot0 = Slot0 {
            sqrt_price_x96,
            tick,
            observation_index: 0,
            observation_cardinality: cardinality,
            observation_cardinality_next: cardinality_next,
            fee_protocol: 0,
            unlocked: true,
        };

        self.emit(PoolEvent::Initialize {
            sqrt_price_x96,
            tick,
        });
        Ok(())
    }

    /// Grows the oracle ring so that it can eventually hold
    /// `observation_cardinality_next` observations.
    #[instrument(skip(self), fields(pool = ?self.pool_address), level = "debug")]
    pub fn increase_observation_cardinality_next(
        &mut self,
        observation_cardinality_next: u16,
    ) -> Result<(), Error> {
        let mut pool = PoolLock::acquire(self)?;
        let old = pool.slot0.observation_cardinality_next;
        let new = pool.observations.grow(old, observation_cardinality_next)?;
        pool.slot0.observation_cardinality_next = new;
        if old != new {
            pool.emit(PoolEvent::IncreaseObservationCardinalityNext { old, new });
        }
        Ok(())
    }

    /// Cumulative tick and seconds-per-liquidity values as of each
    /// `seconds_ago` before `time`.
    pub fn observe(
        &self,
        time: u32,
        seconds_agos: &[u32],
    ) -> Result<(Vec<i64>, Vec<U160>), Error> {
        Ok(self.observations.observe(
            time,
            seconds_agos,
            self.slot0.tick,
            self.slot0.observation_index,
            self.liquidity,
            self.slot0.observation_cardinality,
        )?)
    }

    /// Tick-cumulative, seconds-per-liquidity and seconds accrued while the
    /// price was inside `[tick_lower, tick_upper)`.
    ///
    /// Only differences between two snapshots of the same range mean
    /// anything, and only if the range stayed initialized in between.
    pub fn snapshot_cumulatives_inside(
        &self,
        time: u32,
        tick_lower: i32,
        tick_upper: i32,
    ) -> Result<(i64, U160, u32), Error> {
        check_ticks(tick_lower, tick_upper, self.config.tick_spacing)?;

        let (lower, upper) = match (self.ticks.get(&tick_lower), self.ticks.get(&tick_upper)) {
            (Some(lower), Some(upper)) if lower.initialized && upper.initialized => (lower, upper),
            _ => return Err(PoolError::TickNotInitialized.into()),
        };

        let tick = self.slot0.tick;
        if tick < tick_lower {
            Ok((
                lower
                    .tick_cumulative_outside
                    .wrapping_sub(upper.tick_cumulative_outside),
                lower
                    .seconds_per_liquidity_outside_x128
                    .wrapping_sub(upper.seconds_per_liquidity_outside_x128),
                lower.seconds_outside.wrapping_sub(upper.seconds_outside),
            ))
        } else if tick < tick_upper {
            let (tick_cumulative, seconds_per_liquidity) = self.observations.observe_single(
                time,
                0,
                tick,
                self.slot0.observation_index,
                self.liquidity,
                self.slot0.observation_cardinality,
            )?;
            Ok((
                tick_cumulative
                    .wrapping_sub(lower.tick_cumulative_outside)
                    .wrapping_sub(upper.tick_cumulative_outside),
                seconds_per_liquidity
                    .wrapping_sub(lower.seconds_per_liquidity_outside_x128)
                    .wrapping_sub(upper.seconds_per_liquidity_outside_x128),
                time.wrapping_sub(lower.seconds_outside)
                    .wrapping_sub(upper.seconds_outside),
            ))
        } else {
            Ok((
                upper
                    .tick_cumulative_outside
                    .wrapping_sub(lower.tick_cumulative_outside),
                upper
                    .seconds_per_liquidity_outside_x128
                    .wrapping_sub(lower.seconds_per_liquidity_outside_x128),
                upper.seconds_outside.wrapping_sub(lower.seconds_outside),
            ))
        }
    }

    /// Sets the protocol's share of swap fees to `1 / fee_protocol` per
    /// token. Owner only.
    #[instrument(skip(self), fields(pool = ?self.pool_address), level = "debug")]
    pub fn set_fee_protocol(
        &mut self,
        caller: Address,
        fee_protocol0: u8,
        fee_protocol1: u8,
    ) -> Result<(), Error> {
        let mut pool = PoolLock::acquire(self)?;
        if caller != pool.config.owner {
            return Err(PoolError::NotOwner.into());
        }
        if !valid_fee_protocol(fee_protocol0) || !valid_fee_protocol(fee_protocol1) {
            return Err(PoolError::InvalidFeeProtocol.into());
        }

        let old = pool.slot0.fee_protocol;
        pool.slot0.fee_protocol = fee_protocol0 + (fee_protocol1 << 4);
        pool.emit(PoolEvent::SetFeeProtocol {
            old0: old % 16,
            old1: old >> 4,
            new0: fee_protocol0,
            new1: fee_protocol1,
        });
        Ok(())
    }

    /// Sends up to the requested protocol fees to `recipient`. Owner only.
    #[instrument(skip(self, host), fields(pool = ?self.pool_address), level = "debug")]
    pub fn collect_protocol(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        recipient: Address,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        atomically(host, |host| {
            self.execute_collect_protocol(host, caller, recipient, amount0_requested, amount1_requested)
        })
    }

    fn execute_collect_protocol(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        recipient: Address,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        let mut pool = PoolLock::acquire(self)?;
        if caller != pool.config.owner {
            return Err(PoolError::NotOwner.into());
        }

        let amount0 = amount0_requested.min(pool.protocol_fees.token0);
        let amount1 = amount1_requested.min(pool.protocol_fees.token1);

        host.transfer(pool.config.token0, pool.pool_address, recipient, U256::from(amount0))?;
        host.transfer(pool.config.token1, pool.pool_address, recipient, U256::from(amount1))?;

        pool.protocol_fees.token0 -= amount0;
        pool.protocol_fees.token1 -= amount1;

        pool.emit(PoolEvent::CollectProtocol {
            recipient,
            amount0,
            amount1,
        });
        Ok((amount0, amount1))
    }

    /// Hands protocol ownership over to `new_owner`. Owner only.
    pub fn set_owner(&mut self, caller: Address, new_owner: Address) -> Result<(), Error> {
        if caller != self.config.owner {
            return Err(PoolError::NotOwner.into());
        }
        let old = self.config.owner;
        self.config.owner = new_owner;
        self.emit(PoolEvent::OwnerChanged {
            old,
            new: new_owner,
        });
        Ok(())
    }

    pub fn address(&self) -> Address {
        self.pool_address
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn token0(&self) -> Address {
        self.config.token0
    }

    pub fn token1(&self) -> Address {
        self.config.token1
    }

    pub fn fee(&self) -> u32 {
        self.config.fee
    }

    pub fn tick_spacing(&self) -> i32 {
        self.config.tick_spacing
    }

    pub fn owner(&self) -> Address {
        self.config.owner
    }

    pub fn max_liquidity_per_tick(&self) -> u128 {
        self.max_liquidity_per_tick
    }

    pub fn slot0(&self) -> Slot0 {
        self.slot0
    }

    /// Liquidity active at the current price.
    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    pub fn fee_growth_global_0_x128(&self) -> U256 {
        self.fee_growth_global_0_x128
    }

    pub fn fee_growth_global_1_x128(&self) -> U256 {
        self.fee_growth_global_1_x128
    }

    pub fn protocol_fees(&self) -> ProtocolFees {
        self.protocol_fees
    }

    pub fn tick(&self, tick: i32) -> Option<&TickInfo> {
        self.ticks.get(&tick)
    }

    /// All ticks currently referenced by a position.
    pub fn ticks(&self) -> impl Iterator<Item = (i32, &TickInfo)> {
        self.ticks.iter().map(|(tick, info)| (*tick, info))
    }

    /// Net liquidity change when crossing `tick` left to right, if any
    /// position references it.
    pub fn get_liquidity_net(&self, tick: i32) -> Option<i128> {
        self.ticks.get(&tick).map(|tick_info| tick_info.liquidity_net)
    }

    pub fn is_tick_initialized(&self, tick: i32) -> bool {
        tick_bitmap::is_initialized(&self.bitmap, tick, self.config.tick_spacing)
    }

    pub fn bitmap_word(&self, word: i16) -> U256 {
        tick_bitmap::get_word(&self.bitmap, word)
    }

    pub fn position(&self, owner: Address, tick_lower: i32, tick_upper: i32) -> Position {
        self.positions
            .get(&position_key(owner, tick_lower, tick_upper))
            .copied()
            .unwrap_or_default()
    }

    pub fn observation(&self, index: u16) -> Observation {
        self.observations.get(index)
    }
}
