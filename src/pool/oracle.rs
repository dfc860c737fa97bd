use crate::error::PoolError;
use alloy_primitives::{U160, U256};
use serde::{Deserialize, Serialize};

/// Upper bound on the number of stored observations.
pub const MAX_CARDINALITY: u16 = u16::MAX;

/// One point of the price/liquidity accumulator history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub block_timestamp: u32,
    /// Σ tick · seconds since the pool was initialized.
    pub tick_cumulative: i64,
    /// Σ seconds / max(1, liquidity), Q128.128 truncated to 160 bits.
    pub seconds_per_liquidity_cumulative_x128: U160,
    pub initialized: bool,
}

impl Observation {
    /// Extends `self` to `block_timestamp` assuming `tick` and `liquidity`
    /// held for the whole elapsed time. Both accumulators wrap.
    pub fn transform(&self, block_timestamp: u32, tick: i32, liquidity: u128) -> Observation {
        let delta = block_timestamp.wrapping_sub(self.block_timestamp);
        let seconds_x128 = U160::from(delta) << 128usize;
        Observation {
            block_timestamp,
            tick_cumulative: self
                .tick_cumulative
                .wrapping_add(i64::from(tick) * i64::from(delta)),
            seconds_per_liquidity_cumulative_x128: self
                .seconds_per_liquidity_cumulative_x128
                .wrapping_add(seconds_x128 / U160::from(liquidity.max(1))),
            initialized: true,
        }
    }
}

/// `a <= b` for timestamps that may have wrapped past `u32::MAX`, given
/// that both are at most one wrap older than `time`.
#[inline]
fn lte(time: u32, a: u32, b: u32) -> bool {
    if a <= time && b <= time {
        return a <= b;
    }
    let adjust = |t: u32| {
        if t > time {
            u64::from(t)
        } else {
            u64::from(t) + (1 << 32)
        }
    };
    adjust(a) <= adjust(b)
}

/// Ring buffer of observations.
///
/// Only the first `cardinality` slots are part of the ring; the pool's
/// slot0 owns `index`, `cardinality` and `cardinality_next`, this type just
/// stores slots and implements the arithmetic over them. Slots are
/// allocated lazily by [`Observations::grow`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observations {
    slots: Vec<Observation>,
}

impl Observations {
    /// Slot `index`, or an empty observation if it was never allocated.
    pub fn get(&self, index: u16) -> Observation {
        self.slots
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    fn set(&mut self, index: u16, observation: Observation) {
        let index = index as usize;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, Observation::default());
        }
        self.slots[index] = observation;
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Seeds the first slot. Returns `(cardinality, cardinality_next)`.
    pub fn initialize(&mut self, time: u32) -> (u16, u16) {
        self.set(
            0,
            Observation {
                block_timestamp: time,
                initialized: true,
                ..Observation::default()
            },
        );
        (1, 1)
    }

    /// Records a new observation after `index`, at most once per timestamp.
    ///
    /// The ring grows into `cardinality_next` only once the write reaches the
    /// last slot of the current ring, so the oldest data is kept for as long
    /// as possible. Returns the new `(index, cardinality)`.
    pub fn write(
        &mut self,
        index: u16,
        block_timestamp: u32,
        tick: i32,
        liquidity: u128,
        cardinality: u16,
        cardinality_next: u16,
    ) -> (u16, u16) {
        let last = self.get(index);
        if last.block_timestamp == block_timestamp {
            return (index, cardinality);
        }

        let cardinality_updated = if cardinality_next > cardinality && index == cardinality - 1 {
            cardinality_next
        } else {
            cardinality
        };

        let index_updated = ((u32::from(index) + 1) % u32::from(cardinality_updated)) as u16;
        self.set(
            index_updated,
            last.transform(block_timestamp, tick, liquidity),
        );
        (index_updated, cardinality_updated)
    }

    /// Allocates slots up to `next`. Returns the new `cardinality_next`.
    ///
    /// New slots get a non-zero timestamp so the first real write into them
    /// is not mistaken for a same-block write.
    pub fn grow(&mut self, current: u16, next: u16) -> Result<u16, PoolError> {
        if current == 0 {
            return Err(PoolError::OracleCardinalityCannotBeZero);
        }
        if next <= current {
            return Ok(current);
        }
        for i in current..next {
            if (i as usize) >= self.slots.len() || !self.slots[i as usize].initialized {
                self.set(
                    i,
                    Observation {
                        block_timestamp: 1,
                        ..Observation::default()
                    },
                );
            }
        }
        Ok(next)
    }

    /// Finds the initialized observations bracketing `target`, assuming
    /// it lies between the oldest and the newest ones.
    fn binary_search(
        &self,
        time: u32,
        target: u32,
        index: u16,
        cardinality: u16,
    ) -> Result<(Observation, Observation), PoolError> {
        let cardinality = usize::from(cardinality);
        // oldest
        let mut l = (usize::from(index) + 1) % cardinality;
        // newest
        let mut r = l + cardinality - 1;

        while l <= r {
            let i = (l + r) / 2;
            let before_or_at = self.get((i % cardinality) as u16);

            // uninitialized slots sit past the newest write; search right
            if !before_or_at.initialized {
                l = i + 1;
                continue;
            }

            let at_or_after = self.get(((i + 1) % cardinality) as u16);
            let target_at_or_after = lte(time, before_or_at.block_timestamp, target);

            if target_at_or_after && lte(time, target, at_or_after.block_timestamp) {
                return Ok((before_or_at, at_or_after));
            }

            if !target_at_or_after {
                match i.checked_sub(1) {
                    Some(next_r) => r = next_r,
                    None => break,
                }
            } else {
                l = i + 1;
            }
        }
        Err(PoolError::OracleTargetTooOld)
    }

    fn get_surrounding_observations(
        &self,
        time: u32,
        target: u32,
        tick: i32,
        index: u16,
        liquidity: u128,
        cardinality: u16,
    ) -> Result<(Observation, Observation), PoolError> {
        let newest = self.get(index);

        if lte(time, newest.block_timestamp, target) {
            if newest.block_timestamp == target {
                return Ok((newest, Observation::default()));
            }
            return Ok((newest, newest.transform(target, tick, liquidity)));
        }

        let mut oldest = self.get(((u32::from(index) + 1) % u32::from(cardinality)) as u16);
        if !oldest.initialized {
            oldest = self.get(0);
        }

        if !lte(time, oldest.block_timestamp, target) {
            return Err(PoolError::OracleTargetTooOld);
        }

        self.binary_search(time, target, index, cardinality)
    }

    /// Accumulator values `seconds_ago` seconds before `time`, interpolated
    /// between the surrounding observations when the target falls between
    /// two of them.
    pub fn observe_single(
        &self,
        time: u32,
        seconds_ago: u32,
        tick: i32,
        index: u16,
        liquidity: u128,
        cardinality: u16,
    ) -> Result<(i64, U160), PoolError> {
        if cardinality == 0 {
            return Err(PoolError::OracleCardinalityCannotBeZero);
        }

        if seconds_ago == 0 {
            let mut last = self.get(index);
            if last.block_timestamp != time {
                last = last.transform(time, tick, liquidity);
            }
            return Ok((
                last.tick_cumulative,
                last.seconds_per_liquidity_cumulative_x128,
            ));
        }

        let target = time.wrapping_sub(seconds_ago);
        let (before_or_at, at_or_after) =
            self.get_surrounding_observations(time, target, tick, index, liquidity, cardinality)?;

        if target == before_or_at.block_timestamp {
            Ok((
                before_or_at.tick_cumulative,
                before_or_at.seconds_per_liquidity_cumulative_x128,
            ))
        } else if target == at_or_after.block_timestamp {
            Ok((
                at_or_after.tick_cumulative,
                at_or_after.seconds_per_liquidity_cumulative_x128,
            ))
        } else {
            let observation_time_delta =
                at_or_after.block_timestamp.wrapping_sub(before_or_at.block_timestamp);
            let target_delta = target.wrapping_sub(before_or_at.block_timestamp);

            let tick_cumulative = before_or_at.tick_cumulative.wrapping_add(
                (at_or_after.tick_cumulative.wrapping_sub(before_or_at.tick_cumulative)
                    / i64::from(observation_time_delta))
                    * i64::from(target_delta),
            );

            let spl_delta = U256::from(
                at_or_after
                    .seconds_per_liquidity_cumulative_x128
                    .wrapping_sub(before_or_at.seconds_per_liquidity_cumulative_x128),
            );
            let spl_interpolated =
                spl_delta * U256::from(target_delta) / U256::from(observation_time_delta);
            let seconds_per_liquidity = before_or_at
                .seconds_per_liquidity_cumulative_x128
                .wrapping_add(U160::wrapping_from(spl_interpolated));

            Ok((tick_cumulative, seconds_per_liquidity))
        }
    }

    /// [`Observations::observe_single`] for each entry of `seconds_agos`.
    pub fn observe(
        &self,
        time: u32,
        seconds_agos: &[u32],
        tick: i32,
        index: u16,
        liquidity: u128,
        cardinality: u16,
    ) -> Result<(Vec<i64>, Vec<U160>), PoolError> {
        if cardinality == 0 {
            return Err(PoolError::OracleCardinalityCannotBeZero);
        }

        let mut tick_cumulatives = Vec::with_capacity(seconds_agos.len());
        let mut seconds_per_liquidity = Vec::with_capacity(seconds_agos.len());
        for &seconds_ago in seconds_agos {
            let (tc, spl) =
                self.observe_single(time, seconds_ago, tick, index, liquidity, cardinality)?;
            tick_cumulatives.push(tc);
            seconds_per_liquidity.push(spl);
        }
        Ok((tick_cumulatives, seconds_per_liquidity))
    }
}
