use crate::error::{Error, MathError};
use crate::math::liquidity_math::add_delta;
use alloy_primitives::{U160, U256};
use serde::{Deserialize, Serialize};

/// Per-tick ledger entry.
///
/// The "outside" accumulators are relative to the current tick: they hold
/// the growth on the side of the tick opposite to the price, and are
/// flipped every time the price crosses it. Only differences between them
/// are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    /// Total position liquidity referencing this tick.
    pub liquidity_gross: u128,
    /// Liquidity added when crossed left to right, removed right to left.
    pub liquidity_net: i128,
    pub fee_growth_outside_0_x128: U256,
    pub fee_growth_outside_1_x128: U256,
    pub tick_cumulative_outside: i64,
    pub seconds_per_liquidity_outside_x128: U160,
    pub seconds_outside: u32,
    pub initialized: bool,
}

/// Global accumulator values at the moment a tick is touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthSnapshot {
    pub fee_growth_global_0_x128: U256,
    pub fee_growth_global_1_x128: U256,
    pub seconds_per_liquidity_cumulative_x128: U160,
    pub tick_cumulative: i64,
    pub time: u32,
}

impl TickInfo {
    /// Returns the tick after applying `liquidity_delta` from a position
    /// bounded by it, and whether it flipped between initialized and not.
    ///
    /// A tick at or below `tick_current` that is being initialized assumes
    /// all growth so far happened below it.
    pub fn update(
        &self,
        tick: i32,
        tick_current: i32,
        liquidity_delta: i128,
        growth: &GrowthSnapshot,
        upper: bool,
        max_liquidity: u128,
    ) -> Result<(TickInfo, bool), Error> {
        let mut info = *self;
        let liquidity_gross_before = info.liquidity_gross;
        let liquidity_gross_after = add_delta(liquidity_gross_before, liquidity_delta)?;

        if liquidity_gross_after > max_liquidity {
            return Err(MathError::LiquidityOverflow.into());
        }

        let flipped = (liquidity_gross_after == 0) != (liquidity_gross_before == 0);

        if liquidity_gross_before == 0 {
            if tick <= tick_current {
                info.fee_growth_outside_0_x128 = growth.fee_growth_global_0_x128;
                info.fee_growth_outside_1_x128 = growth.fee_growth_global_1_x128;
                info.seconds_per_liquidity_outside_x128 =
                    growth.seconds_per_liquidity_cumulative_x128;
                info.tick_cumulative_outside = growth.tick_cumulative;
                info.seconds_outside = growth.time;
            }
            info.initialized = true;
        }

        info.liquidity_gross = liquidity_gross_after;

        // upper ticks subtract on the way right, lower ticks add
        info.liquidity_net = if upper {
            info.liquidity_net.checked_sub(liquidity_delta)
        } else {
            info.liquidity_net.checked_add(liquidity_delta)
        }
        .ok_or(MathError::LiquidityOverflow)?;

        Ok((info, flipped))
    }

    /// Returns the tick after the price crosses it: every outside
    /// accumulator becomes `global - outside`.
    pub fn cross(&self, growth: &GrowthSnapshot) -> TickInfo {
        TickInfo {
            fee_growth_outside_0_x128: growth
                .fee_growth_global_0_x128
                .wrapping_sub(self.fee_growth_outside_0_x128),
            fee_growth_outside_1_x128: growth
                .fee_growth_global_1_x128
                .wrapping_sub(self.fee_growth_outside_1_x128),
            seconds_per_liquidity_outside_x128: growth
                .seconds_per_liquidity_cumulative_x128
                .wrapping_sub(self.seconds_per_liquidity_outside_x128),
            tick_cumulative_outside: growth
                .tick_cumulative
                .wrapping_sub(self.tick_cumulative_outside),
            seconds_outside: growth.time.wrapping_sub(self.seconds_outside),
            ..*self
        }
    }
}

/// Fee growth per unit of liquidity accrued strictly inside
/// `[tick_lower, tick_upper)`, as `(token0, token1)`. Wraps like the
/// global accumulators.
pub fn get_fee_growth_inside(
    lower: &TickInfo,
    upper: &TickInfo,
    tick_lower: i32,
    tick_upper: i32,
    tick_current: i32,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
) -> (U256, U256) {
    let (below_0, below_1) = if tick_current >= tick_lower {
        (lower.fee_growth_outside_0_x128, lower.fee_growth_outside_1_x128)
    } else {
        (
            fee_growth_global_0_x128.wrapping_sub(lower.fee_growth_outside_0_x128),
            fee_growth_global_1_x128.wrapping_sub(lower.fee_growth_outside_1_x128),
        )
    };

    let (above_0, above_1) = if tick_current < tick_upper {
        (upper.fee_growth_outside_0_x128, upper.fee_growth_outside_1_x128)
    } else {
        (
            fee_growth_global_0_x128.wrapping_sub(upper.fee_growth_outside_0_x128),
            fee_growth_global_1_x128.wrapping_sub(upper.fee_growth_outside_1_x128),
        )
    };

    (
        fee_growth_global_0_x128
            .wrapping_sub(below_0)
            .wrapping_sub(above_0),
        fee_growth_global_1_x128
            .wrapping_sub(below_1)
            .wrapping_sub(above_1),
    )
}
