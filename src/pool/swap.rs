use crate::Q128;
use crate::error::{Error, MathError, PoolError};
use crate::math::liquidity_math::add_delta;
use crate::math::math_helpers::{mul_div, unlikely};
use crate::math::swap_math::compute_swap_step;
use crate::math::tick_bitmap::next_initialized_tick_within_one_word;
use crate::math::tick_math::{
    MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, get_sqrt_ratio_at_tick,
    get_tick_at_sqrt_ratio,
};
use crate::pool::callback::{Host, PoolHandle, SwapCallback, atomically};
use crate::pool::tick::{GrowthSnapshot, TickInfo};
use crate::pool::v3_pool::{PoolEvent, PoolLock, V3Pool};
use alloy_primitives::{Address, I256, U160, U256};
use tracing::{instrument, trace};

#[derive(Copy, Clone, Debug)]
pub struct SwapParams {
    /// Receiver of the output token.
    pub recipient: Address,
    /// Swap direction: `true` for token0 → token1, `false` for token1 → token0.
    pub zero_for_one: bool,
    /// Signed amount being swapped. Positive means “exact in”, negative means “exact out”.
    pub amount_specified: I256,
    /// Sqrt‑price limit in Q96 that bounds how far the price is allowed to move.
    pub sqrt_price_limit_x96: U256,
}

impl SwapParams {
    #[inline]
    pub fn new(
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
    ) -> Self {
        Self {
            recipient,
            zero_for_one,
            amount_specified,
            sqrt_price_limit_x96,
        }
    }
}

/// Outcome of a settled swap. Deltas are from the pool's point of view:
/// positive amounts were paid in, negative ones were sent out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapResult {
    pub amount0_delta: I256,
    pub amount1_delta: I256,
    /// Total fee charged in the input token, protocol share included.
    pub fees_paid: U256,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
}

// the top level state of the swap, the results of which are committed once the swap is paid for
struct SwapState {
    // the amount remaining to be swapped in/out of the input/output asset
    amount_specified_remaining: I256,
    // the amount already swapped out/in of the output/input asset
    amount_calculated: I256,
    sqrt_price_x96: U256,
    tick: i32,
    // global fee growth of the input token
    fee_growth_global_x128: U256,
    // protocol fees of the input token
    protocol_fee: u128,
    // the current liquidity in range
    liquidity: u128,
    // accumulated swap fees
    swap_fee: U256,
}

#[derive(Default)]
struct StepComputations {
    // the price at the beginning of the step
    sqrt_price_start_x96: U256,
    // the next tick to swap to from the current tick in the swap direction
    tick_next: i32,
    // whether tick_next is initialized or not
    initialized: bool,
    // sqrt(price) for the next tick (1/0)
    sqrt_price_next_x96: U256,
    // how much is being swapped in this step
    amount_in: U256,
    // how much is being swapped out
    amount_out: U256,
    // how much fee is being paid in
    fee_amount: U256,
}

fn to_signed(value: U256) -> Result<I256, MathError> {
    I256::try_from(value).map_err(|_| MathError::Overflow)
}

impl V3Pool {
    /// Swaps against the pool, crossing as many initialized ticks as needed
    /// to fill `amount_specified` or reach the price limit.
    ///
    /// The output is sent to `params.recipient` before `callback` runs; the
    /// callback must then pay the input, which is checked against the
    /// pool's own balance. If any of this fails the pool state is left
    /// untouched and the host rolls back the payout.
    #[instrument(skip(self, host, callback, data), fields(pool = ?self.pool_address), level = "debug")]
    pub fn swap(
        &mut self,
        host: &mut dyn Host,
        params: SwapParams,
        callback: &mut dyn SwapCallback,
        data: &[u8],
    ) -> Result<SwapResult, Error> {
        atomically(host, |host| self.execute_swap(host, params, callback, data))
    }

    fn execute_swap(
        &mut self,
        host: &mut dyn Host,
        params: SwapParams,
        callback: &mut dyn SwapCallback,
        data: &[u8],
    ) -> Result<SwapResult, Error> {
        let amount_specified = params.amount_specified;
        if unlikely(amount_specified.is_zero()) {
            return Err(PoolError::InsufficientInputAmount.into());
        }

        let mut pool = PoolLock::acquire(self)?;
        let slot0_start = pool.slot0;

        let zero_for_one = params.zero_for_one;
        let sqrt_price_limit_x96 = params.sqrt_price_limit_x96;
        let limit_ok = if zero_for_one {
            sqrt_price_limit_x96 < slot0_start.sqrt_price_x96
                && sqrt_price_limit_x96 > MIN_SQRT_RATIO
        } else {
            sqrt_price_limit_x96 > slot0_start.sqrt_price_x96
                && sqrt_price_limit_x96 < MAX_SQRT_RATIO
        };
        if unlikely(!limit_ok) {
            return Err(PoolError::InvalidPriceLimit.into());
        }

        let time = host.block_timestamp();
        let liquidity_start = pool.liquidity;
        let fee_protocol = if zero_for_one {
            slot0_start.fee_protocol % 16
        } else {
            slot0_start.fee_protocol >> 4
        };
        let exact_input = amount_specified.is_positive();

        let mut state = SwapState {
            amount_specified_remaining: amount_specified,
            amount_calculated: I256::ZERO,
            sqrt_price_x96: slot0_start.sqrt_price_x96,
            tick: slot0_start.tick,
            fee_growth_global_x128: if zero_for_one {
                pool.fee_growth_global_0_x128
            } else {
                pool.fee_growth_global_1_x128
            },
            protocol_fee: 0,
            liquidity: liquidity_start,
            swap_fee: U256::ZERO,
        };

        // oracle values only needed when a tick is crossed; computed once
        let mut cumulatives: Option<(i64, U160)> = None;
        let mut crossed: Vec<(i32, TickInfo)> = Vec::new();

        while !state.amount_specified_remaining.is_zero()
            && state.sqrt_price_x96 != sqrt_price_limit_x96
        {
            let mut step = StepComputations {
                sqrt_price_start_x96: state.sqrt_price_x96,
                ..StepComputations::default()
            };

            (step.tick_next, step.initialized) = next_initialized_tick_within_one_word(
                &pool.bitmap,
                state.tick,
                pool.config.tick_spacing,
                zero_for_one,
            )?;

            // the bitmap knows nothing of the tick bounds
            step.tick_next = step.tick_next.clamp(MIN_TICK, MAX_TICK);

            step.sqrt_price_next_x96 = get_sqrt_ratio_at_tick(step.tick_next)?;

            let target = if (zero_for_one && step.sqrt_price_next_x96 < sqrt_price_limit_x96)
                || (!zero_for_one && step.sqrt_price_next_x96 > sqrt_price_limit_x96)
            {
                sqrt_price_limit_x96
            } else {
                step.sqrt_price_next_x96
            };

            (
                state.sqrt_price_x96,
                step.amount_in,
                step.amount_out,
                step.fee_amount,
            ) = compute_swap_step(
                state.sqrt_price_x96,
                target,
                state.liquidity,
                state.amount_specified_remaining,
                pool.config.fee,
            )?;

            let amount_in_with_fee = to_signed(
                step.amount_in
                    .checked_add(step.fee_amount)
                    .ok_or(MathError::Overflow)?,
            )?;
            let amount_out = to_signed(step.amount_out)?;
            if exact_input {
                state.amount_specified_remaining = state
                    .amount_specified_remaining
                    .checked_sub(amount_in_with_fee)
                    .ok_or(MathError::Underflow)?;
                state.amount_calculated = state
                    .amount_calculated
                    .checked_sub(amount_out)
                    .ok_or(MathError::Underflow)?;
            } else {
                state.amount_specified_remaining = state
                    .amount_specified_remaining
                    .checked_add(amount_out)
                    .ok_or(MathError::Overflow)?;
                state.amount_calculated = state
                    .amount_calculated
                    .checked_add(amount_in_with_fee)
                    .ok_or(MathError::Overflow)?;
            }

            state.swap_fee = state.swap_fee.saturating_add(step.fee_amount);

            if fee_protocol > 0 {
                let delta = step.fee_amount / U256::from(fee_protocol);
                step.fee_amount -= delta;
                let delta = u128::try_from(delta).map_err(|_| MathError::Overflow)?;
                state.protocol_fee = state.protocol_fee.wrapping_add(delta);
            }

            if state.liquidity > 0 {
                state.fee_growth_global_x128 = state.fee_growth_global_x128.wrapping_add(
                    mul_div(step.fee_amount, Q128, U256::from(state.liquidity))?,
                );
            }

            trace!(
                tick_next = step.tick_next,
                initialized = step.initialized,
                sqrt_price = ?state.sqrt_price_x96,
                amount_in = ?step.amount_in,
                amount_out = ?step.amount_out,
                fee = ?step.fee_amount,
                "swap step"
            );

            if state.sqrt_price_x96 == step.sqrt_price_next_x96 {
                if step.initialized {
                    let (tick_cumulative, seconds_per_liquidity_cumulative_x128) =
                        match cumulatives {
                            Some(values) => values,
                            None => {
                                let values = pool.observations.observe_single(
                                    time,
                                    0,
                                    slot0_start.tick,
                                    slot0_start.observation_index,
                                    liquidity_start,
                                    slot0_start.observation_cardinality,
                                )?;
                                cumulatives = Some(values);
                                values
                            }
                        };
                    let growth = GrowthSnapshot {
                        fee_growth_global_0_x128: if zero_for_one {
                            state.fee_growth_global_x128
                        } else {
                            pool.fee_growth_global_0_x128
                        },
                        fee_growth_global_1_x128: if zero_for_one {
                            pool.fee_growth_global_1_x128
                        } else {
                            state.fee_growth_global_x128
                        },
                        seconds_per_liquidity_cumulative_x128,
                        tick_cumulative,
                        time,
                    };

                    let info = pool
                        .ticks
                        .get(&step.tick_next)
                        .copied()
                        .ok_or(PoolError::TickNotInitialized)?
                        .cross(&growth);
                    let mut liquidity_net = info.liquidity_net;
                    crossed.push((step.tick_next, info));

                    // moving left the net applies in reverse
                    if zero_for_one {
                        liquidity_net = liquidity_net
                            .checked_neg()
                            .ok_or(MathError::LiquidityOverflow)?;
                    }
                    state.liquidity = add_delta(state.liquidity, liquidity_net)?;
                }
                state.tick = if zero_for_one {
                    step.tick_next - 1
                } else {
                    step.tick_next
                };
            } else if state.sqrt_price_x96 != step.sqrt_price_start_x96 {
                state.tick = get_tick_at_sqrt_ratio(state.sqrt_price_x96)?;
            }
        }

        let amount_used = amount_specified
            .checked_sub(state.amount_specified_remaining)
            .ok_or(MathError::Overflow)?;
        let (amount0, amount1): (I256, I256) = if zero_for_one == exact_input {
            (amount_used, state.amount_calculated)
        } else {
            (state.amount_calculated, amount_used)
        };

        // pay out, then collect the input through the callback
        let (token0, token1, address) = (pool.config.token0, pool.config.token1, pool.pool_address);
        let (token_in, amount_in, token_out, amount_out) = if zero_for_one {
            (token0, amount0, token1, amount1)
        } else {
            (token1, amount1, token0, amount0)
        };
        if amount_out.is_negative() {
            host.transfer(token_out, address, params.recipient, amount_out.unsigned_abs())?;
        }

        let balance_before = host.balance_of(token_in, address);
        callback.swap_callback(&mut PoolHandle::new(&mut pool), host, amount0, amount1, data)?;
        let owed = if amount_in.is_positive() {
            amount_in.into_raw()
        } else {
            U256::ZERO
        };
        if balance_before.saturating_add(owed) > host.balance_of(token_in, address) {
            return Err(PoolError::InsufficientInputAmount.into());
        }

        for (tick, info) in crossed {
            pool.ticks.insert(tick, info);
        }

        if state.tick != slot0_start.tick {
            let (index, cardinality) = pool.observations.write(
                slot0_start.observation_index,
                time,
                slot0_start.tick,
                liquidity_start,
                slot0_start.observation_cardinality,
                slot0_start.observation_cardinality_next,
            );
            pool.slot0.observation_index = index;
            pool.slot0.observation_cardinality = cardinality;
            pool.slot0.tick = state.tick;
        }
        pool.slot0.sqrt_price_x96 = state.sqrt_price_x96;
        pool.liquidity = state.liquidity;

        if zero_for_one {
            pool.fee_growth_global_0_x128 = state.fee_growth_global_x128;
            pool.protocol_fees.token0 = pool.protocol_fees.token0.wrapping_add(state.protocol_fee);
        } else {
            pool.fee_growth_global_1_x128 = state.fee_growth_global_x128;
            pool.protocol_fees.token1 = pool.protocol_fees.token1.wrapping_add(state.protocol_fee);
        }

        pool.emit(PoolEvent::Swap {
            recipient: params.recipient,
            amount0,
            amount1,
            sqrt_price_x96: state.sqrt_price_x96,
            liquidity: state.liquidity,
            tick: state.tick,
        });

        Ok(SwapResult {
            amount0_delta: amount0,
            amount1_delta: amount1,
            fees_paid: state.swap_fee,
            sqrt_price_x96: state.sqrt_price_x96,
            tick: state.tick,
            liquidity: state.liquidity,
        })
    }
}
