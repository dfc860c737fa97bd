use crate::error::{Error, MathError, PoolError};
use crate::math::liquidity_math::add_delta;
use crate::math::sqrt_price_math::{get_amount_0_delta, get_amount_1_delta};
use crate::math::tick_bitmap::flip_tick;
use crate::math::tick_math::get_sqrt_ratio_at_tick;
use crate::pool::callback::{Host, MintCallback, PoolHandle, atomically};
use crate::pool::position::{Position, position_key};
use crate::pool::tick::{GrowthSnapshot, TickInfo, get_fee_growth_inside};
use crate::pool::v3_pool::{PoolEvent, PoolLock, V3Pool, check_ticks};
use alloy_primitives::{Address, B256, I256, U256};
use tracing::instrument;

#[derive(Copy, Clone, Debug)]
pub struct MintParams {
    /// Owner of the minted position.
    pub recipient: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Liquidity to add.
    pub amount: u128,
}

impl MintParams {
    #[inline]
    pub fn new(recipient: Address, tick_lower: i32, tick_upper: i32, amount: u128) -> Self {
        Self {
            recipient,
            tick_lower,
            tick_upper,
            amount,
        }
    }
}

/// Everything a liquidity change will write, computed up front so that a
/// failing check or callback leaves the pool untouched.
struct PositionChange {
    key: B256,
    position: Position,
    tick_lower: i32,
    lower: TickInfo,
    flipped_lower: bool,
    tick_upper: i32,
    upper: TickInfo,
    flipped_upper: bool,
    liquidity_delta: i128,
    /// New active liquidity when the range covers the current tick.
    liquidity_after: Option<u128>,
    amount0: I256,
    amount1: I256,
}

/// Signed amount owed to the pool as an unsigned value; zero if negative.
fn owed(amount: I256) -> U256 {
    if amount.is_positive() {
        amount.into_raw()
    } else {
        U256::ZERO
    }
}

impl V3Pool {
    fn plan_position_change(
        &self,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        liquidity_delta: i128,
        time: u32,
    ) -> Result<PositionChange, Error> {
        check_ticks(tick_lower, tick_upper, self.config.tick_spacing)?;

        let slot0 = self.slot0;
        let key = position_key(owner, tick_lower, tick_upper);
        let position = self.positions.get(&key).copied().unwrap_or_default();

        let mut lower = self.ticks.get(&tick_lower).copied().unwrap_or_default();
        let mut upper = self.ticks.get(&tick_upper).copied().unwrap_or_default();
        let mut flipped_lower = false;
        let mut flipped_upper = false;

        if liquidity_delta != 0 {
            let (tick_cumulative, seconds_per_liquidity_cumulative_x128) =
                self.observations.observe_single(
                    time,
                    0,
                    slot0.tick,
                    slot0.observation_index,
                    self.liquidity,
                    slot0.observation_cardinality,
                )?;
            let growth = GrowthSnapshot {
                fee_growth_global_0_x128: self.fee_growth_global_0_x128,
                fee_growth_global_1_x128: self.fee_growth_global_1_x128,
                seconds_per_liquidity_cumulative_x128,
                tick_cumulative,
                time,
            };

            (lower, flipped_lower) = lower.update(
                tick_lower,
                slot0.tick,
                liquidity_delta,
                &growth,
                false,
                self.max_liquidity_per_tick,
            )?;
            (upper, flipped_upper) = upper.update(
                tick_upper,
                slot0.tick,
                liquidity_delta,
                &growth,
                true,
                self.max_liquidity_per_tick,
            )?;
        }

        let (fee_growth_inside_0_x128, fee_growth_inside_1_x128) = get_fee_growth_inside(
            &lower,
            &upper,
            tick_lower,
            tick_upper,
            slot0.tick,
            self.fee_growth_global_0_x128,
            self.fee_growth_global_1_x128,
        );
        let position = position.update(
            liquidity_delta,
            fee_growth_inside_0_x128,
            fee_growth_inside_1_x128,
        )?;

        let mut amount0 = I256::ZERO;
        let mut amount1 = I256::ZERO;
        let mut liquidity_after = None;

        if liquidity_delta != 0 {
            let sqrt_ratio_lower = get_sqrt_ratio_at_tick(tick_lower)?;
            let sqrt_ratio_upper = get_sqrt_ratio_at_tick(tick_upper)?;

            if slot0.tick < tick_lower {
                // range is above the price: only token0 is needed
                amount0 = get_amount_0_delta(sqrt_ratio_lower, sqrt_ratio_upper, liquidity_delta)?;
            } else if slot0.tick < tick_upper {
                amount0 =
                    get_amount_0_delta(slot0.sqrt_price_x96, sqrt_ratio_upper, liquidity_delta)?;
                amount1 =
                    get_amount_1_delta(sqrt_ratio_lower, slot0.sqrt_price_x96, liquidity_delta)?;
                liquidity_after = Some(add_delta(self.liquidity, liquidity_delta)?);
            } else {
                // range is below the price: only token1 is needed
                amount1 = get_amount_1_delta(sqrt_ratio_lower, sqrt_ratio_upper, liquidity_delta)?;
            }
        }

        Ok(PositionChange {
            key,
            position,
            tick_lower,
            lower,
            flipped_lower,
            tick_upper,
            upper,
            flipped_upper,
            liquidity_delta,
            liquidity_after,
            amount0,
            amount1,
        })
    }

    fn apply_position_change(&mut self, change: PositionChange, time: u32) -> Result<(), Error> {
        let spacing = self.config.tick_spacing;
        if change.flipped_lower {
            flip_tick(&mut self.bitmap, change.tick_lower, spacing)?;
        }
        if change.flipped_upper {
            flip_tick(&mut self.bitmap, change.tick_upper, spacing)?;
        }

        if change.liquidity_delta != 0 {
            for (tick, info, flipped) in [
                (change.tick_lower, change.lower, change.flipped_lower),
                (change.tick_upper, change.upper, change.flipped_upper),
            ] {
                // a tick that lost its last reference is cleared
                if flipped && change.liquidity_delta < 0 {
                    self.ticks.remove(&tick);
                } else {
                    self.ticks.insert(tick, info);
                }
            }
        }

        if change.position.is_empty() {
            self.positions.remove(&change.key);
        } else {
            self.positions.insert(change.key, change.position);
        }

        if let Some(liquidity_after) = change.liquidity_after {
            let (index, cardinality) = self.observations.write(
                self.slot0.observation_index,
                time,
                self.slot0.tick,
                self.liquidity,
                self.slot0.observation_cardinality,
                self.slot0.observation_cardinality_next,
            );
            self.slot0.observation_index = index;
            self.slot0.observation_cardinality = cardinality;
            self.liquidity = liquidity_after;
        }
        Ok(())
    }

    /// Adds `params.amount` liquidity to the recipient's position.
    ///
    /// The owed amounts are requested from `callback`; the pool's balances
    /// must have grown by at least that much once it returns. Returns the
    /// token amounts paid.
    #[instrument(skip(self, host, callback, data), fields(pool = ?self.pool_address), level = "debug")]
    pub fn mint(
        &mut self,
        host: &mut dyn Host,
        params: MintParams,
        callback: &mut dyn MintCallback,
        data: &[u8],
    ) -> Result<(U256, U256), Error> {
        atomically(host, |host| self.execute_mint(host, params, callback, data))
    }

    fn execute_mint(
        &mut self,
        host: &mut dyn Host,
        params: MintParams,
        callback: &mut dyn MintCallback,
        data: &[u8],
    ) -> Result<(U256, U256), Error> {
        let mut pool = PoolLock::acquire(self)?;
        if params.amount == 0 {
            return Err(PoolError::InsufficientLiquidity.into());
        }
        let liquidity_delta =
            i128::try_from(params.amount).map_err(|_| MathError::LiquidityOverflow)?;

        let time = host.block_timestamp();
        let change = pool.plan_position_change(
            params.recipient,
            params.tick_lower,
            params.tick_upper,
            liquidity_delta,
            time,
        )?;
        let amount0 = owed(change.amount0);
        let amount1 = owed(change.amount1);

        let (token0, token1, address) = (pool.config.token0, pool.config.token1, pool.pool_address);
        let balance0_before = host.balance_of(token0, address);
        let balance1_before = host.balance_of(token1, address);

        callback.mint_callback(&mut PoolHandle::new(&mut pool), host, amount0, amount1, data)?;

        if !amount0.is_zero()
            && balance0_before.saturating_add(amount0) > host.balance_of(token0, address)
        {
            return Err(PoolError::InsufficientPayment0.into());
        }
        if !amount1.is_zero()
            && balance1_before.saturating_add(amount1) > host.balance_of(token1, address)
        {
            return Err(PoolError::InsufficientPayment1.into());
        }

        pool.apply_position_change(change, time)?;
        pool.emit(PoolEvent::Mint {
            owner: params.recipient,
            tick_lower: params.tick_lower,
            tick_upper: params.tick_upper,
            amount: params.amount,
            amount0,
            amount1,
        });
        Ok((amount0, amount1))
    }

    /// Removes `amount` liquidity from the caller's position and credits the
    /// released tokens to it as owed; nothing is transferred until
    /// [`V3Pool::collect`]. A zero `amount` only settles accrued fees.
    #[instrument(skip(self, host), fields(pool = ?self.pool_address), level = "debug")]
    pub fn burn(
        &mut self,
        host: &dyn Host,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), Error> {
        let mut pool = PoolLock::acquire(self)?;
        let liquidity_delta = i128::try_from(amount)
            .map(|amount| -amount)
            .map_err(|_| MathError::LiquidityUnderflow)?;

        let time = host.block_timestamp();
        let mut change =
            pool.plan_position_change(owner, tick_lower, tick_upper, liquidity_delta, time)?;

        let amount0 = change.amount0.unsigned_abs();
        let amount1 = change.amount1.unsigned_abs();

        if !amount0.is_zero() || !amount1.is_zero() {
            let owed0 = u128::try_from(amount0).map_err(|_| MathError::Overflow)?;
            let owed1 = u128::try_from(amount1).map_err(|_| MathError::Overflow)?;
            change.position.tokens_owed_0 = change.position.tokens_owed_0.wrapping_add(owed0);
            change.position.tokens_owed_1 = change.position.tokens_owed_1.wrapping_add(owed1);
        }

        pool.apply_position_change(change, time)?;
        pool.emit(PoolEvent::Burn {
            owner,
            tick_lower,
            tick_upper,
            amount,
            amount0,
            amount1,
        });
        Ok((amount0, amount1))
    }

    /// Sends up to the requested amounts of the owner's owed tokens to
    /// `recipient`. Never pays out more than is owed.
    #[instrument(skip(self, host), fields(pool = ?self.pool_address), level = "debug")]
    #[allow(clippy::too_many_arguments)]
    pub fn collect(
        &mut self,
        host: &mut dyn Host,
        owner: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        atomically(host, |host| {
            self.execute_collect(
                host,
                owner,
                recipient,
                tick_lower,
                tick_upper,
                amount0_requested,
                amount1_requested,
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_collect(
        &mut self,
        host: &mut dyn Host,
        owner: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        let mut pool = PoolLock::acquire(self)?;
        let key = position_key(owner, tick_lower, tick_upper);
        let mut position = pool.positions.get(&key).copied().unwrap_or_default();

        let amount0 = amount0_requested.min(position.tokens_owed_0);
        let amount1 = amount1_requested.min(position.tokens_owed_1);

        let (token0, token1, address) = (pool.config.token0, pool.config.token1, pool.pool_address);
        host.transfer(token0, address, recipient, U256::from(amount0))?;
        host.transfer(token1, address, recipient, U256::from(amount1))?;

        position.tokens_owed_0 -= amount0;
        position.tokens_owed_1 -= amount1;
        if position.is_empty() {
            pool.positions.remove(&key);
        } else {
            pool.positions.insert(key, position);
        }

        pool.emit(PoolEvent::Collect {
            owner,
            recipient,
            tick_lower,
            tick_upper,
            amount0,
            amount1,
        });
        Ok((amount0, amount1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Q96;
    use crate::config::{FeeTier, PoolConfig};
    use crate::math::tick_math::{MAX_TICK, MIN_TICK};
    use crate::pool::callback::{FrozenTokenHost, MemoryHost, PayingCallback};

    const LP: Address = Address::repeat_byte(0x11);

    struct NoPayCallback;

    impl MintCallback for NoPayCallback {
        fn mint_callback(
            &mut self,
            _pool: &mut PoolHandle<'_>,
            _host: &mut dyn Host,
            _amount0_owed: U256,
            _amount1_owed: U256,
            _data: &[u8],
        ) -> Result<(), Error> {
            Ok(())
        }
    }

    fn setup() -> (V3Pool, MemoryHost, PayingCallback) {
        let config = PoolConfig::from_fee_tier(
            Address::repeat_byte(0xfa),
            Address::repeat_byte(0x0a),
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            FeeTier::Medium,
        );
        let mut pool = V3Pool::new(Address::repeat_byte(0xaa), config).unwrap();
        let mut host = MemoryHost::new(1_000);
        pool.initialize(Q96, host.block_timestamp).unwrap();
        let supply = U256::from(10u128.pow(30));
        host.mint_tokens(pool.token0(), LP, supply);
        host.mint_tokens(pool.token1(), LP, supply);
        (pool, host, PayingCallback::new(LP))
    }

    #[test]
    fn collect_failing_on_token1_pays_out_nothing() {
        let (mut pool, mut host, mut payer) = setup();
        pool.mint(&mut host, MintParams::new(LP, -600, 600, 10u128.pow(18)), &mut payer, &[])
            .unwrap();
        pool.burn(&host, LP, -600, 600, 10u128.pow(17)).unwrap();
        let owed = pool.position(LP, -600, 600);
        assert!(owed.tokens_owed_0 > 0 && owed.tokens_owed_1 > 0);

        let lp_balance = host.balance_of(pool.token0(), LP);
        let frozen = pool.token1();
        let mut host = FrozenTokenHost {
            inner: host,
            frozen,
        };
        assert_eq!(
            pool.collect(&mut host, LP, LP, -600, 600, u128::MAX, u128::MAX),
            Err(Error::PoolError(PoolError::TransferFailed))
        );
        assert_eq!(pool.position(LP, -600, 600), owed);
        assert_eq!(host.balance_of(pool.token0(), LP), lp_balance);

        // owed amounts are still fully collectable once transfers work
        let mut host = host.inner;
        let collected = pool
            .collect(&mut host, LP, LP, -600, 600, u128::MAX, u128::MAX)
            .unwrap();
        assert_eq!(collected, (owed.tokens_owed_0, owed.tokens_owed_1));
        assert_eq!(
            host.balance_of(pool.token0(), LP),
            lp_balance + U256::from(owed.tokens_owed_0)
        );
    }

    #[test]
    fn mint_in_range_takes_both_tokens_and_activates_liquidity() {
        let (mut pool, mut host, mut payer) = setup();
        let (amount0, amount1) = pool
            .mint(&mut host, MintParams::new(LP, -600, 600, 10u128.pow(18)), &mut payer, &[])
            .unwrap();

        assert!(!amount0.is_zero() && !amount1.is_zero());
        assert_eq!(amount0, amount1);
        assert_eq!(pool.liquidity(), 10u128.pow(18));
        assert_eq!(host.balance_of(pool.token0(), pool.address()), amount0);
        assert!(pool.is_tick_initialized(-600));
        assert!(pool.is_tick_initialized(600));
        assert_eq!(pool.get_liquidity_net(-600), Some(10i128.pow(18)));
        assert_eq!(pool.get_liquidity_net(600), Some(-(10i128.pow(18))));
        assert_eq!(pool.position(LP, -600, 600).liquidity, 10u128.pow(18));
    }

    #[test]
    fn mint_out_of_range_takes_one_token() {
        let (mut pool, mut host, mut payer) = setup();
        let (amount0, amount1) = pool
            .mint(&mut host, MintParams::new(LP, 60, 600, 10u128.pow(18)), &mut payer, &[])
            .unwrap();
        assert!(!amount0.is_zero());
        assert!(amount1.is_zero());
        assert_eq!(pool.liquidity(), 0);

        let (amount0, amount1) = pool
            .mint(&mut host, MintParams::new(LP, -600, -60, 10u128.pow(18)), &mut payer, &[])
            .unwrap();
        assert!(amount0.is_zero());
        assert!(!amount1.is_zero());
        assert_eq!(pool.liquidity(), 0);
    }

    #[test]
    fn mint_rejects_bad_ranges_and_zero_amount() {
        let (mut pool, mut host, mut payer) = setup();
        for (lower, upper) in [(60, 60), (600, -600), (MIN_TICK - 1, 0), (0, MAX_TICK + 1), (1, 60)] {
            assert_eq!(
                pool.mint(&mut host, MintParams::new(LP, lower, upper, 1), &mut payer, &[]),
                Err(Error::PoolError(PoolError::InvalidTick))
            );
        }
        assert_eq!(
            pool.mint(&mut host, MintParams::new(LP, -60, 60, 0), &mut payer, &[]),
            Err(Error::PoolError(PoolError::InsufficientLiquidity))
        );
    }

    #[test]
    fn mint_above_max_liquidity_per_tick_fails() {
        let (mut pool, mut host, mut payer) = setup();
        let max = pool.max_liquidity_per_tick();
        let res = pool.mint(&mut host, MintParams::new(LP, -60, 60, max + 1), &mut payer, &[]);
        assert_eq!(res, Err(Error::MathError(MathError::LiquidityOverflow)));
    }

    #[test]
    fn unpaid_mint_fails_and_leaves_pool_unchanged() {
        let (mut pool, mut host, _) = setup();
        let before = serde_json::to_string(&pool).unwrap();
        let res = pool.mint(
            &mut host,
            MintParams::new(LP, -600, 600, 10u128.pow(18)),
            &mut NoPayCallback,
            &[],
        );
        assert_eq!(res, Err(Error::PoolError(PoolError::InsufficientPayment0)));
        assert_eq!(serde_json::to_string(&pool).unwrap(), before);
        assert!(pool.slot0().unlocked);
    }

    #[test]
    fn burn_credits_owed_tokens_and_collect_pays_them() {
        let (mut pool, mut host, mut payer) = setup();
        let (paid0, paid1) = pool
            .mint(&mut host, MintParams::new(LP, -600, 600, 10u128.pow(18)), &mut payer, &[])
            .unwrap();

        let (burned0, burned1) = pool.burn(&host, LP, -600, 600, 10u128.pow(18)).unwrap();
        // removal rounds down, addition rounded up
        assert!(burned0 <= paid0 && paid0 - burned0 <= U256::from(1));
        assert!(burned1 <= paid1 && paid1 - burned1 <= U256::from(1));
        assert_eq!(pool.liquidity(), 0);

        // ticks and bitmap bits are cleared with the last reference
        assert!(pool.tick(-600).is_none());
        assert!(pool.tick(600).is_none());
        assert!(!pool.is_tick_initialized(-600));
        assert!(!pool.is_tick_initialized(600));

        let position = pool.position(LP, -600, 600);
        assert_eq!(U256::from(position.tokens_owed_0), burned0);
        assert_eq!(U256::from(position.tokens_owed_1), burned1);

        let recipient = Address::repeat_byte(0x22);
        let (c0, c1) = pool
            .collect(&mut host, LP, recipient, -600, 600, 10, u128::MAX)
            .unwrap();
        assert_eq!(c0, 10);
        assert_eq!(U256::from(c1), burned1);
        assert_eq!(host.balance_of(pool.token0(), recipient), U256::from(10));
        assert_eq!(
            U256::from(pool.position(LP, -600, 600).tokens_owed_0),
            burned0 - U256::from(10)
        );
    }

    #[test]
    fn poke_of_missing_position_fails() {
        let (mut pool, host, _) = setup();
        assert_eq!(
            pool.burn(&host, LP, -600, 600, 0),
            Err(Error::PoolError(PoolError::EmptyPosition))
        );
    }

    #[test]
    fn burning_more_than_owned_fails() {
        let (mut pool, mut host, mut payer) = setup();
        pool.mint(&mut host, MintParams::new(LP, -600, 600, 1_000), &mut payer, &[])
            .unwrap();
        assert_eq!(
            pool.burn(&host, LP, -600, 600, 1_001),
            Err(Error::MathError(MathError::LiquidityUnderflow))
        );
        // someone else's position is untouched and cannot be burned
        assert_eq!(
            pool.burn(&host, Address::repeat_byte(0x33), -600, 600, 1),
            Err(Error::MathError(MathError::LiquidityUnderflow))
        );
    }

    #[test]
    fn shared_ticks_stay_until_last_reference_is_burned() {
        let (mut pool, mut host, mut payer) = setup();
        pool.mint(&mut host, MintParams::new(LP, -600, 600, 500), &mut payer, &[])
            .unwrap();
        pool.mint(&mut host, MintParams::new(LP, -600, 1200, 700), &mut payer, &[])
            .unwrap();
        assert_eq!(pool.tick(-600).unwrap().liquidity_gross, 1200);

        pool.burn(&host, LP, -600, 600, 500).unwrap();
        assert!(pool.is_tick_initialized(-600));
        assert!(!pool.is_tick_initialized(600));
        assert_eq!(pool.get_liquidity_net(-600), Some(700));
        assert_eq!(pool.liquidity(), 700);
    }

    #[test]
    fn in_range_mint_writes_an_observation() {
        let (mut pool, mut host, mut payer) = setup();
        pool.increase_observation_cardinality_next(4).unwrap();
        host.advance_time(10);
        pool.mint(&mut host, MintParams::new(LP, -600, 600, 100), &mut payer, &[])
            .unwrap();
        let slot0 = pool.slot0();
        assert_eq!(slot0.observation_index, 1);
        assert_eq!(slot0.observation_cardinality, 4);
        assert_eq!(pool.observation(1).block_timestamp, 1_010);
    }
}
