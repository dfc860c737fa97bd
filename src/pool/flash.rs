use crate::error::{Error, MathError, PoolError};
use crate::math::math_helpers::{mul_div, mul_div_rounding_up};
use crate::pool::callback::{FlashCallback, Host, PoolHandle, atomically};
use crate::pool::v3_pool::{PoolEvent, PoolLock, V3Pool};
use crate::{Q128, U256_E6};
use alloy_primitives::{Address, U256};
use tracing::instrument;

/// Splits a paid flash fee into the protocol share and the fee growth it
/// adds for in-range liquidity.
fn split_fee(paid: U256, fee_protocol: u8, liquidity: u128) -> Result<(u128, U256), Error> {
    let protocol = if fee_protocol == 0 {
        U256::ZERO
    } else {
        paid / U256::from(fee_protocol)
    };
    let growth = mul_div(paid - protocol, Q128, U256::from(liquidity))?;
    let protocol = u128::try_from(protocol).map_err(|_| MathError::Overflow)?;
    Ok((protocol, growth))
}

impl V3Pool {
    /// Lends `amount0` / `amount1` to `recipient` for the duration of
    /// `callback`, which must return them plus the pool fee. Anything paid
    /// beyond the principal is distributed to in-range liquidity, less the
    /// protocol share. An unpaid loan is rolled back through the host.
    #[instrument(skip(self, host, callback, data), fields(pool = ?self.pool_address), level = "debug")]
    pub fn flash(
        &mut self,
        host: &mut dyn Host,
        recipient: Address,
        amount0: U256,
        amount1: U256,
        callback: &mut dyn FlashCallback,
        data: &[u8],
    ) -> Result<(U256, U256), Error> {
        atomically(host, |host| {
            self.execute_flash(host, recipient, amount0, amount1, callback, data)
        })
    }

    fn execute_flash(
        &mut self,
        host: &mut dyn Host,
        recipient: Address,
        amount0: U256,
        amount1: U256,
        callback: &mut dyn FlashCallback,
        data: &[u8],
    ) -> Result<(U256, U256), Error> {
        let mut pool = PoolLock::acquire(self)?;
        let liquidity = pool.liquidity;
        if liquidity == 0 {
            return Err(PoolError::InsufficientLiquidity.into());
        }

        let fee = U256::from(pool.config.fee);
        let fee0 = mul_div_rounding_up(amount0, fee, U256_E6)?;
        let fee1 = mul_div_rounding_up(amount1, fee, U256_E6)?;

        let (token0, token1, address) = (pool.config.token0, pool.config.token1, pool.pool_address);
        let balance0_before = host.balance_of(token0, address);
        let balance1_before = host.balance_of(token1, address);

        host.transfer(token0, address, recipient, amount0)?;
        host.transfer(token1, address, recipient, amount1)?;

        callback.flash_callback(&mut PoolHandle::new(&mut pool), host, fee0, fee1, data)?;

        let balance0_after = host.balance_of(token0, address);
        let balance1_after = host.balance_of(token1, address);
        if balance0_before.saturating_add(fee0) > balance0_after {
            return Err(PoolError::FlashNotRepaid0.into());
        }
        if balance1_before.saturating_add(fee1) > balance1_after {
            return Err(PoolError::FlashNotRepaid1.into());
        }

        let paid0 = balance0_after - balance0_before;
        let paid1 = balance1_after - balance1_before;
        let fee_protocol = pool.slot0.fee_protocol;
        let (protocol0, growth0) = split_fee(paid0, fee_protocol % 16, liquidity)?;
        let (protocol1, growth1) = split_fee(paid1, fee_protocol >> 4, liquidity)?;

        pool.protocol_fees.token0 = pool.protocol_fees.token0.wrapping_add(protocol0);
        pool.protocol_fees.token1 = pool.protocol_fees.token1.wrapping_add(protocol1);
        pool.fee_growth_global_0_x128 = pool.fee_growth_global_0_x128.wrapping_add(growth0);
        pool.fee_growth_global_1_x128 = pool.fee_growth_global_1_x128.wrapping_add(growth1);

        pool.emit(PoolEvent::Flash {
            recipient,
            amount0,
            amount1,
            paid0,
            paid1,
        });
        Ok((paid0, paid1))
    }
}
