//! Collaborators the pool talks to while it holds its lock.
//!
//! The [`Host`] owns token balances and the clock. Callbacks are invoked
//! in the middle of `mint`, `swap` and `flash` to pay what the pool is
//! owed; the pool then checks its own balance through the host and never
//! trusts what a callback says it did.
//!
//! Every entry point that moves tokens runs between a host
//! [`Host::checkpoint`] and either [`Host::commit`] or [`Host::revert`], so
//! a call that fails after paying out leaves no transfer behind.

use crate::FastMap;
use crate::error::{Error, PoolError};
use crate::pool::liquidity::MintParams;
use crate::pool::swap::{SwapParams, SwapResult};
use crate::pool::v3_pool::V3Pool;
use alloy_primitives::{Address, I256, U256};
use std::ops::Deref;

/// Position in a host's transfer journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub usize);

/// Execution environment of a pool: token ledger plus block clock.
pub trait Host {
    /// Current time in seconds, truncated to 32 bits.
    fn block_timestamp(&self) -> u32;

    fn balance_of(&self, token: Address, account: Address) -> U256;

    /// Moves `amount` of `token`. Fails with `TransferFailed` when `from`
    /// does not hold enough.
    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError>;

    /// Opens a checkpoint. Checkpoints nest; each one is closed by exactly
    /// one `commit` or `revert`.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Keeps every transfer made since `checkpoint`.
    fn commit(&mut self, checkpoint: Checkpoint);

    /// Undoes every transfer made since `checkpoint`, newest first.
    fn revert(&mut self, checkpoint: Checkpoint);
}

/// Runs `op` inside a host checkpoint, reverting its transfers on error.
pub(crate) fn atomically<T>(
    host: &mut dyn Host,
    op: impl FnOnce(&mut dyn Host) -> Result<T, Error>,
) -> Result<T, Error> {
    let checkpoint = host.checkpoint();
    let result = op(host);
    match &result {
        Ok(_) => host.commit(checkpoint),
        Err(_) => host.revert(checkpoint),
    }
    result
}

/// The view of a pool a callback gets while the pool is mid-operation.
///
/// Reads go through `Deref`. The entry points are forwarded as-is and all
/// fail with `Locked`, since the outer call holds the lock. The pool itself
/// cannot be reached mutably.
pub struct PoolHandle<'a> {
    pool: &'a mut V3Pool,
}

impl<'a> PoolHandle<'a> {
    pub(crate) fn new(pool: &'a mut V3Pool) -> Self {
        Self { pool }
    }

    pub fn mint(
        &mut self,
        host: &mut dyn Host,
        params: MintParams,
        callback: &mut dyn MintCallback,
        data: &[u8],
    ) -> Result<(U256, U256), Error> {
        self.pool.mint(host, params, callback, data)
    }

    pub fn burn(
        &mut self,
        host: &dyn Host,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), Error> {
        self.pool.burn(host, owner, tick_lower, tick_upper, amount)
    }

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
        self.pool.collect(
            host,
            owner,
            recipient,
            tick_lower,
            tick_upper,
            amount0_requested,
            amount1_requested,
        )
    }

    pub fn swap(
        &mut self,
        host: &mut dyn Host,
        params: SwapParams,
        callback: &mut dyn SwapCallback,
        data: &[u8],
    ) -> Result<SwapResult, Error> {
        self.pool.swap(host, params, callback, data)
    }

    pub fn flash(
        &mut self,
        host: &mut dyn Host,
        recipient: Address,
        amount0: U256,
        amount1: U256,
        callback: &mut dyn FlashCallback,
        data: &[u8],
    ) -> Result<(U256, U256), Error> {
        self.pool.flash(host, recipient, amount0, amount1, callback, data)
    }

    pub fn increase_observation_cardinality_next(&mut self, next: u16) -> Result<(), Error> {
        self.pool.increase_observation_cardinality_next(next)
    }

    pub fn set_fee_protocol(
        &mut self,
        caller: Address,
        fee_protocol0: u8,
        fee_protocol1: u8,
    ) -> Result<(), Error> {
        self.pool.set_fee_protocol(caller, fee_protocol0, fee_protocol1)
    }

    pub fn collect_protocol(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        recipient: Address,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        self.pool
            .collect_protocol(host, caller, recipient, amount0_requested, amount1_requested)
    }
}

impl Deref for PoolHandle<'_> {
    type Target = V3Pool;

    fn deref(&self) -> &V3Pool {
        self.pool
    }
}

/// Pays the amounts owed for a mint.
pub trait MintCallback {
    fn mint_callback(
        &mut self,
        pool: &mut PoolHandle<'_>,
        host: &mut dyn Host,
        amount0_owed: U256,
        amount1_owed: U256,
        data: &[u8],
    ) -> Result<(), Error>;
}

/// Settles a swap. Positive deltas are owed to the pool, negative ones
/// have already been sent to the recipient.
pub trait SwapCallback {
    fn swap_callback(
        &mut self,
        pool: &mut PoolHandle<'_>,
        host: &mut dyn Host,
        amount0_delta: I256,
        amount1_delta: I256,
        data: &[u8],
    ) -> Result<(), Error>;
}

/// Repays a flash loan: the borrowed amounts plus `fee0` / `fee1`.
pub trait FlashCallback {
    fn flash_callback(
        &mut self,
        pool: &mut PoolHandle<'_>,
        host: &mut dyn Host,
        fee0: U256,
        fee1: U256,
        data: &[u8],
    ) -> Result<(), Error>;
}

/// A transfer recorded while a checkpoint is open.
#[derive(Debug, Clone, Copy)]
struct JournalEntry {
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
}

/// In-memory token ledger and clock.
///
/// Transfers are journaled only while a checkpoint is open; the journal is
/// dropped once the outermost checkpoint closes.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    pub block_timestamp: u32,
    balances: FastMap<(Address, Address), U256>,
    journal: Vec<JournalEntry>,
    open_checkpoints: usize,
}

impl MemoryHost {
    pub fn new(block_timestamp: u32) -> Self {
        Self {
            block_timestamp,
            ..Self::default()
        }
    }

    /// Credits `amount` of `token` to `account` out of thin air.
    pub fn mint_tokens(&mut self, token: Address, account: Address, amount: U256) {
        let balance = self.balances.entry((token, account)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Moves the clock forward, wrapping like a 32-bit timestamp.
    pub fn advance_time(&mut self, seconds: u32) {
        self.block_timestamp = self.block_timestamp.wrapping_add(seconds);
    }

    fn close_checkpoint(&mut self) {
        self.open_checkpoints = self.open_checkpoints.saturating_sub(1);
        if self.open_checkpoints == 0 {
            self.journal.clear();
        }
    }
}

impl Host for MemoryHost {
    fn block_timestamp(&self) -> u32 {
        self.block_timestamp
    }

    fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.balances
            .get(&(token, account))
            .copied()
            .unwrap_or_default()
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        if amount.is_zero() {
            return Ok(());
        }
        let from_balance = self.balance_of(token, from);
        let remaining = from_balance
            .checked_sub(amount)
            .ok_or(PoolError::TransferFailed)?;
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(PoolError::TransferFailed)?;
        self.balances.insert((token, from), remaining);
        self.balances.insert((token, to), to_balance);
        if self.open_checkpoints > 0 {
            self.journal.push(JournalEntry {
                token,
                from,
                to,
                amount,
            });
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.open_checkpoints += 1;
        Checkpoint(self.journal.len())
    }

    fn commit(&mut self, _checkpoint: Checkpoint) {
        self.close_checkpoint();
    }

    fn revert(&mut self, checkpoint: Checkpoint) {
        let start = checkpoint.0.min(self.journal.len());
        for entry in self.journal.drain(start..).rev() {
            // later transfers are undone first, so `to` still holds `amount`
            let to = self.balances.entry((entry.token, entry.to)).or_default();
            *to = to.saturating_sub(entry.amount);
            let from = self.balances.entry((entry.token, entry.from)).or_default();
            *from = from.saturating_add(entry.amount);
        }
        self.close_checkpoint();
    }
}

/// Test host that refuses every transfer of `frozen`.
#[cfg(test)]
pub(crate) struct FrozenTokenHost {
    pub(crate) inner: MemoryHost,
    pub(crate) frozen: Address,
}

#[cfg(test)]
impl Host for FrozenTokenHost {
    fn block_timestamp(&self) -> u32 {
        self.inner.block_timestamp
    }

    fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.inner.balance_of(token, account)
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        if token == self.frozen {
            return Err(PoolError::TransferFailed);
        }
        self.inner.transfer(token, from, to, amount)
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.inner.checkpoint()
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.inner.commit(checkpoint)
    }

    fn revert(&mut self, checkpoint: Checkpoint) {
        self.inner.revert(checkpoint)
    }
}

/// Callback that pays everything owed from a single `payer` account.
///
/// For flash loans it repays the principal set with
/// [`PayingCallback::with_flash_principal`] plus the fees.
#[derive(Debug, Clone, Copy)]
pub struct PayingCallback {
    pub payer: Address,
    flash_principal: (U256, U256),
}

impl PayingCallback {
    pub fn new(payer: Address) -> Self {
        Self {
            payer,
            flash_principal: (U256::ZERO, U256::ZERO),
        }
    }

    pub fn with_flash_principal(mut self, amount0: U256, amount1: U256) -> Self {
        self.flash_principal = (amount0, amount1);
        self
    }

    fn pay(
        &self,
        pool: &V3Pool,
        host: &mut dyn Host,
        amount0: U256,
        amount1: U256,
    ) -> Result<(), Error> {
        host.transfer(pool.token0(), self.payer, pool.address(), amount0)?;
        host.transfer(pool.token1(), self.payer, pool.address(), amount1)?;
        Ok(())
    }
}

impl MintCallback for PayingCallback {
    fn mint_callback(
        &mut self,
        pool: &mut PoolHandle<'_>,
        host: &mut dyn Host,
        amount0_owed: U256,
        amount1_owed: U256,
        _data: &[u8],
    ) -> Result<(), Error> {
        self.pay(pool, host, amount0_owed, amount1_owed)
    }
}

impl SwapCallback for PayingCallback {
    fn swap_callback(
        &mut self,
        pool: &mut PoolHandle<'_>,
        host: &mut dyn Host,
        amount0_delta: I256,
        amount1_delta: I256,
        _data: &[u8],
    ) -> Result<(), Error> {
        let owed = |delta: I256| {
            if delta.is_positive() {
                delta.into_raw()
            } else {
                U256::ZERO
            }
        };
        self.pay(pool, host, owed(amount0_delta), owed(amount1_delta))
    }
}

impl FlashCallback for PayingCallback {
    fn flash_callback(
        &mut self,
        pool: &mut PoolHandle<'_>,
        host: &mut dyn Host,
        fee0: U256,
        fee1: U256,
        _data: &[u8],
    ) -> Result<(), Error> {
        let (principal0, principal1) = self.flash_principal;
        self.pay(
            pool,
            host,
            principal0.saturating_add(fee0),
            principal1.saturating_add(fee1),
        )
    }
}
