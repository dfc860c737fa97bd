use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("Math error - overflow")]
    Overflow,
    #[error("Math error - underflow")]
    Underflow,
    #[error("Math error - out of bounds")]
    OutOfBounds,
    #[error("Math error - division by zero")]
    DivisionByZero,
    #[error("BitMath error - zero input value")]
    ZeroValue,
    #[error("LiquidityMath error - liquidity underflow")]
    LiquidityUnderflow,
    #[error("LiquidityMath error - liquidity overflow")]
    LiquidityOverflow,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("State error - sqrtPrice out of bounds")]
    SqrtPriceOutOfBounds,
    #[error("State error - sqrtPrice is 0")]
    SqrtPriceIsZero,
    #[error("State error - sqrtRatio is 0")]
    SqrtRatioIsZero,

    #[error("State error - tick out of bounds")]
    TickOutOfBounds,
    #[error("State error - tick spacing must be between 1 and the max tick")]
    InvalidTickSpacing,

    #[error("State error - liquidity is 0")]
    LiquidityIsZero,

    #[error("State error - requested amount exceeds pool reserves")]
    InsufficientReserves,
}

/// Failures raised by the pool engine itself: lifecycle, access control,
/// argument validation and settlement checks.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool error - pool is already initialized")]
    AlreadyInitialized,
    #[error("Pool error - pool is not initialized")]
    NotInitialized,
    #[error("Pool error - pool is locked")]
    Locked,
    #[error("Pool error - caller is not the owner")]
    NotOwner,

    #[error("Pool error - invalid tick range")]
    InvalidTick,
    #[error("Pool error - tick is not a multiple of the tick spacing")]
    TickNotAligned,
    #[error("Pool error - tick is not initialized")]
    TickNotInitialized,

    #[error("Pool error - insufficient liquidity")]
    InsufficientLiquidity,
    #[error("Pool error - insufficient input amount")]
    InsufficientInputAmount,
    #[error("Pool error - sqrt price limit is on the wrong side of the price or out of bounds")]
    InvalidPriceLimit,
    #[error("Pool error - protocol fee share must be 0 or between 4 and 10")]
    InvalidFeeProtocol,

    #[error("Pool error - token0 owed for mint was not paid")]
    InsufficientPayment0,
    #[error("Pool error - token1 owed for mint was not paid")]
    InsufficientPayment1,
    #[error("Pool error - token0 flash loan was not repaid with fee")]
    FlashNotRepaid0,
    #[error("Pool error - token1 flash loan was not repaid with fee")]
    FlashNotRepaid1,

    #[error("Pool error - position has no liquidity to poke")]
    EmptyPosition,

    #[error("Oracle error - cardinality cannot be zero")]
    OracleCardinalityCannotBeZero,
    #[error("Oracle error - target predates the oldest observation")]
    OracleTargetTooOld,

    #[error("Host error - token transfer failed")]
    TransferFailed,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    MathError(#[from] crate::error::MathError),

    #[error(transparent)]
    StateError(#[from] crate::error::StateError),

    #[error(transparent)]
    PoolError(#[from] crate::error::PoolError),
}
