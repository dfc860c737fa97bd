pub mod callback;
pub mod flash;
pub mod liquidity;
pub mod oracle;
pub mod position;
pub mod swap;
pub mod tick;
pub mod v3_pool;
