// =============================================================================
// Binance spot market data
// =============================================================================

pub mod client;
pub mod rate_limit;
pub mod source;

pub use client::BinanceClient;
pub use rate_limit::RateLimitTracker;
pub use source::BinanceSource;
