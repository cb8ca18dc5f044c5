// =============================================================================
// Market data: the DataSource capability and its implementations
// =============================================================================

pub mod alpha_vantage;
pub mod cache;
pub mod file_source;
pub mod resample;
pub mod source;

pub use alpha_vantage::AlphaVantageSource;
pub use cache::CachedSource;
pub use file_source::FileSource;
pub use source::DataSource;
