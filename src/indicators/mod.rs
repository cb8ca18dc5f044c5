// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator code. Public functions return `Option<T>`
// (or a `None` variant) so insufficient data never escapes as an error.

pub mod divergence;
pub mod peaks;
pub mod rsi;

pub use divergence::detect_divergence;
pub use rsi::compute_oscillator;
