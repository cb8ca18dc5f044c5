// =============================================================================
// Signals Module
// =============================================================================
//
// Turns oscillator values into the categories and labels shown in reports.

pub mod classifier;

pub use classifier::{cell_class, classify, format_value};
