// =============================================================================
// Signal Classifier: oscillator value to threshold band
// =============================================================================

use crate::types::SignalClass;

/// Map an oscillator value onto a band. Both bounds are inclusive and an
/// undefined value is always neutral.
pub fn classify(value: Option<f64>, oversold: f64, overbought: f64) -> SignalClass {
    match value {
        Some(v) if v <= oversold => SignalClass::Oversold,
        Some(v) if v >= overbought => SignalClass::Overbought,
        _ => SignalClass::Neutral,
    }
}

/// Render a value for a results table: two decimals, or `N/A`.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => "N/A".to_string(),
    }
}

/// CSS-style class name the presentation layer keys its cell colours on.
pub fn cell_class(signal: SignalClass) -> &'static str {
    match signal {
        SignalClass::Oversold => "oversold-cell",
        SignalClass::Overbought => "overbought-cell",
        SignalClass::Neutral => "neutral-cell",
    }
}
