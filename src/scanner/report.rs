// =============================================================================
// Analysis report: per-cell results, per-timeframe summaries, plain table
// =============================================================================

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::signals::{cell_class, format_value};
use crate::types::{Divergence, SignalClass};

/// Result for one (symbol, timeframe) pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisCell {
    pub last_value: Option<f64>,
    pub divergence: Divergence,
    pub signal: SignalClass,
}

impl AnalysisCell {
    /// Cell used when the data source returned nothing usable.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// One symbol with its cells keyed by timeframe label, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub symbol: String,
    pub cells: IndexMap<String, AnalysisCell>,
}

/// Aggregate counts for one timeframe column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeframeSummary {
    pub oversold: usize,
    pub overbought: usize,
    pub bullish_divergences: usize,
    pub bearish_divergences: usize,
    /// Cells that produced an oscillator value.
    pub with_value: usize,
    /// Mean of the defined values; absent when none are defined.
    pub mean_value: Option<f64>,
}

/// Formatted cell for presentation layers that only render strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCell {
    pub value: String,
    pub divergence: String,
    pub class: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub symbol: String,
    pub cells: IndexMap<String, TableCell>,
}

/// Output of one full scan. Rows follow the input symbol order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub rows: Vec<ReportRow>,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Per-timeframe aggregates, in column order.
    pub fn summaries(&self) -> IndexMap<String, TimeframeSummary> {
        let mut sums: IndexMap<String, (TimeframeSummary, f64)> = IndexMap::new();

        for row in &self.rows {
            for (label, cell) in &row.cells {
                let (s, total) = sums.entry(label.clone()).or_default();
                match cell.signal {
                    SignalClass::Oversold => s.oversold += 1,
                    SignalClass::Overbought => s.overbought += 1,
                    SignalClass::Neutral => {}
                }
                match cell.divergence {
                    Divergence::Bullish => s.bullish_divergences += 1,
                    Divergence::Bearish => s.bearish_divergences += 1,
                    Divergence::None => {}
                }
                if let Some(v) = cell.last_value {
                    s.with_value += 1;
                    *total += v;
                }
            }
        }

        sums.into_iter()
            .map(|(label, (mut s, total))| {
                if s.with_value > 0 {
                    s.mean_value = Some(total / s.with_value as f64);
                }
                (label, s)
            })
            .collect()
    }

    /// The report as display strings: `"71.46"` / `"N/A"`, divergence name,
    /// cell class.
    pub fn table(&self) -> Vec<TableRow> {
        self.rows
            .iter()
            .map(|row| TableRow {
                symbol: row.symbol.clone(),
                cells: row
                    .cells
                    .iter()
                    .map(|(label, cell)| {
                        (
                            label.clone(),
                            TableCell {
                                value: format_value(cell.last_value),
                                divergence: cell.divergence.to_string(),
                                class: cell_class(cell.signal),
                            },
                        )
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(v: Option<f64>, d: Divergence, s: SignalClass) -> AnalysisCell {
        AnalysisCell {
            last_value: v,
            divergence: d,
            signal: s,
        }
    }

    fn report() -> AnalysisReport {
        let mut a = IndexMap::new();
        a.insert("H1".to_string(), cell(Some(10.0), Divergence::Bullish, SignalClass::Oversold));
        a.insert("Daily".to_string(), cell(Some(50.0), Divergence::None, SignalClass::Neutral));
        let mut b = IndexMap::new();
        b.insert("H1".to_string(), cell(Some(90.0), Divergence::Bearish, SignalClass::Overbought));
        b.insert("Daily".to_string(), AnalysisCell::unavailable());
        AnalysisReport {
            rows: vec![
                ReportRow { symbol: "EUR/USD".into(), cells: a },
                ReportRow { symbol: "USD/JPY".into(), cells: b },
            ],
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn summaries_count_per_column() {
        let sums = report().summaries();
        let labels: Vec<&String> = sums.keys().collect();
        assert_eq!(labels, vec!["H1", "Daily"]);

        let h1 = &sums["H1"];
        assert_eq!((h1.oversold, h1.overbought), (1, 1));
        assert_eq!((h1.bullish_divergences, h1.bearish_divergences), (1, 1));
        assert_eq!(h1.mean_value, Some(50.0));

        let daily = &sums["Daily"];
        assert_eq!(daily.with_value, 1);
        assert_eq!(daily.mean_value, Some(50.0));
    }

    #[test]
    fn empty_column_has_no_mean() {
        let mut r = report();
        for row in &mut r.rows {
            row.cells.insert("Weekly".into(), AnalysisCell::unavailable());
        }
        assert_eq!(r.summaries()["Weekly"].mean_value, None);
    }

    #[test]
    fn table_formats_cells() {
        let table = report().table();
        assert_eq!(table[1].symbol, "USD/JPY");
        let daily = &table[1].cells["Daily"];
        assert_eq!(daily.value, "N/A");
        assert_eq!(daily.divergence, "None");
        assert_eq!(daily.class, "neutral-cell");
        assert_eq!(table[0].cells["H1"].value, "10.00");
        assert_eq!(table[0].cells["H1"].class, "oversold-cell");
    }
}
