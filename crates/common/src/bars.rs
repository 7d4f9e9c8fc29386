use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::{Bar, Result};

/// Anything that can produce an ordered, finite sequence of bars.
pub trait BarSource {
    fn load(&self) -> Result<Vec<Bar>>;
}

/// Bars read from a CSV file with a `timestamp,open,high,low,close,volume`
/// header. Rows are kept in file order.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    path: PathBuf,
    symbol: String,
}

impl CsvBarSource {
    pub fn new(path: impl Into<PathBuf>, symbol: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            symbol: symbol.into(),
        }
    }
}

impl BarSource for CsvBarSource {
    fn load(&self) -> Result<Vec<Bar>> {
        let bars = load_csv(&self.path, &self.symbol)?;
        info!(path = %self.path.display(), symbol = %self.symbol, bars = bars.len(), "Loaded bars");
        Ok(bars)
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub fn load_csv(path: &Path, symbol: &str) -> Result<Vec<Bar>> {
    let reader = csv::Reader::from_path(path)?;
    collect_rows(reader, symbol)
}

/// Parse bars from any reader, e.g. an in-memory buffer.
pub fn parse_csv<R: Read>(input: R, symbol: &str) -> Result<Vec<Bar>> {
    collect_rows(csv::Reader::from_reader(input), symbol)
}

fn collect_rows<R: Read>(mut reader: csv::Reader<R>, symbol: &str) -> Result<Vec<Bar>> {
    let mut bars = Vec::new();
    for record in reader.deserialize() {
        let row: CsvRow = record?;
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
timestamp,open,high,low,close,volume
2026-01-02T00:00:00Z,100,101,99,100.5,1200
2026-01-03T00:00:00Z,100.5,103,100,102.25,900
";

    #[test]
    fn parses_rows_in_order() {
        let bars = parse_csv(SAMPLE.as_bytes(), "AAPL").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].symbol, "AAPL");
        assert_eq!(bars[0].timestamp, "2026-01-02T00:00:00Z");
        assert_eq!(bars[1].close, 102.25);
        assert_eq!(bars[1].volume, 900.0);
    }

    #[test]
    fn rejects_non_numeric_prices() {
        let bad = "timestamp,open,high,low,close,volume\nt1,1,1,1,abc,1\n";
        assert!(parse_csv(bad.as_bytes(), "AAPL").is_err());
    }

    #[test]
    fn header_only_file_yields_no_bars() {
        let bars = parse_csv("timestamp,open,high,low,close,volume\n".as_bytes(), "AAPL").unwrap();
        assert!(bars.is_empty());
    }
}
