//! CSV price cache adapter.
//!
//! One file per symbol, `{SYMBOL}.csv`, with a `date,open,high,low,close,volume`
//! header. Rows are returned sorted by date; validation is left to the caller.

use crate::domain::error::EodTraderError;
use crate::domain::instrument::normalize_symbol;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    symbol: &str,
) -> Result<T, EodTraderError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(idx).ok_or_else(|| EodTraderError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: format!("missing {} column", name),
    })?;
    raw.trim()
        .parse()
        .map_err(|e: T::Err| EodTraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("invalid {} value '{}': {}", name, raw, e),
        })
}

impl PriceDataPort for CsvAdapter {
    fn get_bars(&self, symbol: &str) -> Result<Vec<OhlcvBar>, EodTraderError> {
        let symbol = normalize_symbol(symbol);
        let path = self.csv_path(&symbol);
        let content = fs::read_to_string(&path).map_err(|e| EodTraderError::DataUnavailable {
            symbol: symbol.clone(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| EodTraderError::DataUnavailable {
                symbol: symbol.clone(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str: String = field(&record, 0, "date", &symbol)?;
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                EodTraderError::DataUnavailable {
                    symbol: symbol.clone(),
                    reason: format!("invalid date format '{}': {}", date_str, e),
                }
            })?;

            // Volume is sometimes written as a float by upstream downloaders.
            let volume: f64 = field(&record, 5, "volume", &symbol)?;

            bars.push(OhlcvBar {
                symbol: symbol.clone(),
                date,
                open: field(&record, 1, "open", &symbol)?,
                high: field(&record, 2, "high", &symbol)?,
                low: field(&record, 3, "low", &symbol)?,
                close: field(&record, 4, "close", &symbol)?,
                volume: volume.round() as i64,
            });
        }

        if bars.is_empty() {
            return Err(EodTraderError::DataUnavailable {
                symbol,
                reason: format!("{} has no rows", path.display()),
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
