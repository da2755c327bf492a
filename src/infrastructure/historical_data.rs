//! CSV-backed historical data store.
//!
//! Reads `trades.csv` and `candles.csv` from a directory. Both files carry a
//! header row followed by columns in fixed order:
//!
//! - trades: `open_time, close_time, direction, entry_price, exit_price, volume, profit, profit_percent, is_profitable`
//! - candles: `time, open, high, low, close, volume`
//!
//! Malformed rows are skipped with a warning; a missing file is an empty set.

use crate::domain::errors::HistoricalDataError;
use crate::domain::ports::StrategyHost;
use crate::domain::repositories::HistoricalDataRepository;
use crate::domain::trading::types::{HistoricalCandle, HistoricalTrade, TradeDirection};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

pub const TRADES_FILE: &str = "trades.csv";
pub const CANDLES_FILE: &str = "candles.csv";

const TRADE_COLUMNS: usize = 9;
const CANDLE_COLUMNS: usize = 6;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y.%m.%d %H:%M:%S"];

pub struct CsvHistoricalDataStore {
    data_dir: PathBuf,
}

impl CsvHistoricalDataStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Store rooted at the host's data path, if the host exposes one
    pub fn from_host(host: &dyn StrategyHost) -> Option<Self> {
        host.historical_data_path().map(Self::new)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn read_records(&self, file_name: &str) -> Result<Vec<StringRecord>> {
        let path = self.data_dir.join(file_name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Historical data file {:?} not found, treating as empty", path);
            return Ok(Vec::new());
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(HistoricalDataError::from)
            .with_context(|| format!("Failed to read {:?}", path))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes.as_slice());

        let mut records = Vec::new();
        for result in reader.records() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable row in {}: {}",
                    file_name,
                    HistoricalDataError::from(e)
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl HistoricalDataRepository for CsvHistoricalDataStore {
    async fn load_trades(&self) -> Result<Vec<HistoricalTrade>> {
        let records = self.read_records(TRADES_FILE).await?;
        let trades = parse_rows(&records, TRADES_FILE, parse_trade);
        debug!("Loaded {} historical trades from {:?}", trades.len(), self.data_dir);
        Ok(trades)
    }

    async fn load_candles(&self) -> Result<Vec<HistoricalCandle>> {
        let records = self.read_records(CANDLES_FILE).await?;
        let candles = parse_rows(&records, CANDLES_FILE, parse_candle);
        debug!("Loaded {} candles from {:?}", candles.len(), self.data_dir);
        Ok(candles)
    }
}

fn parse_rows<T>(
    records: &[StringRecord],
    file_name: &str,
    parse: fn(&StringRecord, u64) -> Result<T, HistoricalDataError>,
) -> Vec<T> {
    records
        .iter()
        .filter_map(|record| {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            match parse(record, line) {
                Ok(row) => Some(row),
                Err(e) => {
                    warn!("Skipping row in {}: {}", file_name, e);
                    None
                }
            }
        })
        .collect()
}

pub fn parse_trade(record: &StringRecord, line: u64) -> Result<HistoricalTrade, HistoricalDataError> {
    check_width(record, TRADE_COLUMNS, line)?;
    let direction = TradeDirection::from_str(field(record, 2, line)?).map_err(|e| {
        HistoricalDataError::MalformedRow {
            line,
            reason: e.to_string(),
        }
    })?;

    Ok(HistoricalTrade {
        open_time: parse_timestamp(field(record, 0, line)?, line)?,
        close_time: parse_timestamp(field(record, 1, line)?, line)?,
        direction,
        entry_price: parse_decimal(field(record, 3, line)?, line)?,
        exit_price: parse_decimal(field(record, 4, line)?, line)?,
        volume: parse_decimal(field(record, 5, line)?, line)?,
        profit: parse_decimal(field(record, 6, line)?, line)?,
        profit_percent: parse_decimal(field(record, 7, line)?, line)?,
        is_profitable: parse_bool(field(record, 8, line)?, line)?,
    })
}

pub fn parse_candle(record: &StringRecord, line: u64) -> Result<HistoricalCandle, HistoricalDataError> {
    check_width(record, CANDLE_COLUMNS, line)?;
    Ok(HistoricalCandle {
        time: parse_timestamp(field(record, 0, line)?, line)?,
        open: parse_decimal(field(record, 1, line)?, line)?,
        high: parse_decimal(field(record, 2, line)?, line)?,
        low: parse_decimal(field(record, 3, line)?, line)?,
        close: parse_decimal(field(record, 4, line)?, line)?,
        volume: parse_decimal(field(record, 5, line)?, line)?,
    })
}

fn check_width(record: &StringRecord, expected: usize, line: u64) -> Result<(), HistoricalDataError> {
    if record.len() < expected {
        return Err(HistoricalDataError::MalformedRow {
            line,
            reason: format!("expected {} columns, found {}", expected, record.len()),
        });
    }
    Ok(())
}

fn field(record: &StringRecord, index: usize, line: u64) -> Result<&str, HistoricalDataError> {
    record
        .get(index)
        .ok_or_else(|| HistoricalDataError::MalformedRow {
            line,
            reason: format!("missing column {}", index),
        })
}

/// Accepts RFC 3339, `%Y-%m-%d %H:%M:%S`, `%Y.%m.%d %H:%M:%S` (UTC) or Unix seconds
pub fn parse_timestamp(value: &str, line: u64) -> Result<DateTime<Utc>, HistoricalDataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(seconds) = value.parse::<i64>()
        && let Some(dt) = DateTime::from_timestamp(seconds, 0)
    {
        return Ok(dt);
    }
    Err(HistoricalDataError::MalformedRow {
        line,
        reason: format!("invalid timestamp '{}'", value),
    })
}

fn parse_decimal(value: &str, line: u64) -> Result<Decimal, HistoricalDataError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| HistoricalDataError::MalformedRow {
            line,
            reason: format!("invalid number '{}': {}", value, e),
        })
}

fn parse_bool(value: &str, line: u64) -> Result<bool, HistoricalDataError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(HistoricalDataError::MalformedRow {
            line,
            reason: format!("invalid boolean '{}'", value),
        }),
    }
}
