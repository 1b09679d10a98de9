//! Destinations for fetched product pages

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use super::{OptionType, Product, ProductPage, ProductQuery};
use crate::shared::errors::CollectorError;

pub trait ProductSink: Send {
    fn record(&mut self, query: &ProductQuery, page_index: u32, page: &ProductPage) -> Result<(), CollectorError>;
}

#[derive(Serialize)]
struct PageRecord<'a> {
    fetched_at: DateTime<Utc>,
    coin: &'a str,
    option_type: OptionType,
    page_index: u32,
    total: u64,
    list: &'a [Product],
}

/// Writes one JSON object per page, newline separated
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<RollingFileAppender> {
    /// Append to `dir/prefix.YYYY-MM-DD`, rolling over at midnight UTC
    pub fn daily<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<Self, CollectorError> {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(prefix)
            .build(dir)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Self::new(appender))
    }
}

impl<W: Write + Send> ProductSink for JsonLinesSink<W> {
    fn record(&mut self, query: &ProductQuery, page_index: u32, page: &ProductPage) -> Result<(), CollectorError> {
        let record = PageRecord {
            fetched_at: Utc::now(),
            coin: &query.coin,
            option_type: query.option_type,
            page_index,
            total: page.total,
            list: &page.list,
        };
        serde_json::to_writer(&mut self.writer, &record).map_err(io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_page_is_one_json_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let query = ProductQuery {
            coin: "BTC".to_string(),
            option_type: OptionType::Call,
            quote_coin: "USDT".to_string(),
        };
        let page = ProductPage {
            total: 1,
            list: vec![Product {
                id: "42".to_string(),
                strike_price: "70000".to_string(),
                ..Product::default()
            }],
        };
        sink.record(&query, 1, &page).unwrap();
        sink.record(&query, 2, &ProductPage { total: 1, list: vec![] }).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["coin"], "BTC");
        assert_eq!(lines[0]["option_type"], "CALL");
        assert_eq!(lines[0]["list"][0]["strikePrice"], "70000");
        assert_eq!(lines[1]["page_index"], 2);
    }

    #[test]
    fn test_daily_sink_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::daily(dir.path(), "products.log").unwrap();
        let query = ProductQuery {
            coin: "ETH".to_string(),
            option_type: OptionType::Put,
            quote_coin: "USDT".to_string(),
        };
        sink.record(&query, 1, &ProductPage { total: 0, list: vec![] }).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let name = files[0].as_ref().unwrap().file_name().into_string().unwrap();
        assert!(name.starts_with("products.log"));
    }
}
