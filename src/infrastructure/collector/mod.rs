//! Exchange dual-investment product collector
//!
//! Polls the signed product-list endpoint for every configured coin and
//! option type, walks its pages, and appends each page to a sink.

pub mod client;
pub mod scheduler;
pub mod signer;
pub mod sink;

pub use client::{BinanceProductClient, ProductSource};
pub use scheduler::{CollectorScheduler, CycleSummary, RunSummary};
pub use signer::Credentials;
pub use sink::{JsonLinesSink, ProductSink};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Put,
    Call,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Put => "PUT",
            OptionType::Call => "CALL",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUT" => Ok(OptionType::Put),
            "CALL" => Ok(OptionType::Call),
            other => Err(format!("unknown option type '{}', expected PUT or CALL", other)),
        }
    }
}

/// One (coin, option type) product listing to walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub coin: String,
    pub option_type: OptionType,
    pub quote_coin: String,
}

impl ProductQuery {
    /// CALL settles in the quote coin; PUT settles in the base coin
    pub fn exercised_coin(&self) -> &str {
        match self.option_type {
            OptionType::Call => &self.quote_coin,
            OptionType::Put => &self.coin,
        }
    }

    pub fn invest_coin(&self) -> &str {
        match self.option_type {
            OptionType::Call => &self.coin,
            OptionType::Put => &self.quote_coin,
        }
    }
}

impl fmt::Display for ProductQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.coin, self.option_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub invest_coin: String,
    pub exercised_coin: String,
    pub strike_price: String,
    pub duration: i64,
    pub settle_date: i64,
    pub purchase_decimal: i64,
    pub purchase_end_time: i64,
    pub can_purchase: bool,
    pub apr: String,
    pub order_id: i64,
    pub min_amount: String,
    pub max_amount: String,
    pub create_timestamp: i64,
    pub option_type: String,
    pub is_auto_compound_enable: bool,
    pub auto_compound_plan_list: Vec<String>,
}

/// One page of the product list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub total: u64,
    pub list: Vec<Product>,
}

impl ProductPage {
    /// No further page exists after `page_index`
    pub fn is_last(&self, page_index: u32, page_size: u32) -> bool {
        self.list.is_empty() || u64::from(page_index) * u64::from(page_size) >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_routing_by_option_type() {
        let call = ProductQuery {
            coin: "BTC".to_string(),
            option_type: OptionType::Call,
            quote_coin: "USDT".to_string(),
        };
        assert_eq!((call.exercised_coin(), call.invest_coin()), ("USDT", "BTC"));

        let put = ProductQuery {
            option_type: OptionType::Put,
            ..call
        };
        assert_eq!((put.exercised_coin(), put.invest_coin()), ("BTC", "USDT"));
    }

    #[test]
    fn test_last_page_detection() {
        let page = |total: u64, n: usize| ProductPage {
            total,
            list: vec![Product::default(); n],
        };
        assert!(!page(250, 100).is_last(1, 100));
        assert!(!page(250, 100).is_last(2, 100));
        assert!(page(250, 50).is_last(3, 100));
        assert!(page(100, 100).is_last(1, 100));
        assert!(page(500, 0).is_last(2, 100));
    }

    #[test]
    fn test_product_deserializes_partial_payload() {
        let json = r#"{"id":"741590","investCoin":"USDT","exercisedCoin":"BTC","strikePrice":"60000",
            "duration":3,"settleDate":1709020800000,"canPurchase":true,"apr":"0.4375","optionType":"PUT"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "741590");
        assert_eq!(product.duration, 3);
        assert!(product.can_purchase);
        assert!(product.auto_compound_plan_list.is_empty());
        assert_eq!("call".parse::<OptionType>().unwrap(), OptionType::Call);
    }
}
