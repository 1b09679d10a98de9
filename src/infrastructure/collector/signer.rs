//! API credentials and HMAC-SHA256 query signing

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;

use crate::shared::errors::CollectorError;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const SECRET_KEY_ENV: &str = "BINANCE_SECRET_KEY";

/// Exchange API key pair, passed explicitly to the client
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Read `BINANCE_API_KEY` and `BINANCE_SECRET_KEY`
    pub fn from_env() -> Result<Self, CollectorError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve both keys through `lookup`; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CollectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(CollectorError::MissingCredential(name))
        };
        Ok(Self::new(read(API_KEY_ENV)?, read(SECRET_KEY_ENV)?))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Hex HMAC-SHA256 of `payload` keyed by the secret
    pub fn sign(&self, payload: &str) -> Result<String, CollectorError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes()).map_err(|_| CollectorError::InvalidKey)?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// URL-encode `params` in key order and append `&signature=<hex>`
    pub fn signed_query(&self, params: &BTreeMap<&str, String>) -> Result<String, CollectorError> {
        let query = serde_urlencoded::to_string(params)?;
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_sign_matches_reference_digest() {
        let creds = Credentials::new(
            "key",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        );
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            creds.sign(payload).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signed_query_sorts_keys() {
        let creds = Credentials::new("key", "secret");
        let params: BTreeMap<&str, String> = [
            ("timestamp", "1700000000000"),
            ("optionType", "CALL"),
            ("investCoin", "BTC"),
            ("exercisedCoin", "USDT"),
            ("pageSize", "100"),
            ("pageIndex", "1"),
            ("recvWindow", "5000"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();

        let query = creds.signed_query(&params).unwrap();
        assert_eq!(
            query,
            "exercisedCoin=USDT&investCoin=BTC&optionType=CALL&pageIndex=1&pageSize=100&recvWindow=5000\
             &timestamp=1700000000000&signature=04a994dee4eb81462af1061bd5959eb8a293d83bd0ffc878173e40d3598bd55f"
        );
    }

    #[test]
    fn test_missing_credentials() {
        let env: HashMap<&str, String> = [(API_KEY_ENV, "abc".to_string()), (SECRET_KEY_ENV, " ".to_string())].into();
        let err = Credentials::from_lookup(|name| env.get(name).cloned()).unwrap_err();
        assert!(matches!(err, CollectorError::MissingCredential(SECRET_KEY_ENV)));

        let err = Credentials::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, CollectorError::MissingCredential(API_KEY_ENV)));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let creds = Credentials::new("visible-key", "visible-secret");
        let text = format!("{:?}", creds);
        assert!(!text.contains("visible"));
    }
}
