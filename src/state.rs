use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub balances_url: String,
    pub sqlite_path: String,
    pub fetch_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            balances_url: std::env::var("BALANCES_URL").unwrap_or_else(|_| "http://localhost:8000/balances".to_string()),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./health.sqlite".to_string()),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
        }
    }

    /// Rejects a balances URL that is not absolute http(s).
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.balances_url)
            .map_err(|e| anyhow!("invalid BALANCES_URL {:?}: {}", self.balances_url, e))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(anyhow!("unsupported BALANCES_URL scheme: {}", other)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            balances_url: "http://localhost:8000/balances".to_string(),
            sqlite_path: "./health.sqlite".to_string(),
            fetch_timeout_secs: 10,
        }
    }
}

/// Spending category shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Personal,
    NonNegotiable,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Personal, Category::NonNegotiable];

    /// Prefix for the persisted limit keys.
    pub fn storage_prefix(&self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::NonNegotiable => "nonNegotiable",
        }
    }

    /// Top-level key in the balances response.
    pub fn api_key(&self) -> &'static str {
        match self {
            Category::Personal => "PERSONAL",
            Category::NonNegotiable => "MANDATORY",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Personal => "Personal Spending",
            Category::NonNegotiable => "Non-Negotiable Spending",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_prefix())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "personal" => Ok(Category::Personal),
            "non-negotiable" | "nonnegotiable" | "non_negotiable" | "mandatory" => Ok(Category::NonNegotiable),
            other => Err(anyhow!("unknown category: {}", other)),
        }
    }
}

/// Pre-aggregated balances for one category, replaced wholesale on every fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryMetrics {
    pub bank_balance: f64,
    pub spent_amount: f64,
    /// Server-computed spendable figure, independent of any local limit.
    pub differential: f64,
}

impl CategoryMetrics {
    pub fn new(bank_balance: f64, spent_amount: f64, differential: f64) -> Self {
        Self { bank_balance, spent_amount, differential }
    }
}

/// Persisted per-category spending limit.
///
/// An enabled setting without a value behaves as "no limit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LimitSetting {
    pub enabled: bool,
    pub value: Option<f64>,
}

impl LimitSetting {
    pub fn new(enabled: bool, value: Option<f64>) -> Self {
        Self { enabled, value }
    }

    /// The limit that actually applies, if any.
    pub fn effective_limit(&self) -> Option<f64> {
        if self.enabled {
            self.value
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_keys_are_distinct() {
        assert_ne!(Category::Personal.storage_prefix(), Category::NonNegotiable.storage_prefix());
        assert_eq!(Category::Personal.api_key(), "PERSONAL");
        assert_eq!(Category::NonNegotiable.api_key(), "MANDATORY");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Personal".parse::<Category>().unwrap(), Category::Personal);
        assert_eq!("non-negotiable".parse::<Category>().unwrap(), Category::NonNegotiable);
        assert_eq!("MANDATORY".parse::<Category>().unwrap(), Category::NonNegotiable);
        assert!("savings".parse::<Category>().is_err());
    }

    #[test]
    fn test_effective_limit_requires_enabled_and_value() {
        assert_eq!(LimitSetting::new(true, Some(200.0)).effective_limit(), Some(200.0));
        assert_eq!(LimitSetting::new(false, Some(200.0)).effective_limit(), None);
        assert_eq!(LimitSetting::new(true, None).effective_limit(), None);
        assert_eq!(LimitSetting::default().effective_limit(), None);
    }

    #[test]
    fn test_config_validate() {
        let mut cfg = Config::default();
        assert!(cfg.validate().is_ok());
        cfg.balances_url = "not a url".to_string();
        assert!(cfg.validate().is_err());
        cfg.balances_url = "ftp://localhost/balances".to_string();
        assert!(cfg.validate().is_err());
    }
}
