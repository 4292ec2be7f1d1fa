use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::HealthError;
use crate::feed::{BalanceSource, Balances};
use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::state::{Category, CategoryMetrics, Config};

pub struct HttpBalanceSource {
    client: Client,
    url: String,
}

impl HttpBalanceSource {
    pub fn new(cfg: &Config) -> Result<Self, HealthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .build()?;
        Ok(Self { client, url: cfg.balances_url.clone() })
    }
}

#[async_trait]
impl BalanceSource for HttpBalanceSource {
    async fn fetch_balances(&self) -> Result<Balances, HealthError> {
        logging::debug(Domain::Fetch, "request", obj(&[("url", v_str(&self.url))]));
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(HealthError::FetchFailed(format!("HTTP {} from {}", status, self.url)));
        }
        let body = resp.text().await?;
        let balances = decode_balances(&body)?;
        logging::info(
            Domain::Fetch,
            "balances",
            obj(&[
                ("personal_differential", v_num(balances.personal.differential)),
                ("mandatory_differential", v_num(balances.non_negotiable.differential)),
            ]),
        );
        Ok(balances)
    }
}

#[derive(Deserialize, Debug)]
struct RawCategory {
    differential: f64,
    pos: Vec<HashMap<String, f64>>,
    neg: Vec<HashMap<String, f64>>,
}

/// Decode a balances response body. A body that is not JSON at all is a
/// failed fetch. A JSON document with missing categories or fields,
/// non-numeric values, or breakdown entries that are not single-entry maps is
/// malformed. Neither is ever read as zero.
pub fn decode_balances(body: &str) -> Result<Balances, HealthError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| HealthError::FetchFailed(format!("unparseable body: {}", e)))?;

    let mut balances = Balances::default();
    for category in Category::ALL {
        let key = category.api_key();
        let raw = root
            .get(key)
            .ok_or_else(|| HealthError::MalformedResponse(format!("missing {}", key)))?;
        let raw: RawCategory = serde_json::from_value(raw.clone())
            .map_err(|e| HealthError::MalformedResponse(format!("{}: {}", key, e)))?;

        let bank = sum_breakdown(&raw.pos)
            .map_err(|i| HealthError::MalformedResponse(format!("{}.pos[{}] is not a single-entry map", key, i)))?;
        let spent = sum_breakdown(&raw.neg)
            .map_err(|i| HealthError::MalformedResponse(format!("{}.neg[{}] is not a single-entry map", key, i)))?;

        // differential is server-sourced and may legitimately disagree with pos - neg
        if (bank - spent - raw.differential).abs() > 0.005 {
            logging::debug(
                Domain::Fetch,
                "differential_mismatch",
                obj(&[
                    ("category", v_str(category.storage_prefix())),
                    ("differential", v_num(raw.differential)),
                    ("pos_minus_neg", v_num(bank - spent)),
                ]),
            );
        }

        balances.set(category, CategoryMetrics::new(bank, spent, raw.differential));
    }
    Ok(balances)
}

/// Sum of each entry's sole value; `Err(index)` for the first bad entry.
fn sum_breakdown(entries: &[HashMap<String, f64>]) -> Result<f64, usize> {
    entries.iter().enumerate().try_fold(0.0, |acc, (i, entry)| {
        if entry.len() != 1 {
            return Err(i);
        }
        Ok(acc + entry.values().sum::<f64>())
    })
}
