use async_trait::async_trait;

use crate::error::HealthError;
use crate::state::{Category, CategoryMetrics};

pub mod balances;

pub use balances::{decode_balances, HttpBalanceSource};

/// Metrics for every category from a single balances response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Balances {
    pub personal: CategoryMetrics,
    pub non_negotiable: CategoryMetrics,
}

impl Balances {
    pub fn get(&self, category: Category) -> CategoryMetrics {
        match category {
            Category::Personal => self.personal,
            Category::NonNegotiable => self.non_negotiable,
        }
    }

    pub fn set(&mut self, category: Category, metrics: CategoryMetrics) {
        match category {
            Category::Personal => self.personal = metrics,
            Category::NonNegotiable => self.non_negotiable = metrics,
        }
    }
}

/// Source of pre-aggregated category balances.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balances(&self) -> Result<Balances, HealthError>;
}

// Fixed-response source; lets the dashboard run without a backend.
pub struct StaticSource {
    body: String,
}

impl StaticSource {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl BalanceSource for StaticSource {
    async fn fetch_balances(&self) -> Result<Balances, HealthError> {
        decode_balances(&self.body)
    }
}
