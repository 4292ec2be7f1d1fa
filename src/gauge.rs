use serde::Serialize;

pub const ARC_DEGREES: f64 = 180.0;

/// Two-slice split of a half-circle gauge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeProportion {
    /// Passed through unclamped, even past the effective total.
    pub spent_slice: f64,
    /// Never negative.
    pub remaining_slice: f64,
}

impl GaugeProportion {
    pub fn total(&self) -> f64 {
        self.spent_slice + self.remaining_slice
    }

    pub fn spent_degrees(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        (ARC_DEGREES * self.spent_slice / total).clamp(0.0, ARC_DEGREES)
    }

    pub fn remaining_degrees(&self) -> f64 {
        if self.total() <= 0.0 {
            return 0.0;
        }
        ARC_DEGREES - self.spent_degrees()
    }
}

/// Lesser of the limit and the bank balance; the bank balance when no limit applies.
pub fn effective_total(bank_balance: f64, limit: Option<f64>) -> f64 {
    match limit {
        Some(l) if l < bank_balance => l,
        _ => bank_balance,
    }
}

pub fn gauge(bank_balance: f64, spent_amount: f64, limit: Option<f64>) -> GaugeProportion {
    let total = effective_total(bank_balance, limit);
    GaugeProportion {
        spent_slice: spent_amount,
        remaining_slice: (total - spent_amount).max(0.0),
    }
}
