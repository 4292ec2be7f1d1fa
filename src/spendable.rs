use crate::state::{CategoryMetrics, LimitSetting};

/// Spendable amount shown for a category.
///
/// A binding limit (enabled, present, strictly below the bank balance) yields
/// `limit - spent`, which may be negative. Otherwise the server's
/// `differential` is shown as-is.
pub fn compute(metrics: &CategoryMetrics, setting: &LimitSetting) -> f64 {
    match binding_limit(metrics, setting) {
        Some(limit) => limit - metrics.spent_amount,
        None => metrics.differential,
    }
}

pub fn binding_limit(metrics: &CategoryMetrics, setting: &LimitSetting) -> Option<f64> {
    setting.effective_limit().filter(|limit| *limit < metrics.bank_balance)
}

/// Lenient parse of user limit input. Anything that is not a finite number
/// means "no limit".
pub fn parse_limit_input(input: &str) -> Option<f64> {
    let trimmed = input.trim().trim_start_matches('$').replace(',', "");
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(bank: f64, spent: f64, diff: f64) -> CategoryMetrics {
        CategoryMetrics::new(bank, spent, diff)
    }

    #[test]
    fn test_limit_below_spent_goes_negative() {
        let v = compute(&m(500.0, 600.0, -100.0), &LimitSetting::new(true, Some(200.0)));
        assert_eq!(v, -400.0);
    }

    #[test]
    fn test_limit_above_bank_uses_differential() {
        let v = compute(&m(1000.0, 300.0, 650.0), &LimitSetting::new(true, Some(1200.0)));
        assert_eq!(v, 650.0);
    }

    #[test]
    fn test_limit_equal_to_bank_is_not_binding() {
        let v = compute(&m(1000.0, 300.0, 690.0), &LimitSetting::new(true, Some(1000.0)));
        assert_eq!(v, 690.0);
        let v = compute(&m(1000.0, 300.0, 690.0), &LimitSetting::new(true, Some(999.99)));
        assert!((v - 699.99).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_limit_ignored() {
        let v = compute(&m(1000.0, 300.0, 700.0), &LimitSetting::new(false, Some(200.0)));
        assert_eq!(v, 700.0);
    }

    #[test]
    fn test_enabled_without_value_is_no_limit() {
        let v = compute(&m(1000.0, 300.0, 700.0), &LimitSetting::new(true, None));
        assert_eq!(v, 700.0);
    }

    #[test]
    fn test_differential_not_recomputed() {
        // server figure deliberately disagrees with bank - spent
        let v = compute(&m(1000.0, 300.0, 42.0), &LimitSetting::default());
        assert_eq!(v, 42.0);
    }

    #[test]
    fn test_parse_limit_input() {
        assert_eq!(parse_limit_input("200"), Some(200.0));
        assert_eq!(parse_limit_input(" 1,250.75 "), Some(1250.75));
        assert_eq!(parse_limit_input("$300"), Some(300.0));
        assert_eq!(parse_limit_input(""), None);
        assert_eq!(parse_limit_input("abc"), None);
        assert_eq!(parse_limit_input("inf"), None);
    }
}
