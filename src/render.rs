use std::fmt::Write;

use crate::dashboard::{CardView, DashboardView};
use crate::format::format_currency;
use crate::gauge::{GaugeProportion, ARC_DEGREES};

pub const GAUGE_WIDTH: usize = 24;

/// Half-circle gauge flattened into a bar: `#` spent, `-` remaining.
pub fn gauge_bar(g: &GaugeProportion, width: usize) -> String {
    if g.total() <= 0.0 {
        return format!("[{}]", " ".repeat(width));
    }
    let spent = ((g.spent_degrees() / ARC_DEGREES) * width as f64).round() as usize;
    let spent = spent.min(width);
    format!("[{}{}]", "#".repeat(spent), "-".repeat(width - spent))
}

pub fn render_card(card: &CardView) -> String {
    let mut out = String::new();
    let marker = if card.expanded { "v" } else { ">" };
    let _ = writeln!(out, "{} {}", marker, card.label);
    let _ = writeln!(out, "    {}", card.spendable_display);
    let _ = writeln!(
        out,
        "    {} spent {} / remaining {}",
        gauge_bar(&card.gauge, GAUGE_WIDTH),
        format_currency(card.gauge.spent_slice),
        format_currency(card.gauge.remaining_slice),
    );
    if card.expanded {
        let _ = writeln!(out, "    bank balance  {}", format_currency(card.metrics.bank_balance));
        let _ = writeln!(out, "    spent         {}", format_currency(card.metrics.spent_amount));
        let _ = writeln!(out, "    differential  {}", format_currency(card.metrics.differential));
        let limit = match card.limit.value {
            Some(v) => format_currency(v),
            None => "none".to_string(),
        };
        let state = if card.limit.enabled { "on" } else { "off" };
        let _ = writeln!(out, "    limit         {} ({})", limit, state);
    }
    out
}

pub fn render(view: &DashboardView) -> String {
    let mut out = String::from("Health\n");
    match &view.status_detail {
        Some(detail) => {
            let _ = writeln!(out, "  ! {}: {}", view.status, detail);
        }
        None if view.status == "pending" => {
            let _ = writeln!(out, "  loading...");
        }
        None => {}
    }
    out.push('\n');
    for card in &view.cards {
        out.push_str(&render_card(card));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge::gauge;

    #[test]
    fn test_gauge_bar_proportions() {
        assert_eq!(gauge_bar(&gauge(1000.0, 300.0, Some(400.0)), 4), "[###-]");
        assert_eq!(gauge_bar(&gauge(500.0, 600.0, Some(200.0)), 4), "[####]");
        assert_eq!(gauge_bar(&gauge(1000.0, 0.0, None), 4), "[----]");
        assert_eq!(gauge_bar(&gauge(0.0, 0.0, None), 4), "[    ]");
    }
}
