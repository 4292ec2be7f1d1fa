//! Dashboard orchestration.
//!
//! Three state containers with separate lifecycles live here: fetched
//! metrics (replaced wholesale per fetch), limit settings (mirrored from the
//! `LimitStore` after every write) and per-card UI flags (never persisted).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::error::HealthError;
use crate::feed::{BalanceSource, Balances};
use crate::format::format_currency;
use crate::gauge::{gauge, GaugeProportion};
use crate::logging::{self, obj, v_num, v_opt, v_str, Domain};
use crate::spendable::{compute, parse_limit_input};
use crate::state::{Category, CategoryMetrics, LimitSetting};
use crate::storage::LimitStore;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    Idle,
    Pending,
    Loaded,
    FetchFailed(String),
    Malformed(String),
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Idle => "idle",
            FetchStatus::Pending => "pending",
            FetchStatus::Loaded => "loaded",
            FetchStatus::FetchFailed(_) => "fetch_failed",
            FetchStatus::Malformed(_) => "malformed_response",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            FetchStatus::FetchFailed(msg) | FetchStatus::Malformed(msg) => Some(msg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CardUi {
    pub expanded: bool,
}

/// Which control on a card received the interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTarget {
    /// The card body; toggles expand/collapse.
    Card,
    LimitToggle,
    LimitInput(String),
    LimitClear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardEvent {
    pub category: Category,
    pub target: EventTarget,
}

impl DashboardEvent {
    pub fn new(category: Category, target: EventTarget) -> Self {
        Self { category, target }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CardView {
    pub category: Category,
    pub label: &'static str,
    pub metrics: CategoryMetrics,
    pub limit: LimitSetting,
    pub spendable: f64,
    pub spendable_display: String,
    pub gauge: GaugeProportion,
    pub expanded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub status: &'static str,
    pub status_detail: Option<String>,
    pub cards: Vec<CardView>,
}

struct PendingFetch {
    rx: oneshot::Receiver<Result<Balances, HealthError>>,
    task: JoinHandle<()>,
}

pub struct HealthDashboard {
    store: LimitStore,
    metrics: HashMap<Category, CategoryMetrics>,
    limits: HashMap<Category, LimitSetting>,
    ui: HashMap<Category, CardUi>,
    status: FetchStatus,
    pending: Option<PendingFetch>,
    fetch_started: bool,
    torn_down: bool,
}

impl HealthDashboard {
    pub fn new(store: LimitStore) -> Result<Self, HealthError> {
        let mut limits = HashMap::new();
        for c in Category::ALL {
            limits.insert(c, store.get(c)?);
        }
        Ok(Self {
            store,
            metrics: Category::ALL.iter().map(|c| (*c, CategoryMetrics::default())).collect(),
            limits,
            ui: Category::ALL.iter().map(|c| (*c, CardUi::default())).collect(),
            status: FetchStatus::Idle,
            pending: None,
            fetch_started: false,
            torn_down: false,
        })
    }

    // =========================================================================
    // Fetch lifecycle
    // =========================================================================

    /// Spawn the one fetch this dashboard will ever make. Must be called
    /// inside a tokio runtime. Later calls are ignored.
    pub fn start_fetch(&mut self, source: Arc<dyn BalanceSource>) {
        if self.fetch_started || self.torn_down {
            logging::warn(
                Domain::Dashboard,
                "fetch_ignored",
                obj(&[("torn_down", Value::Bool(self.torn_down))]),
            );
            return;
        }
        self.fetch_started = true;
        self.status = FetchStatus::Pending;

        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let result = source.fetch_balances().await;
            // receiver is gone after teardown; the result is dropped
            let _ = tx.send(result);
        });
        self.pending = Some(PendingFetch { rx, task });
        logging::debug(Domain::Dashboard, "fetch_started", obj(&[]));
    }

    /// Apply a finished fetch without blocking. Returns true once the
    /// pending fetch has been resolved.
    pub fn poll_fetch(&mut self) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        let result = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Closed) => Err(HealthError::FetchFailed("fetch task ended without a result".to_string())),
        };
        self.pending = None;
        self.apply_fetch(result);
        true
    }

    pub async fn wait_fetch(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let result = match pending.rx.await {
            Ok(result) => result,
            Err(_) => Err(HealthError::FetchFailed("fetch task ended without a result".to_string())),
        };
        self.apply_fetch(result);
    }

    pub async fn load(&mut self, source: Arc<dyn BalanceSource>) {
        self.start_fetch(source);
        self.wait_fetch().await;
    }

    /// Metrics are replaced wholesale on success. On failure the previously
    /// displayed metrics stay.
    pub fn apply_fetch(&mut self, result: Result<Balances, HealthError>) {
        if self.torn_down {
            logging::info(Domain::Dashboard, "late_result_discarded", obj(&[]));
            return;
        }
        match result {
            Ok(balances) => {
                for c in Category::ALL {
                    self.metrics.insert(c, balances.get(c));
                }
                self.status = FetchStatus::Loaded;
                logging::info(Domain::Dashboard, "metrics_loaded", obj(&[]));
            }
            Err(err) => {
                logging::warn(
                    Domain::Dashboard,
                    "fetch_error",
                    obj(&[("kind", v_str(err.kind())), ("msg", v_str(&err.to_string()))]),
                );
                self.status = match err {
                    HealthError::MalformedResponse(msg) => FetchStatus::Malformed(msg),
                    other => FetchStatus::FetchFailed(other.to_string()),
                };
            }
        }
    }

    /// Stop the pending fetch; anything that still arrives is discarded.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
        logging::debug(Domain::Dashboard, "teardown", obj(&[]));
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn status(&self) -> &FetchStatus {
        &self.status
    }

    // =========================================================================
    // Limits
    // =========================================================================

    pub fn toggle_limit(&mut self, category: Category) -> Result<(), HealthError> {
        let enabled = !self.limit(category).enabled;
        self.set_limit_enabled(category, enabled)
    }

    pub fn set_limit_enabled(&mut self, category: Category, enabled: bool) -> Result<(), HealthError> {
        self.store.set_enabled(category, enabled)?;
        self.reload_limit(category)
    }

    /// Non-numeric input clears the value.
    pub fn edit_limit(&mut self, category: Category, input: &str) -> Result<(), HealthError> {
        let value = parse_limit_input(input);
        if value.is_none() && !input.trim().is_empty() {
            logging::info(
                Domain::Limits,
                "non_numeric_input",
                obj(&[("category", v_str(category.storage_prefix())), ("input", v_str(input))]),
            );
        }
        self.set_limit_value(category, value)
    }

    pub fn set_limit_value(&mut self, category: Category, value: Option<f64>) -> Result<(), HealthError> {
        self.store.set_value(category, value)?;
        self.reload_limit(category)
    }

    pub fn clear_limit(&mut self, category: Category) -> Result<(), HealthError> {
        self.set_limit_value(category, None)
    }

    fn reload_limit(&mut self, category: Category) -> Result<(), HealthError> {
        let setting = self.store.get(category)?;
        self.limits.insert(category, setting);
        Ok(())
    }

    // =========================================================================
    // UI state
    // =========================================================================

    pub fn toggle_expanded(&mut self, category: Category) {
        let card = self.ui.entry(category).or_default();
        card.expanded = !card.expanded;
    }

    pub fn is_expanded(&self, category: Category) -> bool {
        self.ui.get(&category).map(|c| c.expanded).unwrap_or(false)
    }

    /// Only `Card` events reach the expand flag; nested controls stop there.
    pub fn handle(&mut self, event: DashboardEvent) -> Result<(), HealthError> {
        let DashboardEvent { category, target } = event;
        logging::debug(
            Domain::Dashboard,
            "event",
            obj(&[("category", v_str(category.storage_prefix())), ("target", v_str(&format!("{:?}", target)))]),
        );
        match target {
            EventTarget::Card => {
                self.toggle_expanded(category);
                Ok(())
            }
            EventTarget::LimitToggle => self.toggle_limit(category),
            EventTarget::LimitInput(text) => self.edit_limit(category, &text),
            EventTarget::LimitClear => self.clear_limit(category),
        }
    }

    // =========================================================================
    // Derived figures
    // =========================================================================

    pub fn metrics(&self, category: Category) -> CategoryMetrics {
        self.metrics.get(&category).copied().unwrap_or_default()
    }

    pub fn limit(&self, category: Category) -> LimitSetting {
        self.limits.get(&category).copied().unwrap_or_default()
    }

    pub fn spendable(&self, category: Category) -> f64 {
        compute(&self.metrics(category), &self.limit(category))
    }

    pub fn gauge(&self, category: Category) -> GaugeProportion {
        let m = self.metrics(category);
        gauge(m.bank_balance, m.spent_amount, self.limit(category).effective_limit())
    }

    pub fn card(&self, category: Category) -> CardView {
        let spendable = self.spendable(category);
        CardView {
            category,
            label: category.label(),
            metrics: self.metrics(category),
            limit: self.limit(category),
            spendable,
            spendable_display: format_currency(spendable),
            gauge: self.gauge(category),
            expanded: self.is_expanded(category),
        }
    }

    pub fn view(&self) -> DashboardView {
        let cards: Vec<CardView> = Category::ALL.iter().map(|c| self.card(*c)).collect();
        for card in &cards {
            logging::debug(
                Domain::Dashboard,
                "card",
                obj(&[
                    ("category", v_str(card.category.storage_prefix())),
                    ("spendable", v_num(card.spendable)),
                    ("limit", v_opt(card.limit.effective_limit())),
                    ("remaining_slice", v_num(card.gauge.remaining_slice)),
                ]),
            );
        }
        DashboardView {
            status: self.status.as_str(),
            status_detail: self.status.detail().map(str::to_string),
            cards,
        }
    }
}

impl Drop for HealthDashboard {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::StaticSource;

    const BODY: &str = r#"{
        "PERSONAL":  { "differential": -100.0, "pos": [{"checking": 500.0}], "neg": [{"visa": 600.0}] },
        "MANDATORY": { "differential": 650.0, "pos": [{"bills": 1000.0}], "neg": [{"rent": 300.0}] }
    }"#;

    fn dashboard() -> HealthDashboard {
        HealthDashboard::new(LimitStore::memory()).unwrap()
    }

    #[test]
    fn test_initial_state_is_zero() {
        let d = dashboard();
        assert_eq!(d.status(), &FetchStatus::Idle);
        for c in Category::ALL {
            assert_eq!(d.metrics(c), CategoryMetrics::default());
            assert_eq!(d.spendable(c), 0.0);
            assert!(!d.is_expanded(c));
        }
    }

    #[tokio::test]
    async fn test_load_applies_metrics() {
        let mut d = dashboard();
        d.load(Arc::new(StaticSource::new(BODY))).await;
        assert_eq!(d.status(), &FetchStatus::Loaded);
        assert_eq!(d.metrics(Category::Personal), CategoryMetrics::new(500.0, 600.0, -100.0));
        assert_eq!(d.spendable(Category::NonNegotiable), 650.0);
    }

    #[tokio::test]
    async fn test_overspent_limit_scenario() {
        let mut d = dashboard();
        d.load(Arc::new(StaticSource::new(BODY))).await;
        d.edit_limit(Category::Personal, "200").unwrap();
        d.set_limit_enabled(Category::Personal, true).unwrap();

        assert_eq!(d.spendable(Category::Personal), -400.0);
        let g = d.gauge(Category::Personal);
        assert_eq!(g.spent_slice, 600.0);
        assert_eq!(g.remaining_slice, 0.0);
        assert_eq!(d.card(Category::Personal).spendable_display, "-$400.00");
    }

    #[tokio::test]
    async fn test_disable_reverts_to_differential() {
        let mut d = dashboard();
        d.load(Arc::new(StaticSource::new(BODY))).await;
        d.set_limit_value(Category::NonNegotiable, Some(200.0)).unwrap();
        d.toggle_limit(Category::NonNegotiable).unwrap();
        assert_eq!(d.spendable(Category::NonNegotiable), -100.0);

        d.toggle_limit(Category::NonNegotiable).unwrap();
        assert_eq!(d.limit(Category::NonNegotiable).value, Some(200.0));
        assert_eq!(d.spendable(Category::NonNegotiable), 650.0);
        assert_eq!(d.gauge(Category::NonNegotiable).remaining_slice, 700.0);
    }

    #[tokio::test]
    async fn test_malformed_keeps_prior_metrics() {
        let mut d = dashboard();
        d.load(Arc::new(StaticSource::new(r#"{"PERSONAL": {}}"#))).await;
        assert!(matches!(d.status(), FetchStatus::Malformed(_)));
        assert_eq!(d.metrics(Category::Personal), CategoryMetrics::default());
        assert_eq!(d.view().status, "malformed_response");
    }

    #[tokio::test]
    async fn test_single_fetch_per_lifetime() {
        let mut d = dashboard();
        d.load(Arc::new(StaticSource::new(BODY))).await;
        d.start_fetch(Arc::new(StaticSource::new("garbage")));
        assert!(!d.poll_fetch());
        assert_eq!(d.status(), &FetchStatus::Loaded);
    }

    #[test]
    fn test_late_result_after_teardown_discarded() {
        let mut d = dashboard();
        d.teardown();
        d.apply_fetch(Ok(Balances {
            personal: CategoryMetrics::new(1.0, 2.0, 3.0),
            ..Default::default()
        }));
        assert_eq!(d.metrics(Category::Personal), CategoryMetrics::default());
        assert_eq!(d.status(), &FetchStatus::Idle);
    }

    #[test]
    fn test_nested_controls_do_not_toggle_expand() {
        let mut d = dashboard();
        d.handle(DashboardEvent::new(Category::Personal, EventTarget::Card)).unwrap();
        assert!(d.is_expanded(Category::Personal));
        assert!(!d.is_expanded(Category::NonNegotiable));

        d.handle(DashboardEvent::new(Category::Personal, EventTarget::LimitToggle)).unwrap();
        d.handle(DashboardEvent::new(Category::Personal, EventTarget::LimitInput("50".into()))).unwrap();
        d.handle(DashboardEvent::new(Category::Personal, EventTarget::LimitClear)).unwrap();
        assert!(d.is_expanded(Category::Personal));
        assert!(d.limit(Category::Personal).enabled);
        assert_eq!(d.limit(Category::Personal).value, None);

        d.handle(DashboardEvent::new(Category::Personal, EventTarget::Card)).unwrap();
        assert!(!d.is_expanded(Category::Personal));
    }

    #[test]
    fn test_non_numeric_input_clears_value() {
        let mut d = dashboard();
        d.edit_limit(Category::Personal, "300").unwrap();
        assert_eq!(d.limit(Category::Personal).value, Some(300.0));
        d.edit_limit(Category::Personal, "lots").unwrap();
        assert_eq!(d.limit(Category::Personal).value, None);
    }
}
