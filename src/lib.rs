pub mod dashboard;
pub mod error;
pub mod feed;
pub mod format;
pub mod gauge;
pub mod logging;
pub mod render;
pub mod spendable;
pub mod state;
pub mod storage;

pub use dashboard::{DashboardEvent, EventTarget, FetchStatus, HealthDashboard};
pub use error::HealthError;
pub use state::{Category, CategoryMetrics, Config, LimitSetting};
pub use storage::LimitStore;
