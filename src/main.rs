use std::sync::Arc;

use anyhow::{anyhow, Result};
use finhealth::dashboard::{DashboardEvent, EventTarget, HealthDashboard};
use finhealth::error::HealthError;
use finhealth::feed::HttpBalanceSource;
use finhealth::logging::{self, obj, v_str, Domain};
use finhealth::render::render;
use finhealth::state::{Category, Config};
use finhealth::storage::LimitStore;

const USAGE: &str = "usage: finhealth [--memory] [--json] [show | expand <category> | limit <category> <amount> | clear <category> | enable <category> | disable <category> | toggle <category>]";

#[derive(Debug, PartialEq)]
enum Command {
    Show,
    Expand(Category),
    Event(DashboardEvent),
    SetEnabled(Category, bool),
}

struct Args {
    memory: bool,
    json: bool,
    command: Command,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut memory = false;
    let mut json = false;
    let mut rest = Vec::new();
    for arg in raw {
        match arg.as_str() {
            "--memory" => memory = true,
            "--json" => json = true,
            _ => rest.push(arg.as_str()),
        }
    }

    let category = |i: usize| -> Result<Category> {
        rest.get(i).ok_or_else(|| anyhow!("missing category\n{}", USAGE))?.parse()
    };

    let command = match rest.first().copied() {
        None | Some("show") => Command::Show,
        Some("expand") => Command::Expand(category(1)?),
        Some("limit") => {
            let amount = rest.get(2).ok_or_else(|| anyhow!("missing amount\n{}", USAGE))?;
            Command::Event(DashboardEvent::new(category(1)?, EventTarget::LimitInput(amount.to_string())))
        }
        Some("clear") => Command::Event(DashboardEvent::new(category(1)?, EventTarget::LimitClear)),
        Some("toggle") => Command::Event(DashboardEvent::new(category(1)?, EventTarget::LimitToggle)),
        Some("enable") => Command::SetEnabled(category(1)?, true),
        Some("disable") => Command::SetEnabled(category(1)?, false),
        Some(other) => return Err(anyhow!("unknown command: {}\n{}", other, USAGE)),
    };
    Ok(Args { memory, json, command })
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let cfg = Config::from_env();
    cfg.validate()?;
    logging::info(
        Domain::System,
        "startup",
        obj(&[("balances_url", v_str(&cfg.balances_url)), ("sqlite_path", v_str(&cfg.sqlite_path))]),
    );

    let store = if args.memory {
        LimitStore::memory()
    } else {
        LimitStore::sqlite(&cfg.sqlite_path)?
    };
    let mut dashboard = HealthDashboard::new(store)?;

    // fetch runs while the command writes its limit changes
    let source = Arc::new(HttpBalanceSource::new(&cfg)?);
    dashboard.start_fetch(source);

    apply_command(&mut dashboard, args.command)?;
    dashboard.wait_fetch().await;

    let view = dashboard.view();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", render(&view));
    }

    logging::info(Domain::System, "shutdown", obj(&[("status", v_str(view.status))]));
    Ok(())
}

/// A failed command tears the dashboard down so the pending fetch is dropped.
fn apply_command(dashboard: &mut HealthDashboard, command: Command) -> Result<(), HealthError> {
    let result = match command {
        Command::Show => Ok(()),
        Command::Expand(category) => dashboard.handle(DashboardEvent::new(category, EventTarget::Card)),
        Command::Event(event) => dashboard.handle(event),
        Command::SetEnabled(category, enabled) => dashboard.set_limit_enabled(category, enabled),
    };
    if let Err(err) = &result {
        dashboard.teardown();
        logging::error(
            Domain::System,
            "command_failed",
            obj(&[("kind", v_str(err.kind())), ("msg", v_str(&err.to_string()))]),
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use finhealth::dashboard::FetchStatus;
    use finhealth::feed::StaticSource;
    use finhealth::state::CategoryMetrics;
    use finhealth::storage::KeyValueStore;

    const BODY: &str = r#"{
        "PERSONAL":  { "differential": 90.0, "pos": [{"checking": 500.0}], "neg": [{"visa": 100.0}] },
        "MANDATORY": { "differential": 0.0, "pos": [], "neg": [] }
    }"#;

    struct ReadOnlyKv;

    impl KeyValueStore for ReadOnlyKv {
        fn get(&self, _key: &str) -> Result<Option<String>, HealthError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), HealthError> {
            Err(HealthError::Storage("attempt to write a readonly database".to_string()))
        }

        fn remove(&mut self, _key: &str) -> Result<(), HealthError> {
            Err(HealthError::Storage("attempt to write a readonly database".to_string()))
        }
    }

    fn args(s: &[&str]) -> Result<Args> {
        parse_args(&s.iter().map(|a| a.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_default_is_show() {
        let a = args(&[]).unwrap();
        assert_eq!(a.command, Command::Show);
        assert!(!a.memory && !a.json);
    }

    #[test]
    fn test_limit_command() {
        let a = args(&["--json", "limit", "personal", "250"]).unwrap();
        assert!(a.json);
        assert_eq!(
            a.command,
            Command::Event(DashboardEvent::new(Category::Personal, EventTarget::LimitInput("250".into())))
        );
    }

    #[test]
    fn test_enable_and_errors() {
        let a = args(&["--memory", "disable", "mandatory"]).unwrap();
        assert!(a.memory);
        assert_eq!(a.command, Command::SetEnabled(Category::NonNegotiable, false));
        assert!(args(&["limit", "personal"]).is_err());
        assert!(args(&["expand"]).is_err());
        assert!(args(&["frobnicate"]).is_err());
    }

    #[tokio::test]
    async fn test_command_applies_while_fetch_pending() {
        let mut d = HealthDashboard::new(LimitStore::memory()).unwrap();
        d.start_fetch(Arc::new(StaticSource::new(BODY)));

        let a = args(&["limit", "personal", "150"]).unwrap();
        apply_command(&mut d, a.command).unwrap();
        apply_command(&mut d, Command::SetEnabled(Category::Personal, true)).unwrap();
        d.wait_fetch().await;

        assert_eq!(d.status(), &FetchStatus::Loaded);
        assert_eq!(d.spendable(Category::Personal), 50.0);
    }

    #[tokio::test]
    async fn test_failed_command_tears_down_pending_fetch() {
        let mut d = HealthDashboard::new(LimitStore::new(Box::new(ReadOnlyKv))).unwrap();
        d.start_fetch(Arc::new(StaticSource::new(BODY)));

        let a = args(&["limit", "personal", "150"]).unwrap();
        assert!(matches!(apply_command(&mut d, a.command), Err(HealthError::Storage(_))));
        assert!(d.is_torn_down());

        d.wait_fetch().await;
        assert_eq!(d.status(), &FetchStatus::Pending);
        assert_eq!(d.metrics(Category::Personal), CategoryMetrics::default());
    }
}
