use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::HealthError;
use crate::logging::{self, obj, v_opt, v_str, Domain};
use crate::state::{Category, LimitSetting};

/// Durable string key-value storage behind the limit store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, HealthError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), HealthError>;
    fn remove(&mut self, key: &str) -> Result<(), HealthError>;
}

pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    pub fn open(path: &str) -> Result<Self, HealthError> {
        let mut store = Self { conn: Connection::open(path)? };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, HealthError> {
        let mut store = Self { conn: Connection::open_in_memory()? };
        store.init()?;
        Ok(store)
    }

    fn init(&mut self) -> Result<(), HealthError> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, HealthError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HealthError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), HealthError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Non-durable backend for tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, HealthError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HealthError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), HealthError> {
        self.entries.remove(key);
        Ok(())
    }
}

pub fn value_key(category: Category) -> String {
    format!("{}Limit", category.storage_prefix())
}

pub fn enabled_key(category: Category) -> String {
    format!("{}LimitEnabled", category.storage_prefix())
}

/// Per-category limit value and enabled flag, persisted as text.
///
/// Missing keys decode to the default setting (disabled, no value).
pub struct LimitStore {
    kv: Box<dyn KeyValueStore>,
}

impl LimitStore {
    pub fn new(kv: Box<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn sqlite(path: &str) -> Result<Self, HealthError> {
        Ok(Self::new(Box::new(SqliteKv::open(path)?)))
    }

    pub fn memory() -> Self {
        Self::new(Box::new(MemoryKv::new()))
    }

    pub fn get(&self, category: Category) -> Result<LimitSetting, HealthError> {
        let enabled = self.kv.get(&enabled_key(category))?.as_deref() == Some("true");
        let value = match self.kv.get(&value_key(category))? {
            None => None,
            Some(raw) => {
                let parsed = decode_value(&raw);
                if parsed.is_none() {
                    logging::warn(
                        Domain::Limits,
                        "undecodable_value",
                        obj(&[("category", v_str(category.storage_prefix())), ("raw", v_str(&raw))]),
                    );
                }
                parsed
            }
        };
        Ok(LimitSetting { enabled, value })
    }

    /// `None` removes the persisted value. Non-finite values are stored as `None`.
    pub fn set_value(&mut self, category: Category, value: Option<f64>) -> Result<(), HealthError> {
        let value = value.filter(|v| v.is_finite());
        let key = value_key(category);
        match value {
            Some(v) => self.kv.set(&key, &v.to_string())?,
            None => self.kv.remove(&key)?,
        }
        logging::info(
            Domain::Limits,
            "set_value",
            obj(&[("category", v_str(category.storage_prefix())), ("value", v_opt(value))]),
        );
        Ok(())
    }

    pub fn set_enabled(&mut self, category: Category, enabled: bool) -> Result<(), HealthError> {
        self.kv.set(&enabled_key(category), if enabled { "true" } else { "false" })?;
        logging::info(
            Domain::Limits,
            "set_enabled",
            obj(&[
                ("category", v_str(category.storage_prefix())),
                ("enabled", serde_json::Value::Bool(enabled)),
            ]),
        );
        Ok(())
    }
}

fn decode_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
