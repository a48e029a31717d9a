use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use rusqlite::{params, Connection, OptionalExtension};
use tracing_subscriber::filter::LevelFilter;

use crate::error::SettingsError;
use crate::models::ConfigItem;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_LOGIN_URL: &str = "http://localhost:8080/oauth2/authorization/google";
pub const DEFAULT_COOKIE_NAME: &str = "JSESSIONID";
pub const DEFAULT_LOGIN_DELAY_MS: u64 = 1500;

/// Known keys: (key, environment override, description).
pub const KNOWN_KEYS: &[(&str, Option<&str>, &str)] = &[
    ("api_url", Some("SKILLSYNC_API_URL"), "Base URL of the REST API"),
    ("login_url", Some("SKILLSYNC_LOGIN_URL"), "External login page opened when unauthenticated"),
    ("session_cookie", Some("SKILLSYNC_SESSION"), "Value of the session cookie sent with every request"),
    ("cookie_name", None, "Name of the session cookie"),
    ("log_level", Some("SKILLSYNC_LOG"), "Log level: off, error, warn, info, debug, trace"),
    ("log_file", None, "Write logs to this file instead of stderr"),
    ("login_delay_ms", None, "Delay before opening the login page"),
];

fn describe(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|(_, _, description)| *description)
}

fn env_override(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .find(|(name, _, _)| *name == key)
        .and_then(|(_, env, _)| *env)
}

/// Local key/value settings persisted in SQLite.
pub struct Settings {
    conn: Connection,
}

impl Settings {
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("SKILLSYNC_DB") {
            return PathBuf::from(path);
        }
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir).join(".skillsync.db")
    }

    pub fn open_default() -> Result<Self, SettingsError> {
        Self::open(&Self::default_path())
    }

    pub fn open(path: &Path) -> Result<Self, SettingsError> {
        Self::init(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, SettingsError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SettingsError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS config (
                key_name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Settings { conn })
    }

    /// Stores `value` under `key`; values of known keys are checked first.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        check_value(key, value)?;
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.conn.execute(
            "INSERT INTO config (key_name, value, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(key_name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, describe(key), now],
        )?;
        log::debug!("setting '{}' updated", key);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key_name = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete(&self, key: &str) -> Result<bool, SettingsError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM config WHERE key_name = ?1", [key])?;
        Ok(rows_affected > 0)
    }

    pub fn list(&self) -> Result<Vec<ConfigItem>, SettingsError> {
        let mut stmt = self.conn.prepare(
            "SELECT key_name, value, description, created_at, updated_at FROM config ORDER BY key_name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ConfigItem {
                key_name: row.get(0)?,
                value: row.get(1)?,
                description: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

fn invalid(key: &str, reason: impl ToString) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_base_url(key: &str, value: &str) -> Result<Url, SettingsError> {
    let url = Url::parse(value).map_err(|e| invalid(key, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(key, format!("unsupported scheme '{other}'"))),
    }
}

fn check_value(key: &str, value: &str) -> Result<(), SettingsError> {
    match key {
        "api_url" | "login_url" => parse_base_url(key, value).map(|_| ()),
        "log_level" => value
            .parse::<LevelFilter>()
            .map(|_| ())
            .map_err(|e| invalid(key, e)),
        "login_delay_ms" => value.parse::<u64>().map(|_| ()).map_err(|e| invalid(key, e)),
        "cookie_name" if value.is_empty() || value.contains(['=', ';', ' ']) => {
            Err(invalid(key, "not a valid cookie name"))
        }
        _ => Ok(()),
    }
}

/// Effective client configuration: environment, then stored settings, then defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub login_url: Url,
    pub session_cookie: Option<String>,
    pub cookie_name: String,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    pub login_delay: Duration,
}

impl ClientConfig {
    pub fn resolve(settings: &Settings) -> Result<Self, SettingsError> {
        Self::from_sources(settings, |name| std::env::var(name).ok())
    }

    pub fn from_sources(
        settings: &Settings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let lookup = |key: &str| -> Result<Option<String>, SettingsError> {
            if let Some(value) = env_override(key).and_then(&env).filter(|v| !v.is_empty()) {
                log::debug!("{} taken from environment", key);
                return Ok(Some(value));
            }
            settings.get(key)
        };

        let api_url = lookup("api_url")?.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let login_url = lookup("login_url")?.unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());
        let log_level = match lookup("log_level")? {
            Some(level) => level.parse().map_err(|e| invalid("log_level", e))?,
            None => LevelFilter::WARN,
        };
        let login_delay = match lookup("login_delay_ms")? {
            Some(ms) => ms.parse().map_err(|e| invalid("login_delay_ms", e))?,
            None => DEFAULT_LOGIN_DELAY_MS,
        };

        Ok(ClientConfig {
            api_url: parse_base_url("api_url", &api_url)?,
            login_url: parse_base_url("login_url", &login_url)?,
            session_cookie: lookup("session_cookie")?.filter(|v| !v.is_empty()),
            cookie_name: lookup("cookie_name")?
                .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            log_level,
            log_file: lookup("log_file")?.map(PathBuf::from),
            login_delay: Duration::from_millis(login_delay),
        })
    }
}
