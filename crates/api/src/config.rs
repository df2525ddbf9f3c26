//! Application configuration loaded from environment variables.

use std::str::FromStr;

use domain::OrderEditPolicy;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// An environment variable whose value could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedVar {
    pub key: &'static str,
    pub value: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for structured output, anything else for text
/// - `DATABASE_URL`: Postgres connection string; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `ORDER_EDIT_POLICY`: `increase_only` (default) or `reconcile`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub order_edit_policy: OrderEditPolicy,
    /// Values that were ignored in favour of the default.
    pub rejected: Vec<RejectedVar>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults and are listed in
    /// `rejected`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut rejected = Vec::new();

        let port = parse_var(&lookup, "PORT", &mut rejected);
        let database_max_connections =
            parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", &mut rejected).filter(|n| *n > 0);
        let order_edit_policy = parse_var(&lookup, "ORDER_EDIT_POLICY", &mut rejected);

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: port.unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: database_max_connections
                .unwrap_or(defaults.database_max_connections),
            order_edit_policy: order_edit_policy.unwrap_or(defaults.order_edit_policy),
            rejected,
        }
    }

    /// Logs every ignored value. Call once tracing is initialised.
    pub fn warn_rejected(&self) {
        for var in &self.rejected {
            tracing::warn!(
                key = var.key,
                value = %var.value,
                "ignoring unparseable setting, using default"
            );
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 5,
            order_edit_policy: OrderEditPolicy::IncreaseOnly,
            rejected: Vec::new(),
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    rejected: &mut Vec<RejectedVar>,
) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            rejected.push(RejectedVar { key, value });
            None
        }
    }
}
