//! Connection parameters.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::DriverError;

/// Default character set negotiated for new sessions.
pub const DEFAULT_CHARSET: &str = "utf8";

/// Default session time zone.
pub const DEFAULT_TIMEZONE: &str = "+00:00";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3306;

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters for opening one database session.
///
/// A `ConnectionConfig` is supplied once when a pool or connection manager is
/// built and never changes afterwards; every connection (and every reconnect)
/// opened on its behalf uses the same values.
///
/// This struct is marked `#[non_exhaustive]`. Use [`ConnectionConfig::new()`],
/// the builder methods, or [`ConnectionConfig::from_connection_string()`] to
/// construct instances.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ConnectionConfig {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (default: 3306).
    pub port: u16,

    /// Login user.
    pub user: String,

    /// Login password.
    pub password: String,

    /// Database selected after login.
    pub database: Option<String>,

    /// Session character set (default: `utf8`).
    pub charset: String,

    /// Whether statements commit implicitly (default: true).
    pub autocommit: bool,

    /// Session time zone, e.g. `+00:00` (default). Empty leaves the server default.
    pub timezone: String,

    /// Upper bound on the handshake, including session set-up.
    #[serde(rename = "connect_timeout_seconds", deserialize_with = "duration_from_secs")]
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            database: None,
            charset: DEFAULT_CHARSET.to_string(),
            autocommit: true,
            timezone: DEFAULT_TIMEZONE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the password in debug output
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("autocommit", &self.autocommit)
            .field("timezone", &self.timezone)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string into configuration.
    ///
    /// Accepts `Key=Value` pairs separated by semicolons:
    /// ```text
    /// Host=db.internal;Port=3307;User=app;Password=secret;Database=orders;Timezone=+08:00
    /// ```
    ///
    /// Keys are case-insensitive. `Host=db.internal,3307` sets the port
    /// inline. Unknown keys are ignored.
    pub fn from_connection_string(conn_str: &str) -> Result<Self, DriverError> {
        let mut config = Self::default();

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| DriverError::Config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "host" | "server" | "data source" => {
                    if let Some((host, port)) = value.split_once(',') {
                        config.host = host.trim().to_string();
                        config.port = parse_port(port.trim())?;
                    } else {
                        config.host = value.to_string();
                    }
                }
                "port" => {
                    config.port = parse_port(value)?;
                }
                "user" | "user id" | "uid" | "username" => {
                    config.user = value.to_string();
                }
                "password" | "pwd" => {
                    config.password = value.to_string();
                }
                "database" | "db" | "initial catalog" => {
                    config.database = (!value.is_empty()).then(|| value.to_string());
                }
                "charset" | "character set" => {
                    config.charset = value.to_string();
                }
                "timezone" | "time zone" => {
                    config.timezone = value.to_string();
                }
                "autocommit" => {
                    config.autocommit = parse_bool(value).ok_or_else(|| {
                        DriverError::Config(format!("invalid autocommit flag: {value}"))
                    })?;
                }
                "connect timeout" | "connection timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| DriverError::Config(format!("invalid timeout: {value}")))?;
                    config.connect_timeout = Duration::from_secs(secs);
                }
                _ => {
                    // Ignore unknown options for forward compatibility
                    tracing::debug!(key = key, "ignoring unknown connection string option");
                }
            }
        }

        Ok(config)
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the login user and password.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the session character set.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Enable or disable autocommit.
    #[must_use]
    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }

    /// Set the session time zone. An empty string keeps the server default.
    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Statements applied to every new session right after the handshake.
    ///
    /// Charset first, then time zone (skipped when empty), then autocommit.
    #[must_use]
    pub fn session_statements(&self) -> Vec<String> {
        let mut statements = Vec::with_capacity(3);
        if !self.charset.is_empty() {
            statements.push(format!("SET NAMES {}", self.charset));
        }
        if !self.timezone.is_empty() {
            statements.push(format!("SET time_zone = '{}'", self.timezone));
        }
        statements.push(format!("SET autocommit = {}", u8::from(self.autocommit)));
        statements
    }

    /// Short `host:port/database` label used in log fields.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match &self.database {
            Some(db) => format!("{}:{}/{}", self.host, self.port, db),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

fn parse_port(value: &str) -> Result<u16, DriverError> {
    value
        .parse()
        .map_err(|_| DriverError::Config(format!("invalid port: {value}")))
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes") || value == "1" {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") || value.eq_ignore_ascii_case("no") || value == "0"
    {
        Some(false)
    } else {
        None
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3306);
        assert_eq!(config.charset, "utf8");
        assert_eq!(config.timezone, "+00:00");
        assert!(config.autocommit);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_connection_string_parsing() {
        let config = ConnectionConfig::from_connection_string(
            "Host=db1;User=app;Password=secret;Database=orders;",
        )
        .unwrap();

        assert_eq!(config.host, "db1");
        assert_eq!(config.user, "app");
        assert_eq!(config.password, "secret");
        assert_eq!(config.database.as_deref(), Some("orders"));
    }

    #[test]
    fn test_connection_string_inline_port() {
        let config = ConnectionConfig::from_connection_string("Server=db1,3307;").unwrap();
        assert_eq!(config.host, "db1");
        assert_eq!(config.port, 3307);
    }

    #[test]
    fn test_connection_string_session_options() {
        let config = ConnectionConfig::from_connection_string(
            "Charset=utf8mb4;Timezone=+08:00;Autocommit=no;Connect Timeout=3",
        )
        .unwrap();

        assert_eq!(config.charset, "utf8mb4");
        assert_eq!(config.timezone, "+08:00");
        assert!(!config.autocommit);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_connection_string_invalid_autocommit() {
        let result = ConnectionConfig::from_connection_string("Autocommit=maybe");
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = ConnectionConfig::new()
            .host("db2")
            .port(3310)
            .credentials("root", "pw")
            .database("inventory")
            .charset("latin1")
            .autocommit(false)
            .timezone("")
            .connect_timeout(Duration::from_secs(1));

        assert_eq!(config.host, "db2");
        assert_eq!(config.port, 3310);
        assert_eq!(config.user, "root");
        assert_eq!(config.database.as_deref(), Some("inventory"));
        assert!(!config.autocommit);
        assert_eq!(config.endpoint(), "db2:3310/inventory");
    }

    #[test]
    fn test_session_statements() {
        let config = ConnectionConfig::default();
        assert_eq!(
            config.session_statements(),
            vec![
                "SET NAMES utf8".to_string(),
                "SET time_zone = '+00:00'".to_string(),
                "SET autocommit = 1".to_string(),
            ]
        );
    }

    #[test]
    fn test_session_statements_skip_empty_timezone() {
        let config = ConnectionConfig::default().timezone("").autocommit(false);
        let statements = config.session_statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1], "SET autocommit = 0");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::default().credentials("app", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"host": "db3", "user": "app", "database": "crm", "connect_timeout_seconds": 5}"#,
        )
        .unwrap();

        assert_eq!(config.host, "db3");
        assert_eq!(config.port, 3306);
        assert_eq!(config.charset, "utf8");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }
}
