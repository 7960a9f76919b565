//! Client configuration: typed options, environment binding, validation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Document ID generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdMode {
    /// Let the server assign a random ID (default, recommended).
    ///
    /// Random IDs distribute evenly across shards.
    #[default]
    Elastic,
    /// Generate ULID document IDs.
    ///
    /// Time-ordered IDs can hotspot a single shard in multi-shard indices;
    /// use only when sortable IDs are required.
    Ulid,
    /// The caller provides its own `_id` fields; nothing is injected.
    Custom,
}

impl IdMode {
    /// String form used in environment bindings.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdMode::Elastic => "elastic",
            IdMode::Ulid => "ulid",
            IdMode::Custom => "custom",
        }
    }
}

impl FromStr for IdMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "elastic" => Ok(IdMode::Elastic),
            "ulid" => Ok(IdMode::Ulid),
            "custom" => Ok(IdMode::Custom),
            other => Err(Error::Config(format!("invalid ID mode: {other}"))),
        }
    }
}

impl fmt::Display for IdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log level carried in configuration for the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// String form used in environment bindings.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::Config(format!("invalid log level: {other}"))),
        }
    }
}

/// Log output format carried in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Structured JSON output (default).
    #[default]
    Json,
    /// Human-readable text output.
    Text,
}

impl LogFormat {
    /// String form used in environment bindings.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(Error::Config(format!("invalid log format: {other}"))),
        }
    }
}

/// TLS configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Use HTTPS for synthesized addresses.
    pub enabled: bool,
    /// Skip certificate verification (development only).
    pub insecure_skip_verify: bool,
}

/// Elasticsearch/OpenSearch connection configuration.
///
/// Immutable once a [`Client`](crate::Client) is constructed from it. Build
/// one with [`ElasticConfig::default`] plus the `with_*` setters, or bind it
/// from the environment with [`ElasticConfig::from_env`]. Setters apply once,
/// in call order; a later setter overrides an earlier one.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticConfig {
    /// Hosts as `host:port`, in connection order.
    pub hosts: Vec<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// API key in `id:key` form.
    pub api_key: Option<String>,
    /// Service token for bearer authentication.
    pub service_token: Option<String>,
    /// Elastic Cloud ID; when set, addresses are delegated to the transport.
    pub cloud_id: Option<String>,
    /// TLS settings.
    pub tls: TlsConfig,

    /// Enable request compression.
    pub compression_enabled: bool,
    /// HTTP status codes the transport retries on.
    pub retry_on_status: Vec<u16>,
    /// Maximum transport-level retries.
    pub max_retries: u32,
    /// Discover cluster nodes at startup.
    pub discover_nodes_on_start: bool,

    /// Maximum idle connections in the pool.
    pub max_idle_conns: u32,
    /// Maximum idle connections per host.
    pub max_idle_conns_per_host: u32,
    /// Idle connection timeout.
    pub idle_conn_timeout: Duration,
    /// Maximum connection lifetime; zero means unbounded.
    pub max_conn_lifetime: Duration,

    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout applied at the transport.
    pub request_timeout: Duration,

    /// Enable automatic reconnection from the health loop.
    pub reconnect_enabled: bool,
    /// Initial delay before the first reconnect attempt.
    pub reconnect_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_reconnect_delay: Duration,
    /// Backoff multiplier applied after each failed attempt.
    pub reconnect_backoff: f64,
    /// Maximum reconnect attempts per reconnect cycle.
    pub max_reconnect_attempts: u32,

    /// Enable the background health loop.
    pub health_check_enabled: bool,
    /// Interval between health probes.
    pub health_check_interval: Duration,

    /// Application name reported in logs.
    pub app_name: String,
    /// Connection name for identifying clients in multi-client setups.
    pub connection_name: String,

    /// Document ID generation strategy.
    pub id_mode: IdMode,
    /// Log level for the embedding application's subscriber.
    pub log_level: LogLevel,
    /// Log format for the embedding application's subscriber.
    pub log_format: LogFormat,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost:9200".to_string()],
            username: None,
            password: None,
            api_key: None,
            service_token: None,
            cloud_id: None,
            tls: TlsConfig::default(),
            compression_enabled: true,
            retry_on_status: vec![429, 502, 503, 504],
            max_retries: 3,
            discover_nodes_on_start: false,
            max_idle_conns: 100,
            max_idle_conns_per_host: 10,
            idle_conn_timeout: Duration::from_secs(90),
            max_conn_lifetime: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            reconnect_enabled: true,
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_delay: Duration::from_secs(60),
            reconnect_backoff: 2.0,
            max_reconnect_attempts: 10,
            health_check_enabled: true,
            health_check_interval: Duration::from_secs(30),
            app_name: "elasticlink-app".to_string(),
            connection_name: String::new(),
            id_mode: IdMode::default(),
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl ElasticConfig {
    /// Create a configuration with a single `host:port`.
    pub fn new(host: impl Into<String>) -> Self {
        Self::default().with_hosts([host.into()])
    }

    /// Set the host list. Entries without a port get the default 9200.
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts
            .into_iter()
            .map(|h| {
                let h = h.into();
                if h.contains(':') {
                    h
                } else {
                    format!("{h}:9200")
                }
            })
            .collect();
        self
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set an API key in `id:key` form.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a service token for bearer authentication.
    pub fn with_service_token(mut self, token: impl Into<String>) -> Self {
        self.service_token = Some(token.into());
        self
    }

    /// Set an Elastic Cloud ID.
    pub fn with_cloud_id(mut self, cloud_id: impl Into<String>) -> Self {
        self.cloud_id = Some(cloud_id.into());
        self
    }

    /// Set TLS configuration.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Set the connection establishment timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable request compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression_enabled = enabled;
        self
    }

    /// Set the maximum transport-level retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the HTTP status codes the transport retries on.
    pub fn with_retry_on_status<I: IntoIterator<Item = u16>>(mut self, statuses: I) -> Self {
        self.retry_on_status = statuses.into_iter().collect();
        self
    }

    /// Enable or disable automatic reconnection.
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect_enabled = enabled;
        self
    }

    /// Enable or disable the health loop and set its interval.
    pub fn with_health_check(mut self, enabled: bool, interval: Duration) -> Self {
        self.health_check_enabled = enabled;
        self.health_check_interval = interval;
        self
    }

    /// Set the ID generation mode.
    pub fn with_id_mode(mut self, mode: IdMode) -> Self {
        self.id_mode = mode;
        self
    }

    /// Set the application name used in logs.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Set the connection name used to identify this client.
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = name.into();
        self
    }

    /// Load configuration from the environment under the default
    /// `ELASTICSEARCH_` variable family.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix("")
    }

    /// Load configuration from the environment with a custom prefix.
    ///
    /// A prefix of `"LOGS_"` binds `LOGS_ELASTICSEARCH_HOSTS` and so on.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_map(prefix, &vars)
    }

    /// Bind configuration from an explicit variable map. Used by the
    /// environment loaders and directly testable.
    pub(crate) fn from_env_map(prefix: &str, vars: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |name: &str| -> Option<&String> {
            vars.get(&format!("{prefix}ELASTICSEARCH_{name}"))
        };

        if let Some(hosts) = get("HOSTS") {
            config.hosts = hosts
                .split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect();
        }
        if let Some(v) = get("USERNAME") {
            config.username = Some(v.clone());
        }
        if let Some(v) = get("PASSWORD") {
            config.password = Some(v.clone());
        }
        if let Some(v) = get("API_KEY") {
            config.api_key = Some(v.clone());
        }
        if let Some(v) = get("SERVICE_TOKEN") {
            config.service_token = Some(v.clone());
        }
        if let Some(v) = get("CLOUD_ID") {
            config.cloud_id = Some(v.clone());
        }
        if let Some(v) = get("TLS_ENABLED") {
            config.tls.enabled = parse_bool("TLS_ENABLED", v)?;
        }
        if let Some(v) = get("TLS_INSECURE") {
            config.tls.insecure_skip_verify = parse_bool("TLS_INSECURE", v)?;
        }
        if let Some(v) = get("COMPRESSION_ENABLED") {
            config.compression_enabled = parse_bool("COMPRESSION_ENABLED", v)?;
        }
        if let Some(v) = get("RETRY_ON_STATUS") {
            config.retry_on_status = parse_status_list(v)?;
        }
        if let Some(v) = get("MAX_RETRIES") {
            config.max_retries = parse_int("MAX_RETRIES", v)?;
        }
        if let Some(v) = get("DISCOVER_NODES_ON_START") {
            config.discover_nodes_on_start = parse_bool("DISCOVER_NODES_ON_START", v)?;
        }
        if let Some(v) = get("MAX_IDLE_CONNS") {
            config.max_idle_conns = parse_int("MAX_IDLE_CONNS", v)?;
        }
        if let Some(v) = get("MAX_IDLE_CONNS_PER_HOST") {
            config.max_idle_conns_per_host = parse_int("MAX_IDLE_CONNS_PER_HOST", v)?;
        }
        if let Some(v) = get("IDLE_CONN_TIMEOUT") {
            config.idle_conn_timeout = parse_duration("IDLE_CONN_TIMEOUT", v)?;
        }
        if let Some(v) = get("MAX_CONN_LIFETIME") {
            config.max_conn_lifetime = parse_duration("MAX_CONN_LIFETIME", v)?;
        }
        if let Some(v) = get("CONNECT_TIMEOUT") {
            config.connect_timeout = parse_duration("CONNECT_TIMEOUT", v)?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT") {
            config.request_timeout = parse_duration("REQUEST_TIMEOUT", v)?;
        }
        if let Some(v) = get("RECONNECT_ENABLED") {
            config.reconnect_enabled = parse_bool("RECONNECT_ENABLED", v)?;
        }
        if let Some(v) = get("RECONNECT_DELAY") {
            config.reconnect_delay = parse_duration("RECONNECT_DELAY", v)?;
        }
        if let Some(v) = get("MAX_RECONNECT_DELAY") {
            config.max_reconnect_delay = parse_duration("MAX_RECONNECT_DELAY", v)?;
        }
        if let Some(v) = get("RECONNECT_BACKOFF") {
            config.reconnect_backoff = v
                .parse::<f64>()
                .map_err(|e| Error::Config(format!("invalid RECONNECT_BACKOFF '{v}': {e}")))?;
        }
        if let Some(v) = get("MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = parse_int("MAX_RECONNECT_ATTEMPTS", v)?;
        }
        if let Some(v) = get("HEALTH_CHECK_ENABLED") {
            config.health_check_enabled = parse_bool("HEALTH_CHECK_ENABLED", v)?;
        }
        if let Some(v) = get("HEALTH_CHECK_INTERVAL") {
            config.health_check_interval = parse_duration("HEALTH_CHECK_INTERVAL", v)?;
        }
        if let Some(v) = get("APP_NAME") {
            config.app_name = v.clone();
        }
        if let Some(v) = get("CONNECTION_NAME") {
            config.connection_name = v.clone();
        }
        if let Some(v) = get("ID_MODE") {
            config.id_mode = v.parse()?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            config.log_level = v.parse()?;
        }
        if let Some(v) = get("LOG_FORMAT") {
            config.log_format = v.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, normalizing soft settings in place.
    ///
    /// Hard failures (missing hosts, portless host, zero required timeout,
    /// status codes outside 100..=599) return [`Error::Config`]. Reconnect
    /// and health settings outside their sane ranges are reset to defaults.
    pub fn validate(&mut self) -> Result<()> {
        if self.cloud_id.as_deref().unwrap_or("").is_empty() {
            if self.hosts.is_empty() {
                return Err(Error::Config(
                    "hosts must be set when no cloud ID is configured".to_string(),
                ));
            }
            for host in &self.hosts {
                if !host.contains(':') {
                    return Err(Error::Config(format!(
                        "host '{host}' must include a port (e.g., {host}:9200)"
                    )));
                }
            }
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::Config("connect timeout must be positive".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        for status in &self.retry_on_status {
            if !(100..=599).contains(status) {
                return Err(Error::Config(format!("invalid HTTP status code: {status}")));
            }
        }

        if self.reconnect_delay.is_zero() {
            self.reconnect_delay = Duration::from_secs(5);
        }
        if self.max_reconnect_delay.is_zero() {
            self.max_reconnect_delay = Duration::from_secs(60);
        }
        if self.reconnect_backoff <= 1.0 || !self.reconnect_backoff.is_finite() {
            self.reconnect_backoff = 2.0;
        }
        if self.max_reconnect_attempts == 0 {
            self.max_reconnect_attempts = 10;
        }
        if self.health_check_interval.is_zero() {
            self.health_check_interval = Duration::from_secs(30);
        }

        Ok(())
    }

    /// Render connection addresses as `{http|https}://{host}:{port}` in input
    /// order. Empty when a cloud ID is configured; the transport resolves
    /// addresses itself in that case.
    pub fn build_addresses(&self) -> Vec<String> {
        if !self.cloud_id.as_deref().unwrap_or("").is_empty() {
            return Vec::new();
        }

        let scheme = if self.tls.enabled { "https" } else { "http" };

        if self.hosts.is_empty() {
            return vec![format!("{scheme}://localhost:9200")];
        }

        self.hosts
            .iter()
            .map(|host| {
                if host.contains(':') {
                    format!("{scheme}://{host}")
                } else {
                    format!("{scheme}://{host}:9200")
                }
            })
            .collect()
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::Config(format!("invalid boolean for {name}: '{other}'"))),
    }
}

fn parse_int(name: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| Error::Config(format!("invalid integer for {name} '{value}': {e}")))
}

/// Parse a duration in the service's `<n><unit>` syntax: `ms`, `s`, `m`, `h`.
fn parse_duration(name: &str, value: &str) -> Result<Duration> {
    let value = value.trim();
    let (number, unit) = match value.find(|c: char| c.is_ascii_alphabetic()) {
        Some(idx) => value.split_at(idx),
        None => {
            return Err(Error::Config(format!(
                "invalid duration for {name}: '{value}' (expected e.g. 30s, 500ms, 1m)"
            )))
        }
    };
    let number: u64 = number
        .parse()
        .map_err(|e| Error::Config(format!("invalid duration for {name} '{value}': {e}")))?;
    match unit {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        "h" => Ok(Duration::from_secs(number * 3600)),
        other => Err(Error::Config(format!(
            "invalid duration unit '{other}' for {name}"
        ))),
    }
}

fn parse_status_list(value: &str) -> Result<Vec<u16>> {
    let mut statuses = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let code: u16 = part
            .parse()
            .map_err(|e| Error::Config(format!("invalid status code '{part}': {e}")))?;
        if !(100..=599).contains(&code) {
            return Err(Error::Config(format!("invalid HTTP status code: {code}")));
        }
        statuses.push(code);
    }
    Ok(statuses)
}

/// Render a [`Duration`] in the service's `<n><unit>` syntax.
pub(crate) fn format_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        let mut config = ElasticConfig::default();
        config.validate().unwrap();
        assert_eq!(config.hosts, vec!["localhost:9200"]);
        assert_eq!(config.retry_on_status, vec![429, 502, 503, 504]);
        assert_eq!(config.id_mode, IdMode::Elastic);
    }

    #[test]
    fn with_hosts_applies_default_port() {
        let config = ElasticConfig::default().with_hosts(["host1", "host2:9201"]);
        assert_eq!(config.hosts, vec!["host1:9200", "host2:9201"]);
    }

    #[test]
    fn build_addresses_http_and_https() {
        let config = ElasticConfig::default().with_hosts(["host1:9201", "host2:9202"]);
        assert_eq!(
            config.build_addresses(),
            vec!["http://host1:9201", "http://host2:9202"]
        );

        let config = ElasticConfig::default()
            .with_hosts(["secure-host:9200"])
            .with_tls(TlsConfig {
                enabled: true,
                insecure_skip_verify: false,
            });
        assert_eq!(config.build_addresses(), vec!["https://secure-host:9200"]);
    }

    #[test]
    fn build_addresses_empty_with_cloud_id() {
        let config = ElasticConfig::default().with_cloud_id("deployment:abc123");
        assert!(config.build_addresses().is_empty());
    }

    #[test]
    fn validate_rejects_missing_hosts() {
        let mut config = ElasticConfig::default();
        config.hosts.clear();
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn validate_rejects_portless_host() {
        let mut config = ElasticConfig::default();
        config.hosts = vec!["localhost".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn validate_allows_hosts_absent_with_cloud_id() {
        let mut config = ElasticConfig::default().with_cloud_id("deployment:abc");
        config.hosts.clear();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let mut config = ElasticConfig::default();
        config.connect_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ElasticConfig::default();
        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_retry_status() {
        let mut config = ElasticConfig::default().with_retry_on_status([700]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_normalizes_reconnect_settings() {
        let mut config = ElasticConfig::default();
        config.reconnect_delay = Duration::ZERO;
        config.max_reconnect_delay = Duration::ZERO;
        config.reconnect_backoff = 0.5;
        config.max_reconnect_attempts = 0;
        config.health_check_interval = Duration::ZERO;
        config.validate().unwrap();

        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(60));
        assert_eq!(config.reconnect_backoff, 2.0);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.health_check_interval, Duration::from_secs(30));
    }

    #[test]
    fn from_env_map_binds_everything() {
        let vars = env(&[
            ("ELASTICSEARCH_HOSTS", "es1:9200,es2:9201"),
            ("ELASTICSEARCH_USERNAME", "user"),
            ("ELASTICSEARCH_PASSWORD", "pass"),
            ("ELASTICSEARCH_TLS_ENABLED", "true"),
            ("ELASTICSEARCH_TLS_INSECURE", "false"),
            ("ELASTICSEARCH_COMPRESSION_ENABLED", "false"),
            ("ELASTICSEARCH_RETRY_ON_STATUS", "502, 503"),
            ("ELASTICSEARCH_MAX_RETRIES", "5"),
            ("ELASTICSEARCH_CONNECT_TIMEOUT", "15s"),
            ("ELASTICSEARCH_REQUEST_TIMEOUT", "45s"),
            ("ELASTICSEARCH_RECONNECT_DELAY", "2s"),
            ("ELASTICSEARCH_MAX_RECONNECT_DELAY", "30s"),
            ("ELASTICSEARCH_RECONNECT_BACKOFF", "1.5"),
            ("ELASTICSEARCH_MAX_RECONNECT_ATTEMPTS", "4"),
            ("ELASTICSEARCH_HEALTH_CHECK_INTERVAL", "10s"),
            ("ELASTICSEARCH_APP_NAME", "orders-api"),
            ("ELASTICSEARCH_CONNECTION_NAME", "primary"),
            ("ELASTICSEARCH_ID_MODE", "ulid"),
            ("ELASTICSEARCH_LOG_LEVEL", "warn"),
            ("ELASTICSEARCH_LOG_FORMAT", "text"),
        ]);

        let config = ElasticConfig::from_env_map("", &vars).unwrap();
        assert_eq!(config.hosts, vec!["es1:9200", "es2:9201"]);
        assert_eq!(config.username.as_deref(), Some("user"));
        assert!(config.tls.enabled);
        assert!(!config.compression_enabled);
        assert_eq!(config.retry_on_status, vec![502, 503]);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
        assert_eq!(config.reconnect_backoff, 1.5);
        assert_eq!(config.max_reconnect_attempts, 4);
        assert_eq!(config.health_check_interval, Duration::from_secs(10));
        assert_eq!(config.app_name, "orders-api");
        assert_eq!(config.connection_name, "primary");
        assert_eq!(config.id_mode, IdMode::Ulid);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn from_env_map_honors_prefix() {
        let vars = env(&[
            ("LOGS_ELASTICSEARCH_HOSTS", "logs-es:9200"),
            ("ELASTICSEARCH_HOSTS", "other:9200"),
        ]);
        let config = ElasticConfig::from_env_map("LOGS_", &vars).unwrap();
        assert_eq!(config.hosts, vec!["logs-es:9200"]);
    }

    #[test]
    fn from_env_map_rejects_portless_host() {
        let vars = env(&[("ELASTICSEARCH_HOSTS", "localhost")]);
        let err = ElasticConfig::from_env_map("", &vars).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn from_env_map_rejects_bad_enums() {
        for (key, value) in [
            ("ELASTICSEARCH_ID_MODE", "sequential"),
            ("ELASTICSEARCH_LOG_LEVEL", "verbose"),
            ("ELASTICSEARCH_LOG_FORMAT", "yaml"),
        ] {
            let vars = env(&[(key, value)]);
            assert!(
                ElasticConfig::from_env_map("", &vars).is_err(),
                "expected {key}={value} to be rejected"
            );
        }
    }

    // Round trip: serialize a validated config back to its variable family
    // and reparse; the result must be equivalent.
    #[test]
    fn env_round_trip() {
        let vars = env(&[
            ("ELASTICSEARCH_HOSTS", "es1:9200,es2:9201"),
            ("ELASTICSEARCH_USERNAME", "user"),
            ("ELASTICSEARCH_PASSWORD", "secret"),
            ("ELASTICSEARCH_TLS_ENABLED", "true"),
            ("ELASTICSEARCH_RETRY_ON_STATUS", "429,503"),
            ("ELASTICSEARCH_MAX_RETRIES", "7"),
            ("ELASTICSEARCH_CONNECT_TIMEOUT", "20s"),
            ("ELASTICSEARCH_REQUEST_TIMEOUT", "40s"),
            ("ELASTICSEARCH_ID_MODE", "custom"),
            ("ELASTICSEARCH_LOG_LEVEL", "debug"),
        ]);
        let first = ElasticConfig::from_env_map("", &vars).unwrap();

        let reserialized = env(&[
            ("ELASTICSEARCH_HOSTS", &first.hosts.join(",")),
            ("ELASTICSEARCH_USERNAME", first.username.as_deref().unwrap()),
            ("ELASTICSEARCH_PASSWORD", first.password.as_deref().unwrap()),
            (
                "ELASTICSEARCH_TLS_ENABLED",
                if first.tls.enabled { "true" } else { "false" },
            ),
            (
                "ELASTICSEARCH_RETRY_ON_STATUS",
                &first
                    .retry_on_status
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ("ELASTICSEARCH_MAX_RETRIES", &first.max_retries.to_string()),
            (
                "ELASTICSEARCH_CONNECT_TIMEOUT",
                &format_duration(first.connect_timeout),
            ),
            (
                "ELASTICSEARCH_REQUEST_TIMEOUT",
                &format_duration(first.request_timeout),
            ),
            ("ELASTICSEARCH_ID_MODE", first.id_mode.as_str()),
            ("ELASTICSEARCH_LOG_LEVEL", first.log_level.as_str()),
        ]);
        let second = ElasticConfig::from_env_map("", &reserialized).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(
            parse_duration("T", "500ms").unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(parse_duration("T", "30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("T", "2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("T", "1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("T", "10").is_err());
        assert!(parse_duration("T", "10d").is_err());
    }

    #[test]
    fn format_duration_round_trip() {
        for d in [
            Duration::from_millis(1500),
            Duration::from_secs(30),
            Duration::from_secs(90),
        ] {
            let rendered = format_duration(d);
            assert_eq!(parse_duration("T", &rendered).unwrap(), d);
        }
    }
}
