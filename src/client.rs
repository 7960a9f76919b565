//! Client with a self-healing connection to the cluster.
//!
//! The [`Client`] owns the transport handle behind a single reader-writer
//! lock: request-issuing paths take the read lock to snapshot the handle,
//! while `connect`, `attempt_reconnect` and `close` take the write lock.
//! A background health loop probes the cluster and triggers bounded
//! exponential-backoff reconnection when the connection drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opensearch::auth::Credentials;
use opensearch::cert::CertificateValidation;
use opensearch::http::transport::{
    CloudConnectionPool, MultiNodeConnectionPool, SingleNodeConnectionPool, TransportBuilder,
};
use opensearch::http::Url;
use opensearch::OpenSearch;
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cluster::Cluster;
use crate::config::ElasticConfig;
use crate::documents::Documents;
use crate::error::{Error, Result};
use crate::index::{IndexHandle, Indices};

/// Deadline for a single health-loop probe.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    /// Whether the client currently believes it is connected.
    #[serde(rename = "is_connected")]
    pub connected: bool,
    /// Number of successful reconnects since construction.
    pub reconnects: u64,
    /// When the connection was last (re-)established.
    pub last_reconnect: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct ConnectionState {
    transport: Option<OpenSearch>,
    connected: bool,
    reconnect_count: u64,
    last_reconnect: Option<DateTime<Utc>>,
}

struct ClientInner {
    config: ElasticConfig,
    state: RwLock<ConnectionState>,
    closed: AtomicBool,
    stop_tx: watch::Sender<bool>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

/// Elasticsearch/OpenSearch client with auto-reconnection.
///
/// Cheap to clone; clones share the same connection state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client from a configuration, connect, and start the health
    /// loop when enabled.
    pub async fn new(mut config: ElasticConfig) -> Result<Self> {
        config.validate()?;

        info!(
            hosts = ?config.hosts,
            app_name = %config.app_name,
            tls_enabled = config.tls.enabled,
            "creating Elasticsearch client"
        );

        let (stop_tx, _) = watch::channel(false);
        let client = Client {
            inner: Arc::new(ClientInner {
                config,
                state: RwLock::new(ConnectionState::default()),
                closed: AtomicBool::new(false),
                stop_tx,
                health_task: Mutex::new(None),
            }),
        };

        client.connect().await?;

        if client.inner.config.health_check_enabled {
            client.start_health_loop().await;
        }

        info!(
            app_name = %client.inner.config.app_name,
            connection = %client.inner.config.connection_name,
            "Elasticsearch client initialized"
        );

        Ok(client)
    }

    /// Create a client from `ELASTICSEARCH_*` environment variables.
    pub async fn from_env() -> Result<Self> {
        Self::new(ElasticConfig::from_env()?).await
    }

    /// Create a client from environment variables under a custom prefix.
    pub async fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        Self::new(ElasticConfig::from_env_with_prefix(prefix)?).await
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ElasticConfig {
        &self.inner.config
    }

    /// The configured connection name, for identifying clients in logs.
    pub fn name(&self) -> &str {
        &self.inner.config.connection_name
    }

    /// Establish a fresh transport and install it on success.
    async fn connect(&self) -> Result<()> {
        let mut state = self.inner.state.write().await;
        Self::connect_locked(&self.inner.config, &mut state).await
    }

    /// Connect while already holding the write lock.
    async fn connect_locked(
        config: &ElasticConfig,
        state: &mut RwLockWriteGuard<'_, ConnectionState>,
    ) -> Result<()> {
        let transport = build_transport(config)?;

        let response = transport
            .info()
            .request_timeout(config.connect_timeout)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        state.transport = Some(transport);
        state.connected = true;
        state.last_reconnect = Some(Utc::now());
        debug!("connected to Elasticsearch");
        Ok(())
    }

    /// Probe the cluster.
    ///
    /// A failed probe marks the client disconnected and returns the
    /// classified error. A successful probe changes nothing: only `connect`
    /// may set the connected flag, so a probe racing a reconnect can never
    /// mark a half-installed transport healthy. Ping does not itself trigger
    /// reconnection; the health loop does.
    pub async fn ping(&self) -> Result<()> {
        let transport = {
            let state = self.inner.state.read().await;
            state.transport.clone()
        };
        let Some(transport) = transport else {
            return Err(Error::Connection("client is not connected".to_string()));
        };

        let outcome = transport
            .info()
            .request_timeout(self.inner.config.request_timeout)
            .send()
            .await;

        match outcome {
            Err(err) => {
                self.mark_disconnected().await;
                Err(Error::transport(err))
            }
            Ok(response) => {
                let status = response.status_code();
                if status.is_success() {
                    Ok(())
                } else {
                    self.mark_disconnected().await;
                    let body = response.text().await.unwrap_or_default();
                    Err(Error::server(status.as_u16(), body))
                }
            }
        }
    }

    async fn mark_disconnected(&self) {
        let mut state = self.inner.state.write().await;
        state.connected = false;
    }

    /// Reconnect with bounded exponential backoff.
    ///
    /// Runs entirely under the write lock, serializing competing reconnects
    /// and blocking request initiators that need the handle; no useful work
    /// is possible while disconnected. Returns [`Error::Exhausted`] when the
    /// attempt budget is spent; the next health tick may retry.
    pub async fn attempt_reconnect(&self) -> Result<()> {
        let mut state = self.inner.state.write().await;
        if state.connected {
            return Ok(());
        }

        let config = &self.inner.config;
        let mut delay = config.reconnect_delay;

        for attempt in 1..=config.max_reconnect_attempts {
            info!(
                attempt,
                max_attempts = config.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "attempting to reconnect to Elasticsearch"
            );
            tokio::time::sleep(delay).await;

            match Self::connect_locked(config, &mut state).await {
                Ok(()) => {
                    state.reconnect_count += 1;
                    info!(attempts = attempt, "reconnected to Elasticsearch");
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, error = %err, "reconnect attempt failed");
                    delay = next_backoff_delay(
                        delay,
                        config.reconnect_backoff,
                        config.max_reconnect_delay,
                    );
                }
            }
        }

        state.connected = false;
        error!(
            max_attempts = config.max_reconnect_attempts,
            "failed to reconnect to Elasticsearch after maximum attempts"
        );
        Err(Error::Exhausted {
            attempts: config.max_reconnect_attempts,
        })
    }

    async fn start_health_loop(&self) {
        let client = self.clone();
        let mut stop_rx = self.inner.stop_tx.subscribe();
        let interval = self.inner.config.health_check_interval;

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => client.health_check().await,
                    _ = stop_rx.changed() => break,
                }
            }
        });

        *self.inner.health_task.lock().await = Some(handle);
        info!(interval_secs = interval.as_secs(), "health check started");
    }

    async fn health_check(&self) {
        let outcome = match tokio::time::timeout(HEALTH_PROBE_TIMEOUT, self.ping()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout("health probe deadline exceeded".to_string())),
        };

        if let Err(err) = outcome {
            warn!(error = %err, "health check failed");
            self.mark_disconnected().await;
            if self.inner.config.reconnect_enabled {
                if let Err(err) = self.attempt_reconnect().await {
                    warn!(error = %err, "reconnection failed");
                }
            }
        }
    }

    /// Close the client: stop the health loop and drop the transport.
    ///
    /// Idempotent. In-flight requests are not canceled; they run to their
    /// own deadlines.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.inner.stop_tx.send(true);
        if let Some(handle) = self.inner.health_task.lock().await.take() {
            handle.abort();
        }

        let mut state = self.inner.state.write().await;
        state.connected = false;
        state.transport = None;

        info!(
            connection = %self.inner.config.connection_name,
            "Elasticsearch client closed"
        );
        Ok(())
    }

    /// True once [`Client::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Connection statistics snapshot.
    pub async fn stats(&self) -> ConnectionStats {
        let state = self.inner.state.read().await;
        ConnectionStats {
            connected: state.connected,
            reconnects: state.reconnect_count,
            last_reconnect: state.last_reconnect,
        }
    }

    /// Whether the client currently believes it is connected.
    pub async fn is_connected(&self) -> bool {
        self.inner.state.read().await.connected
    }

    /// Snapshot the transport handle for a request.
    pub(crate) async fn transport(&self) -> Result<OpenSearch> {
        let state = self.inner.state.read().await;
        state
            .transport
            .clone()
            .ok_or_else(|| Error::Connection("client is not connected".to_string()))
    }

    /// Document operations (CRUD, bulk, search).
    pub fn documents(&self) -> Documents {
        Documents::new(self.clone())
    }

    /// Index management operations.
    pub fn indices(&self) -> Indices {
        Indices::new(self.clone())
    }

    /// Cluster-level operations.
    pub fn cluster(&self) -> Cluster {
        Cluster::new(self.clone())
    }

    /// Handle for operations on a single index.
    pub fn index(&self, name: impl Into<String>) -> IndexHandle {
        IndexHandle::new(self.clone(), name.into())
    }

    /// Test-only client with no transport and no background tasks.
    #[cfg(test)]
    pub(crate) fn disconnected(config: ElasticConfig) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Client {
            inner: Arc::new(ClientInner {
                config,
                state: RwLock::new(ConnectionState::default()),
                closed: AtomicBool::new(false),
                stop_tx,
                health_task: Mutex::new(None),
            }),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("hosts", &self.inner.config.hosts)
            .field("connection_name", &self.inner.config.connection_name)
            .finish()
    }
}

/// Next reconnect delay: multiply by the backoff factor, capped at `max`.
pub(crate) fn next_backoff_delay(current: Duration, multiplier: f64, max: Duration) -> Duration {
    let next = current.mul_f64(multiplier);
    if next > max {
        max
    } else {
        next
    }
}

fn build_transport(config: &ElasticConfig) -> Result<OpenSearch> {
    let builder = if let Some(cloud_id) = config.cloud_id.as_deref().filter(|id| !id.is_empty()) {
        let pool = CloudConnectionPool::new(cloud_id)
            .map_err(|err| Error::Config(format!("invalid cloud ID: {err}")))?;
        TransportBuilder::new(pool)
    } else {
        let mut urls = Vec::new();
        for address in config.build_addresses() {
            let url = Url::parse(&address)
                .map_err(|err| Error::Config(format!("invalid address '{address}': {err}")))?;
            urls.push(url);
        }
        if urls.len() == 1 {
            TransportBuilder::new(SingleNodeConnectionPool::new(
                urls.into_iter().next().expect("one address"),
            ))
        } else {
            TransportBuilder::new(MultiNodeConnectionPool::round_robin(urls, None))
        }
    };

    let mut builder = builder
        .timeout(config.request_timeout)
        .disable_proxy();

    if let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        let (id, key) = api_key.split_once(':').ok_or_else(|| {
            Error::Config("API key must be in 'id:key' form".to_string())
        })?;
        builder = builder.auth(Credentials::ApiKey(id.to_string(), key.to_string()));
    } else if let Some(token) = config.service_token.as_deref().filter(|t| !t.is_empty()) {
        builder = builder.auth(Credentials::Bearer(token.to_string()));
    } else if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder = builder.auth(Credentials::Basic(user.clone(), pass.clone()));
    }

    if config.tls.enabled && config.tls.insecure_skip_verify {
        builder = builder.cert_validation(CertificateValidation::None);
    }

    let transport = builder
        .build()
        .map_err(|err| Error::Connection(err.to_string()))?;
    Ok(OpenSearch::new(transport))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let max = Duration::from_secs(60);
        let mut delay = Duration::from_secs(5);
        let mut schedule = Vec::new();
        for _ in 0..5 {
            delay = next_backoff_delay(delay, 2.0, max);
            schedule.push(delay);
        }
        assert_eq!(
            schedule,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(40),
                Duration::from_secs(60),
                Duration::from_secs(60),
            ]
        );
    }

    #[test]
    fn backoff_honors_fractional_multiplier() {
        let next = next_backoff_delay(Duration::from_secs(4), 1.5, Duration::from_secs(60));
        assert_eq!(next, Duration::from_secs(6));
    }

    #[tokio::test]
    async fn disconnected_client_reports_not_connected() {
        let client = Client::disconnected(ElasticConfig::default());
        assert!(!client.is_connected().await);
        let err = client.transport().await.unwrap_err();
        assert!(err.is_connection());
        let err = client.ping().await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let client = Client::disconnected(ElasticConfig::default());
        assert!(!client.is_closed());
        client.close().await.unwrap();
        assert!(client.is_closed());
        client.close().await.unwrap();
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn stats_snapshot_defaults() {
        let client = Client::disconnected(ElasticConfig::default());
        let stats = client.stats().await;
        assert!(!stats.connected);
        assert_eq!(stats.reconnects, 0);
        assert!(stats.last_reconnect.is_none());
    }

    #[test]
    fn build_transport_rejects_malformed_api_key() {
        let config = ElasticConfig::default().with_api_key("not-id-key-form");
        let err = build_transport(&config).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn build_transport_accepts_multiple_hosts() {
        let config = ElasticConfig::default().with_hosts(["h1:9200", "h2:9201"]);
        build_transport(&config).unwrap();
    }
}
