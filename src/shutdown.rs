//! Graceful shutdown: signal capture and ordered resource drain under a
//! bounded deadline.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tracing::{error, info, warn};

use crate::client::Client;
use crate::config::ElasticConfig;
use crate::error::Result;

/// Boxed future returned by [`Shutdownable::close`].
pub type ShutdownFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// A resource that can be closed during shutdown.
pub trait Shutdownable: Send + Sync {
    /// Release the resource.
    fn close(&self) -> ShutdownFuture<'_>;
}

impl Shutdownable for Client {
    fn close(&self) -> ShutdownFuture<'_> {
        Box::pin(Client::close(self))
    }
}

/// Timeouts governing the shutdown sequence.
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time for the whole drain.
    pub timeout: Duration,
    /// Pause after closing resources so in-flight responses can finish.
    pub grace_period: Duration,
    /// Pause before aborting the process once the drain has timed out.
    pub force_kill_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            grace_period: Duration::from_secs(5),
            force_kill_timeout: Duration::from_secs(10),
        }
    }
}

struct ManagerInner {
    config: ShutdownConfig,
    clients: Mutex<Vec<Client>>,
    resources: Mutex<Vec<Arc<dyn Shutdownable>>>,
    cancel_tx: watch::Sender<bool>,
}

/// Coordinates graceful shutdown of clients and other resources.
///
/// Registered items are closed in registration order, clients first, under
/// the configured total timeout. When the drain cannot finish in time the
/// process is aborted after the force-kill pause.
#[derive(Clone)]
pub struct ShutdownManager {
    inner: Arc<ManagerInner>,
}

impl ShutdownManager {
    /// Create a manager; `None` uses the default timeouts.
    pub fn new(config: Option<ShutdownConfig>) -> Self {
        let config = config.unwrap_or_default();
        info!(
            timeout_secs = config.timeout.as_secs(),
            grace_secs = config.grace_period.as_secs(),
            "creating shutdown manager"
        );

        let (cancel_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ManagerInner {
                config,
                clients: Mutex::new(Vec::new()),
                resources: Mutex::new(Vec::new()),
                cancel_tx,
            }),
        }
    }

    /// Create a manager whose total timeout follows the client
    /// configuration's connect timeout.
    pub fn from_client_config(config: &ElasticConfig) -> Self {
        Self::new(Some(ShutdownConfig {
            timeout: config.connect_timeout,
            ..ShutdownConfig::default()
        }))
    }

    /// Register clients for shutdown. Safe to call concurrently.
    pub fn register<I: IntoIterator<Item = Client>>(&self, clients: I) {
        let mut registered = self.inner.clients.lock().expect("clients lock");
        let before = registered.len();
        registered.extend(clients);
        info!(
            count = registered.len() - before,
            "registered clients for graceful shutdown"
        );
    }

    /// Register arbitrary resources for shutdown. Safe to call concurrently.
    pub fn register_resources<I: IntoIterator<Item = Arc<dyn Shutdownable>>>(&self, resources: I) {
        let mut registered = self.inner.resources.lock().expect("resources lock");
        let before = registered.len();
        registered.extend(resources);
        info!(
            count = registered.len() - before,
            "registered resources for graceful shutdown"
        );
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.inner.clients.lock().expect("clients lock").len()
    }

    /// Number of registered resources.
    pub fn resource_count(&self) -> usize {
        self.inner.resources.lock().expect("resources lock").len()
    }

    /// A context canceled when shutdown begins. Workers should stop
    /// producing new work once it fires.
    pub fn context(&self) -> ShutdownContext {
        ShutdownContext {
            rx: self.inner.cancel_tx.subscribe(),
        }
    }

    /// Block until SIGINT or SIGTERM arrives, then run the shutdown
    /// sequence.
    pub async fn wait(&self) {
        wait_for_signal().await;
        info!("received shutdown signal");
        self.shutdown().await;
    }

    /// Run the shutdown sequence now.
    ///
    /// Cancels the context, drains registered resources under the total
    /// timeout, then sleeps the grace period. When the drain overruns the
    /// timeout, the process is aborted after the force-kill pause.
    pub async fn shutdown(&self) {
        let start = Instant::now();
        let config = self.inner.config.clone();
        info!(
            timeout_secs = config.timeout.as_secs(),
            "starting graceful shutdown"
        );

        let _ = self.inner.cancel_tx.send(true);

        match timeout(config.timeout, self.drain()).await {
            Ok(()) => {
                info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "graceful shutdown completed"
                );
            }
            Err(_) => {
                warn!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    timeout_secs = config.timeout.as_secs(),
                    "graceful shutdown timed out"
                );
                if !config.force_kill_timeout.is_zero() {
                    warn!(
                        force_kill_secs = config.force_kill_timeout.as_secs(),
                        "waiting before force kill"
                    );
                    tokio::time::sleep(config.force_kill_timeout).await;
                }
                error!("force killing application");
                std::process::exit(1);
            }
        }
    }

    /// Close every registered client, then every registered resource, in
    /// registration order, then let in-flight responses quiesce.
    async fn drain(&self) {
        let clients: Vec<Client> = self.inner.clients.lock().expect("clients lock").clone();
        let resources: Vec<Arc<dyn Shutdownable>> = self
            .inner
            .resources
            .lock()
            .expect("resources lock")
            .clone();

        for (i, client) in clients.iter().enumerate() {
            info!(client_index = i, "closing Elasticsearch client");
            match Shutdownable::close(client).await {
                Ok(()) => info!(client_index = i, "client closed"),
                Err(err) => error!(client_index = i, error = %err, "error closing client"),
            }
        }

        for (i, resource) in resources.iter().enumerate() {
            info!(resource_index = i, "closing resource");
            match resource.close().await {
                Ok(()) => info!(resource_index = i, "resource closed"),
                Err(err) => error!(resource_index = i, error = %err, "error closing resource"),
            }
        }

        let grace = self.inner.config.grace_period;
        if !grace.is_zero() {
            info!(
                grace_ms = grace.as_millis() as u64,
                "waiting grace period for in-flight operations"
            );
            tokio::time::sleep(grace).await;
        }
    }
}

/// Context handed to workers; fires when shutdown begins.
#[derive(Debug, Clone)]
pub struct ShutdownContext {
    rx: watch::Receiver<bool>,
}

impl ShutdownContext {
    /// True once shutdown has begun.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown begins.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(err) => {
            error!(error = %err, "failed to register SIGINT handler");
            return;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            error!(error = %err, "failed to register SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElasticConfig;

    fn fast_config() -> ShutdownConfig {
        ShutdownConfig {
            timeout: Duration::from_secs(1),
            grace_period: Duration::from_millis(10),
            force_kill_timeout: Duration::from_millis(10),
        }
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Shutdownable for Recorder {
        fn close(&self) -> ShutdownFuture<'_> {
            Box::pin(async move {
                self.log.lock().expect("log lock").push(self.name);
                Ok(())
            })
        }
    }

    #[test]
    fn registration_counts() {
        let manager = ShutdownManager::new(Some(fast_config()));
        assert_eq!(manager.client_count(), 0);
        assert_eq!(manager.resource_count(), 0);

        let client = Client::disconnected(ElasticConfig::default());
        manager.register([client.clone(), client]);
        assert_eq!(manager.client_count(), 2);

        let log = Arc::new(Mutex::new(Vec::new()));
        manager.register_resources([Arc::new(Recorder { name: "r", log }) as Arc<dyn Shutdownable>]);
        assert_eq!(manager.resource_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_closes_clients_then_resources_in_order() {
        let manager = ShutdownManager::new(Some(fast_config()));
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let client_a = Client::disconnected(ElasticConfig::default());
        let client_b = Client::disconnected(ElasticConfig::default());
        manager.register([client_a.clone(), client_b.clone()]);
        manager.register_resources([
            Arc::new(Recorder { name: "first", log: log.clone() }) as Arc<dyn Shutdownable>,
            Arc::new(Recorder { name: "second", log: log.clone() }) as Arc<dyn Shutdownable>,
        ]);

        manager.shutdown().await;

        assert!(client_a.is_closed());
        assert!(client_b.is_closed());
        assert_eq!(*log.lock().expect("log lock"), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn shutdown_cancels_the_context() {
        let manager = ShutdownManager::new(Some(fast_config()));
        let mut context = manager.context();
        assert!(!context.is_cancelled());

        manager.shutdown().await;

        assert!(context.is_cancelled());
        context.cancelled().await;
    }

    #[tokio::test]
    async fn shutdown_completes_within_budget() {
        let manager = ShutdownManager::new(Some(fast_config()));
        manager.register([Client::disconnected(ElasticConfig::default())]);

        let started = Instant::now();
        manager.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn default_timeouts_match_contract() {
        let config = ShutdownConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.grace_period, Duration::from_secs(5));
        assert_eq!(config.force_kill_timeout, Duration::from_secs(10));
    }

    #[test]
    fn manager_from_client_config_uses_connect_timeout() {
        let config = ElasticConfig::default().with_connect_timeout(Duration::from_secs(42));
        let manager = ShutdownManager::from_client_config(&config);
        assert_eq!(manager.inner.config.timeout, Duration::from_secs(42));
    }
}
