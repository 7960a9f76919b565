//! Cluster-level operations.

use serde::Deserialize;
use serde_json::Value;

use opensearch::cluster::{ClusterHealthParts, ClusterStatsParts};
use tracing::debug;

use crate::client::Client;
use crate::documents::DEFAULT_TIMEOUT;
use crate::error::{Error, Result};

/// Cluster health summary.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterHealth {
    /// Cluster name.
    pub cluster_name: String,
    /// Health color: green, yellow, or red.
    pub status: String,
    /// True when the health request itself timed out.
    #[serde(default)]
    pub timed_out: bool,
    /// Number of nodes.
    #[serde(default)]
    pub number_of_nodes: i64,
    /// Number of data nodes.
    #[serde(default)]
    pub number_of_data_nodes: i64,
    /// Active primary shards.
    #[serde(default)]
    pub active_primary_shards: i64,
    /// Active shards, primaries and replicas.
    #[serde(default)]
    pub active_shards: i64,
    /// Shards currently relocating.
    #[serde(default)]
    pub relocating_shards: i64,
    /// Shards currently initializing.
    #[serde(default)]
    pub initializing_shards: i64,
    /// Shards with no live copy.
    #[serde(default)]
    pub unassigned_shards: i64,
    /// Pending cluster-state tasks.
    #[serde(default)]
    pub number_of_pending_tasks: i64,
    /// Active shard percentage.
    #[serde(default)]
    pub active_shards_percent_as_number: f64,
}

/// Document totals in cluster statistics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterDocsStats {
    /// Live document count.
    #[serde(default)]
    pub count: i64,
    /// Deleted-but-unmerged document count.
    #[serde(default)]
    pub deleted: i64,
}

/// Index totals in cluster statistics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterIndicesStats {
    /// Number of indices.
    #[serde(default)]
    pub count: i64,
    /// Document totals.
    #[serde(default)]
    pub docs: ClusterDocsStats,
}

/// Node totals in cluster statistics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterNodesStats {
    /// Node counts by role.
    #[serde(default)]
    pub count: Value,
    /// Versions running in the cluster.
    #[serde(default)]
    pub versions: Vec<String>,
}

/// Cluster statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterStats {
    /// Cluster name.
    pub cluster_name: String,
    /// Overall status.
    #[serde(default)]
    pub status: String,
    /// Index totals.
    #[serde(default)]
    pub indices: ClusterIndicesStats,
    /// Node totals.
    #[serde(default)]
    pub nodes: ClusterNodesStats,
}

/// Cluster operations.
///
/// A stateless reference to the client; cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct Cluster {
    client: Client,
}

impl Cluster {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Cluster health.
    pub async fn health(&self) -> Result<ClusterHealth> {
        let transport = self.client.transport().await?;
        let response = transport
            .cluster()
            .health(ClusterHealthParts::None)
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let health: ClusterHealth = response.json().await.map_err(|err| {
            Error::Decode(format!("failed to decode cluster health response: {err}"))
        })?;

        debug!(
            status = %health.status,
            active_shards = health.active_shards,
            "cluster health retrieved"
        );
        Ok(health)
    }

    /// Cluster statistics.
    pub async fn stats(&self) -> Result<ClusterStats> {
        let transport = self.client.transport().await?;
        let response = transport
            .cluster()
            .stats(ClusterStatsParts::None)
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let stats: ClusterStats = response.json().await.map_err(|err| {
            Error::Decode(format!("failed to decode cluster stats response: {err}"))
        })?;

        debug!(cluster = %stats.cluster_name, "cluster stats retrieved");
        Ok(stats)
    }

    /// Cluster settings, including defaults.
    pub async fn settings(&self) -> Result<Value> {
        let transport = self.client.transport().await?;
        let response = transport
            .cluster()
            .get_settings()
            .include_defaults(true)
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        response.json().await.map_err(|err| {
            Error::Decode(format!("failed to decode cluster settings response: {err}"))
        })
    }

    /// Explain shard allocation, optionally for a specific shard described
    /// by `body`.
    pub async fn allocation_explain(&self, body: Option<Value>) -> Result<Value> {
        let transport = self.client.transport().await?;
        let outcome = match body {
            Some(body) => {
                transport
                    .cluster()
                    .allocation_explain()
                    .request_timeout(DEFAULT_TIMEOUT)
                    .body(body)
                    .send()
                    .await
            }
            None => {
                transport
                    .cluster()
                    .allocation_explain()
                    .request_timeout(DEFAULT_TIMEOUT)
                    .send()
                    .await
            }
        };

        let response = outcome.map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        response.json().await.map_err(|err| {
            Error::Decode(format!(
                "failed to decode allocation explain response: {err}"
            ))
        })
    }
}
