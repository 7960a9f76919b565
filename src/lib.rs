//! Production Elasticsearch/OpenSearch client with auto-reconnection, typed
//! search, and graceful shutdown.
//!
//! This crate provides a resource-oriented client for Elasticsearch and
//! OpenSearch clusters with support for:
//! - Self-healing connections: background health probing and bounded
//!   exponential-backoff reconnection
//! - Document CRUD with enforced ID and timestamp invariants
//! - Bulk operations with order-preserving results
//! - A typed, composable query and aggregation builder
//! - Generic search results and a lazy scroll iterator that releases its
//!   server-side context
//! - Index, mapping, settings, template, and cluster administration
//! - A graceful-shutdown coordinator with bounded drain timeouts
//!
//! # Example
//!
//! ```rust,no_run
//! use elasticlink::{query, Client, ElasticConfig, SearchOptions};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Article {
//!     title: String,
//!     body: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ElasticConfig::new("localhost:9200");
//!     let client = Client::new(config).await?;
//!
//!     let article = Article {
//!         title: "Hello search".to_string(),
//!         body: "Getting started with full-text search.".to_string(),
//!     };
//!     client.documents().create("articles", &article).await?;
//!
//!     let results = client
//!         .documents()
//!         .typed::<Article>()
//!         .search(
//!             &query::match_query("title", "hello"),
//!             &SearchOptions::new().index("articles").size(10),
//!         )
//!         .await?;
//!
//!     for article in results.documents() {
//!         println!("{}", article.title);
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod aggregations;
mod bulk;
mod client;
mod cluster;
mod config;
mod document;
mod documents;
mod error;
mod index;
pub mod query;
mod response;
mod result;
mod scroll;
mod search;
mod shutdown;

pub use aggregations::AggregationBuilder;
pub use bulk::{BulkAction, BulkIndexer, BulkOperation};
pub use client::{Client, ConnectionStats};
pub use cluster::{Cluster, ClusterHealth, ClusterStats};
pub use config::{ElasticConfig, IdMode, LogFormat, LogLevel, TlsConfig};
pub use document::{generate_ulid, generate_ulid_from_time};
pub use documents::{DocumentHandle, Documents, RefreshPolicy, WriteOptions};
pub use error::{Error, Result};
pub use index::{
    default_index_settings, IndexHandle, IndexInfo, Indices, MappingResource, SettingsResource,
};
pub use query::{QueryBuilder, RangeBuilder};
pub use response::{
    BulkResponse, DeleteResponse, Hit, IndexResponse, SearchResponse, ShardSummary, TotalHits,
    UpdateResponse,
};
pub use result::{DocumentWithId, SearchResult, TypedHit};
pub use scroll::ScrollIterator;
pub use search::{SearchOptions, TypedDocuments};
pub use shutdown::{
    Shutdownable, ShutdownConfig, ShutdownContext, ShutdownFuture, ShutdownManager,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        query, Client, ElasticConfig, Error, Result, SearchOptions, SearchResult, ShutdownManager,
    };
}
