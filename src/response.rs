//! Wire-level response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shard summary attached to write and search responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardSummary {
    /// Shards the operation targeted.
    pub total: i64,
    /// Shards that executed successfully.
    pub successful: i64,
    /// Shards skipped during execution.
    #[serde(default)]
    pub skipped: i64,
    /// Shards that failed.
    pub failed: i64,
}

/// Response from an index or create operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    /// Index the document was written to.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document ID, server-assigned when none was supplied.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document version after the write.
    #[serde(rename = "_version")]
    pub version: i64,
    /// Operation outcome, e.g. `created` or `updated`.
    pub result: String,
    /// Shard summary.
    #[serde(rename = "_shards", default)]
    pub shards: ShardSummary,
    /// Sequence number assigned to the operation.
    #[serde(rename = "_seq_no", default)]
    pub seq_no: i64,
    /// Primary term at the time of the operation.
    #[serde(rename = "_primary_term", default)]
    pub primary_term: i64,
}

/// Response from an update operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Index the document lives in.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document version after the update.
    #[serde(rename = "_version")]
    pub version: i64,
    /// Operation outcome, e.g. `updated` or `noop`.
    pub result: String,
    /// Shard summary.
    #[serde(rename = "_shards", default)]
    pub shards: ShardSummary,
    /// Sequence number assigned to the operation.
    #[serde(rename = "_seq_no", default)]
    pub seq_no: i64,
    /// Primary term at the time of the operation.
    #[serde(rename = "_primary_term", default)]
    pub primary_term: i64,
}

/// Response from a delete operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Index the document was removed from.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document version after the delete.
    #[serde(rename = "_version")]
    pub version: i64,
    /// Operation outcome, e.g. `deleted`.
    pub result: String,
    /// Shard summary.
    #[serde(rename = "_shards", default)]
    pub shards: ShardSummary,
    /// Sequence number assigned to the operation.
    #[serde(rename = "_seq_no", default)]
    pub seq_no: i64,
    /// Primary term at the time of the operation.
    #[serde(rename = "_primary_term", default)]
    pub primary_term: i64,
}

/// Response from a bulk request. Items preserve operation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Server-side execution time in milliseconds.
    pub took: i64,
    /// True when at least one item failed.
    pub errors: bool,
    /// Per-item results, one per operation, in submission order.
    pub items: Vec<Value>,
}

/// Total hit count with its accuracy relation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotalHits {
    /// Hit count (exact or a lower bound, per `relation`).
    pub value: i64,
    /// `"eq"` for exact counts, `"gte"` for lower bounds.
    #[serde(default)]
    pub relation: String,
}

/// A single untyped search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    /// Index the hit came from.
    #[serde(rename = "_index", default)]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Relevance score; absent under certain sorts.
    #[serde(rename = "_score")]
    pub score: Option<f64>,
    /// Document source; absent when source filtering removes it.
    #[serde(rename = "_source")]
    pub source: Option<Value>,
    /// Sort keys, present when the search sorts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Value>>,
    /// Stored or runtime fields requested by the search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
    /// Highlighted fragments keyed by field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<HashMap<String, Vec<String>>>,
    /// Inner hits for nested/parent-child queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_hits: Option<Value>,
    /// Score explanation, present when requested.
    #[serde(rename = "_explanation", default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Value>,
}

/// Hits envelope of a search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitsEnvelope {
    /// Total hit count.
    #[serde(default)]
    pub total: TotalHits,
    /// Maximum score over the returned hits.
    #[serde(default)]
    pub max_score: Option<f64>,
    /// Returned hits in server order.
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Untyped response from a search or scroll request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Server-side execution time in milliseconds.
    pub took: i64,
    /// True when the search timed out server-side.
    pub timed_out: bool,
    /// Scroll ID, present on scroll searches.
    #[serde(rename = "_scroll_id", default, skip_serializing_if = "Option::is_none")]
    pub scroll_id: Option<String>,
    /// Shard summary.
    #[serde(rename = "_shards", default)]
    pub shards: ShardSummary,
    /// Hits envelope.
    pub hits: HitsEnvelope,
    /// Aggregation results, opaque to the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
    /// Suggester results, opaque to the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggest: Option<Value>,
}
