//! Search execution: option composition, typed search, count.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use opensearch::{CountParts, SearchParts};
use serde::Deserialize;
use tracing::debug;

use crate::aggregations::AggregationBuilder;
use crate::client::Client;
use crate::config::format_duration;
use crate::documents::{Documents, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::query::QueryBuilder;
use crate::response::SearchResponse;
use crate::result::SearchResult;
use crate::scroll::ScrollIterator;

/// Default batch size for scroll searches when the caller sets none.
const DEFAULT_SCROLL_SIZE: i64 = 1000;

/// Options composing a search request.
///
/// Scalar options (`size`, `from`, `timeout`, `aggregations`) overwrite on
/// repeat calls; list options (`sort`, `source`) append. Single-owner: build
/// per request, do not share across tasks.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    indices: Vec<String>,
    size: Option<i64>,
    from: Option<i64>,
    sort: Vec<Value>,
    source: Vec<String>,
    aggregations: Option<Value>,
    timeout: Option<String>,
}

impl SearchOptions {
    /// Create empty options; the target defaults to `_all`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the target index set.
    pub fn indices<I, S>(mut self, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices = indices.into_iter().map(Into::into).collect();
        self
    }

    /// Add one target index.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.indices.push(index.into());
        self
    }

    /// Result window size.
    pub fn size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    /// Result window offset.
    pub fn from(mut self, from: i64) -> Self {
        self.from = Some(from);
        self
    }

    /// Append a raw sort clause. Repeat calls accumulate.
    pub fn sort(mut self, sort: Value) -> Self {
        self.sort.push(sort);
        self
    }

    /// Append an ascending sort on a field.
    pub fn sort_asc(self, field: impl Into<String>) -> Self {
        self.sort(json!({ field.into(): { "order": "asc" } }))
    }

    /// Append a descending sort on a field.
    pub fn sort_desc(self, field: impl Into<String>) -> Self {
        self.sort(json!({ field.into(): { "order": "desc" } }))
    }

    /// Append a sort on `_score`.
    pub fn sort_by_score(self, descending: bool) -> Self {
        let order = if descending { "desc" } else { "asc" };
        self.sort(json!({ "_score": { "order": order } }))
    }

    /// Append fields to include in `_source`. Repeat calls accumulate.
    pub fn source<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the whole aggregations object, replacing any previous one.
    pub fn aggregations(mut self, aggregations: Value) -> Self {
        self.aggregations = Some(aggregations);
        self
    }

    /// Merge a named aggregation into the request.
    pub fn aggregation(mut self, name: impl Into<String>, builder: &AggregationBuilder) -> Self {
        let name: String = name.into();
        let aggs = self.aggregations.get_or_insert_with(|| json!({}));
        aggs[name.as_str()] = builder.build();
        self
    }

    /// Server-side search timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(format_duration(timeout));
        self
    }

    pub(crate) fn has_size(&self) -> bool {
        self.size.is_some()
    }

    /// Target indices, defaulting to `_all`.
    pub(crate) fn resolve_indices(&self) -> Vec<String> {
        if self.indices.is_empty() {
            vec!["_all".to_string()]
        } else {
            self.indices.clone()
        }
    }

    /// Mutate a seeded request body with these options.
    pub(crate) fn apply(&self, body: &mut Map<String, Value>) {
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if !self.sort.is_empty() {
            body.insert("sort".to_string(), Value::Array(self.sort.clone()));
        }
        if !self.source.is_empty() {
            body.insert("_source".to_string(), json!(self.source));
        }
        if let Some(aggregations) = &self.aggregations {
            body.insert("aggs".to_string(), aggregations.clone());
        }
        if let Some(timeout) = &self.timeout {
            body.insert("timeout".to_string(), json!(timeout));
        }
    }
}

/// Seed a request body with the query, then apply the options.
pub(crate) fn build_search_body(query: &QueryBuilder, options: &SearchOptions) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("query".to_string(), query.build());
    options.apply(&mut body);
    body
}

pub(crate) async fn execute_search(
    client: &Client,
    body: Map<String, Value>,
    options: &SearchOptions,
    scroll: Option<&str>,
) -> Result<SearchResponse> {
    let transport = client.transport().await?;
    let indices = options.resolve_indices();
    let index_refs: Vec<&str> = indices.iter().map(String::as_str).collect();

    let mut request = transport
        .search(SearchParts::Index(&index_refs))
        .request_timeout(DEFAULT_TIMEOUT);
    if let Some(scroll) = scroll {
        request = request.scroll(scroll);
    }

    let response = request
        .body(Value::Object(body))
        .send()
        .await
        .map_err(Error::transport)?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::server(status.as_u16(), body));
    }

    let result: SearchResponse = response
        .json()
        .await
        .map_err(|err| Error::Decode(format!("failed to decode search response: {err}")))?;

    debug!(
        indices = %indices.join(","),
        hits = result.hits.hits.len(),
        total = result.hits.total.value,
        took = result.took,
        "search completed"
    );
    Ok(result)
}

/// Typed facet over [`Documents`] for a concrete source type `T`.
#[derive(Debug, Clone)]
pub struct TypedDocuments<T> {
    client: Client,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl Documents {
    /// Typed search facet for documents of type `T`.
    pub fn typed<T: DeserializeOwned>(&self) -> TypedDocuments<T> {
        TypedDocuments {
            client: self.client().clone(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Count documents matching a query.
    pub async fn count(&self, query: &QueryBuilder, options: &SearchOptions) -> Result<i64> {
        let transport = self.client().transport().await?;
        let indices = options.resolve_indices();
        let index_refs: Vec<&str> = indices.iter().map(String::as_str).collect();

        let response = transport
            .count(CountParts::Index(&index_refs))
            .request_timeout(DEFAULT_TIMEOUT)
            .body(json!({ "query": query.build() }))
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        #[derive(Deserialize)]
        struct CountResponse {
            count: i64,
        }

        let result: CountResponse = response
            .json()
            .await
            .map_err(|err| Error::Decode(format!("failed to decode count response: {err}")))?;

        debug!(indices = %indices.join(","), count = result.count, "count completed");
        Ok(result.count)
    }
}

impl<T: DeserializeOwned> TypedDocuments<T> {
    /// Run a search and decode every hit source into `T`.
    pub async fn search(
        &self,
        query: &QueryBuilder,
        options: &SearchOptions,
    ) -> Result<SearchResult<T>> {
        let body = build_search_body(query, options);
        let response = execute_search(&self.client, body, options, None).await?;
        SearchResult::from_response(response)
    }

    /// Open a scroll over a large result set.
    ///
    /// The returned iterator holds a live server-side context; pair it with
    /// [`ScrollIterator::close`] (iteration reaching the end releases the
    /// context automatically).
    pub async fn scroll(
        &self,
        query: &QueryBuilder,
        scroll_time: Duration,
        options: &SearchOptions,
    ) -> Result<ScrollIterator<T>> {
        let mut body = build_search_body(query, options);
        if !options.has_size() {
            body.insert("size".to_string(), json!(DEFAULT_SCROLL_SIZE));
        }

        let scroll = format_duration(scroll_time);
        let response = execute_search(&self.client, body, options, Some(&scroll)).await?;

        debug!(
            scroll_id = response.scroll_id.as_deref().unwrap_or(""),
            initial_hits = response.hits.hits.len(),
            total = response.hits.total.value,
            "scroll search started"
        );

        ScrollIterator::from_initial_response(self.client.clone(), scroll, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query;

    #[test]
    fn body_is_seeded_with_the_query() {
        let body = build_search_body(&query::match_all(), &SearchOptions::new());
        assert_eq!(body["query"], json!({ "match_all": {} }));
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn scalar_options_overwrite() {
        let options = SearchOptions::new().size(10).size(25).from(5);
        let mut body = Map::new();
        options.apply(&mut body);
        assert_eq!(body["size"], json!(25));
        assert_eq!(body["from"], json!(5));
    }

    #[test]
    fn list_options_append() {
        let options = SearchOptions::new()
            .sort_desc("created_at")
            .sort_asc("name")
            .source(["name"])
            .source(["age", "email"]);
        let mut body = Map::new();
        options.apply(&mut body);

        let sorts = body["sort"].as_array().unwrap();
        assert_eq!(sorts.len(), 2);
        assert_eq!(sorts[0]["created_at"]["order"], "desc");
        assert_eq!(sorts[1]["name"]["order"], "asc");
        assert_eq!(body["_source"], json!(["name", "age", "email"]));
    }

    #[test]
    fn aggregations_set_and_merge() {
        let options = SearchOptions::new()
            .aggregation("by_category", &AggregationBuilder::terms("category"))
            .aggregation("avg_price", &AggregationBuilder::avg("price"));
        let mut body = Map::new();
        options.apply(&mut body);
        assert!(body["aggs"]["by_category"]["terms"].is_object());
        assert!(body["aggs"]["avg_price"]["avg"].is_object());

        let replaced = SearchOptions::new()
            .aggregation("a", &AggregationBuilder::avg("x"))
            .aggregations(json!({ "b": { "max": { "field": "y" } } }));
        let mut body = Map::new();
        replaced.apply(&mut body);
        assert!(body["aggs"].get("a").is_none());
        assert!(body["aggs"]["b"].is_object());
    }

    #[test]
    fn timeout_uses_service_syntax() {
        let options = SearchOptions::new().timeout(Duration::from_secs(5));
        let mut body = Map::new();
        options.apply(&mut body);
        assert_eq!(body["timeout"], json!("5s"));
    }

    #[test]
    fn indices_default_to_all() {
        assert_eq!(SearchOptions::new().resolve_indices(), vec!["_all"]);
        assert_eq!(
            SearchOptions::new().index("users").resolve_indices(),
            vec!["users"]
        );
        assert_eq!(
            SearchOptions::new()
                .indices(["a", "b"])
                .index("c")
                .resolve_indices(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn sort_by_score_orders() {
        let options = SearchOptions::new().sort_by_score(true);
        let mut body = Map::new();
        options.apply(&mut body);
        assert_eq!(body["sort"][0]["_score"]["order"], "desc");
    }
}
