//! Single-document CRUD operations.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use opensearch::params::Refresh;
use opensearch::{
    CreateParts, DeleteByQueryParts, DeleteParts, ExistsParts, GetParts, IndexParts, MgetParts,
    UpdateByQueryParts, UpdateParts,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::Client;
use crate::document::{enhance, take_document_id};
use crate::error::{Error, Result};
use crate::response::{DeleteResponse, IndexResponse, UpdateResponse};

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const BY_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Refresh behavior for write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Block until the write is searchable (default).
    #[default]
    WaitFor,
    /// Force an immediate refresh.
    Immediate,
    /// Do not refresh; the write becomes searchable on the next cycle.
    None,
}

impl RefreshPolicy {
    fn to_param(self) -> Refresh {
        match self {
            RefreshPolicy::WaitFor => Refresh::WaitFor,
            RefreshPolicy::Immediate => Refresh::True,
            RefreshPolicy::None => Refresh::False,
        }
    }
}

/// Per-operation options for write paths.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Refresh behavior; defaults to `wait_for`.
    pub refresh: RefreshPolicy,
}

/// Document operations across all indices.
///
/// A stateless reference to the client; cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct Documents {
    client: Client,
}

impl Documents {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Handle for document operations on one index.
    pub fn for_index(&self, index: impl Into<String>) -> DocumentHandle {
        DocumentHandle {
            client: self.client.clone(),
            index: index.into(),
        }
    }

    /// Retrieve a document's source by ID.
    pub async fn get(&self, index: &str, id: &str) -> Result<Map<String, Value>> {
        self.for_index(index).get(id).await
    }

    /// Retrieve multiple documents in one round trip.
    pub async fn get_many(&self, index: &str, ids: &[&str]) -> Result<Vec<Map<String, Value>>> {
        self.for_index(index).get_many(ids).await
    }

    /// Create a document, letting the ID policy assign its identifier.
    pub async fn create<T: Serialize>(&self, index: &str, document: &T) -> Result<IndexResponse> {
        self.for_index(index).create(document).await
    }

    /// Create a document with a specific ID; fails if it already exists.
    pub async fn create_with_id<T: Serialize>(
        &self,
        index: &str,
        id: &str,
        document: &T,
    ) -> Result<IndexResponse> {
        self.for_index(index).create_with_id(id, document).await
    }

    /// Create or replace a document.
    pub async fn index<T: Serialize>(
        &self,
        index: &str,
        id: Option<&str>,
        document: &T,
    ) -> Result<IndexResponse> {
        self.for_index(index).index(id, document).await
    }

    /// Partially update a document.
    pub async fn update(&self, index: &str, id: &str, patch: Value) -> Result<UpdateResponse> {
        self.for_index(index).update(id, patch).await
    }

    /// Delete a document by ID.
    pub async fn delete(&self, index: &str, id: &str) -> Result<DeleteResponse> {
        self.for_index(index).delete(id).await
    }

    /// Check whether a document exists.
    pub async fn exists(&self, index: &str, id: &str) -> Result<bool> {
        self.for_index(index).exists(id).await
    }

    /// Update every document matching a query.
    pub async fn update_by_query(
        &self,
        index: &str,
        query: Value,
        script: Option<Value>,
    ) -> Result<Value> {
        self.for_index(index).update_by_query(query, script).await
    }

    /// Delete every document matching a query.
    pub async fn delete_by_query(&self, index: &str, query: Value) -> Result<Value> {
        self.for_index(index).delete_by_query(query).await
    }
}

/// Document operations scoped to a single index.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    client: Client,
    index: String,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct MgetResponse {
    docs: Vec<GetResponse>,
}

impl DocumentHandle {
    /// The index this handle targets.
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Create a document, letting the ID policy assign its identifier.
    pub async fn create<T: Serialize>(&self, document: &T) -> Result<IndexResponse> {
        self.index(None, document).await
    }

    /// Create or replace a document with `refresh=wait_for`.
    pub async fn index<T: Serialize>(
        &self,
        id: Option<&str>,
        document: &T,
    ) -> Result<IndexResponse> {
        self.index_with_options(id, document, &WriteOptions::default())
            .await
    }

    /// Create or replace a document with explicit write options.
    pub async fn index_with_options<T: Serialize>(
        &self,
        id: Option<&str>,
        document: &T,
        options: &WriteOptions,
    ) -> Result<IndexResponse> {
        let transport = self.client.transport().await?;
        let mut body = enhance(self.client.config(), document);

        // An enhancer- or caller-injected _id routes the write; it must not
        // stay inside _source.
        let enhanced_id = take_document_id(&mut body);
        let doc_id = id.map(str::to_string).or(enhanced_id);

        let parts = match doc_id.as_deref() {
            Some(doc_id) => IndexParts::IndexId(&self.index, doc_id),
            None => IndexParts::Index(&self.index),
        };

        let response = transport
            .index(parts)
            .refresh(options.refresh.to_param())
            .request_timeout(DEFAULT_TIMEOUT)
            .body(Value::Object(body))
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let result: IndexResponse = response
            .json()
            .await
            .map_err(|err| Error::Decode(format!("failed to decode index response: {err}")))?;

        info!(
            index = %self.index,
            id = %result.id,
            result = %result.result,
            "document indexed"
        );
        Ok(result)
    }

    /// Create a document with a specific ID via the `_create` endpoint.
    ///
    /// Fails with [`Error::DocumentExists`] when the ID is already taken;
    /// the stored document is left untouched in that case.
    pub async fn create_with_id<T: Serialize>(
        &self,
        id: &str,
        document: &T,
    ) -> Result<IndexResponse> {
        self.create_with_id_with_options(id, document, &WriteOptions::default())
            .await
    }

    /// Create-only write with explicit write options.
    pub async fn create_with_id_with_options<T: Serialize>(
        &self,
        id: &str,
        document: &T,
        options: &WriteOptions,
    ) -> Result<IndexResponse> {
        let transport = self.client.transport().await?;
        let mut body = enhance(self.client.config(), document);
        let _ = take_document_id(&mut body);

        let response = transport
            .create(CreateParts::IndexId(&self.index, id))
            .refresh(options.refresh.to_param())
            .request_timeout(DEFAULT_TIMEOUT)
            .body(Value::Object(body))
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if status.as_u16() == 409 {
            return Err(Error::DocumentExists {
                index: self.index.clone(),
                id: id.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let result: IndexResponse = response
            .json()
            .await
            .map_err(|err| Error::Decode(format!("failed to decode create response: {err}")))?;

        info!(
            index = %self.index,
            id = %result.id,
            result = %result.result,
            "document created"
        );
        Ok(result)
    }

    /// Retrieve a document's source by ID.
    pub async fn get(&self, id: &str) -> Result<Map<String, Value>> {
        let transport = self.client.transport().await?;

        let response = transport
            .get(GetParts::IndexId(&self.index, id))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(self.not_found(id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let result: GetResponse = response
            .json()
            .await
            .map_err(|err| Error::Decode(format!("failed to decode get response: {err}")))?;

        if !result.found {
            return Err(self.not_found(id));
        }

        debug!(index = %self.index, id, "document retrieved");
        Ok(result.source.unwrap_or_default())
    }

    /// Retrieve multiple documents via `_mget` in one round trip.
    ///
    /// Found sources are returned in request order; missing IDs are omitted.
    pub async fn get_many(&self, ids: &[&str]) -> Result<Vec<Map<String, Value>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let transport = self.client.transport().await?;
        let docs: Vec<Value> = ids.iter().map(|id| json!({ "_id": id })).collect();

        let response = transport
            .mget(MgetParts::Index(&self.index))
            .request_timeout(DEFAULT_TIMEOUT)
            .body(json!({ "docs": docs }))
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let result: MgetResponse = response
            .json()
            .await
            .map_err(|err| Error::Decode(format!("failed to decode mget response: {err}")))?;

        let documents: Vec<Map<String, Value>> = result
            .docs
            .into_iter()
            .filter(|doc| doc.found)
            .filter_map(|doc| doc.source)
            .collect();

        debug!(
            index = %self.index,
            requested = ids.len(),
            found = documents.len(),
            "documents retrieved"
        );
        Ok(documents)
    }

    /// Partially update a document with `{doc: patch}`.
    ///
    /// `patch` must be a JSON object; `updated_at` is stamped when the caller
    /// did not set it.
    pub async fn update(&self, id: &str, patch: Value) -> Result<UpdateResponse> {
        self.update_with_options(id, patch, &WriteOptions::default())
            .await
    }

    /// Partial update with explicit write options.
    pub async fn update_with_options(
        &self,
        id: &str,
        patch: Value,
        options: &WriteOptions,
    ) -> Result<UpdateResponse> {
        let Value::Object(mut patch) = patch else {
            return Err(Error::Contract(
                "update patch must be a JSON object".to_string(),
            ));
        };
        patch
            .entry("updated_at")
            .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));

        let transport = self.client.transport().await?;
        let response = transport
            .update(UpdateParts::IndexId(&self.index, id))
            .refresh(options.refresh.to_param())
            .request_timeout(DEFAULT_TIMEOUT)
            .body(json!({ "doc": patch }))
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(self.not_found(id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let result: UpdateResponse = response
            .json()
            .await
            .map_err(|err| Error::Decode(format!("failed to decode update response: {err}")))?;

        info!(
            index = %self.index,
            id,
            result = %result.result,
            "document updated"
        );
        Ok(result)
    }

    /// Delete a document by ID.
    pub async fn delete(&self, id: &str) -> Result<DeleteResponse> {
        self.delete_with_options(id, &WriteOptions::default()).await
    }

    /// Delete with explicit write options.
    pub async fn delete_with_options(
        &self,
        id: &str,
        options: &WriteOptions,
    ) -> Result<DeleteResponse> {
        let transport = self.client.transport().await?;
        let response = transport
            .delete(DeleteParts::IndexId(&self.index, id))
            .refresh(options.refresh.to_param())
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(self.not_found(id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let result: DeleteResponse = response
            .json()
            .await
            .map_err(|err| Error::Decode(format!("failed to decode delete response: {err}")))?;

        info!(
            index = %self.index,
            id,
            result = %result.result,
            "document deleted"
        );
        Ok(result)
    }

    /// Check whether a document exists via a HEAD request.
    ///
    /// 200 means it exists, 404 means it does not; any other status is an
    /// error.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let transport = self.client.transport().await?;
        let response = transport
            .exists(ExistsParts::IndexId(&self.index, id))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::server(status, body))
            }
        }
    }

    /// Update every document matching `query`, optionally with a script.
    pub async fn update_by_query(&self, query: Value, script: Option<Value>) -> Result<Value> {
        let transport = self.client.transport().await?;

        let mut body = Map::new();
        body.insert("query".to_string(), query);
        if let Some(script) = script {
            body.insert("script".to_string(), script);
        }

        let response = transport
            .update_by_query(UpdateByQueryParts::Index(&[&self.index]))
            .request_timeout(BY_QUERY_TIMEOUT)
            .body(Value::Object(body))
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let result: Value = response.json().await.map_err(|err| {
            Error::Decode(format!("failed to decode update-by-query response: {err}"))
        })?;

        info!(index = %self.index, "update by query completed");
        Ok(result)
    }

    /// Delete every document matching `query`.
    pub async fn delete_by_query(&self, query: Value) -> Result<Value> {
        let transport = self.client.transport().await?;

        let response = transport
            .delete_by_query(DeleteByQueryParts::Index(&[&self.index]))
            .request_timeout(BY_QUERY_TIMEOUT)
            .body(json!({ "query": query }))
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let result: Value = response.json().await.map_err(|err| {
            Error::Decode(format!("failed to decode delete-by-query response: {err}"))
        })?;

        info!(index = %self.index, "delete by query completed");
        Ok(result)
    }

    fn not_found(&self, id: &str) -> Error {
        Error::NotFound {
            index: self.index.clone(),
            id: id.to_string(),
        }
    }
}
