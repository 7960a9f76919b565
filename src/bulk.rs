//! Bulk operations: fluent accumulation and NDJSON dispatch.

use serde::Serialize;
use serde_json::{json, Map, Value};

use opensearch::http::request::JsonBody;
use opensearch::BulkParts;
use tracing::info;

use crate::client::Client;
use crate::config::ElasticConfig;
use crate::document::{enhance, take_document_id};
use crate::documents::{Documents, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::response::BulkResponse;

/// Action of a single bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    /// Create or replace.
    Index,
    /// Create-only; the item fails if the ID exists.
    Create,
    /// Partial update.
    Update,
    /// Remove by ID.
    Delete,
}

impl BulkAction {
    fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Create => "create",
            BulkAction::Update => "update",
            BulkAction::Delete => "delete",
        }
    }
}

/// A single operation in a bulk request.
#[derive(Debug, Clone)]
pub struct BulkOperation {
    /// Operation action.
    pub action: BulkAction,
    /// Target index.
    pub index: String,
    /// Document ID; omitted from the action line when absent.
    pub id: Option<String>,
    /// Document body for index/create, partial doc for update.
    pub document: Option<Value>,
    /// Script for scripted updates.
    pub script: Option<Value>,
    /// Treat the update document as an upsert.
    pub doc_as_upsert: bool,
}

impl BulkOperation {
    /// Render this operation as its wire lines: one action line, followed by
    /// a body line for every action except delete.
    pub(crate) fn to_lines(&self, config: &ElasticConfig) -> Result<Vec<Value>> {
        let mut action_meta = Map::new();
        action_meta.insert("_index".to_string(), Value::String(self.index.clone()));

        let mut body_line = None;
        match self.action {
            BulkAction::Index | BulkAction::Create => {
                let document = self.document.as_ref().ok_or_else(|| {
                    Error::Contract(format!(
                        "{} bulk operation requires a document",
                        self.action.as_str()
                    ))
                })?;
                let mut enhanced = enhance(config, document);
                // An enhancer-assigned ID moves to the action line; explicit
                // IDs win over it.
                let enhanced_id = take_document_id(&mut enhanced);
                if let Some(id) = self.id.clone().or(enhanced_id) {
                    action_meta.insert("_id".to_string(), Value::String(id));
                }
                body_line = Some(Value::Object(enhanced));
            }
            BulkAction::Update => {
                if let Some(id) = &self.id {
                    action_meta.insert("_id".to_string(), Value::String(id.clone()));
                }
                let mut update = Map::new();
                if let Some(document) = &self.document {
                    update.insert("doc".to_string(), document.clone());
                    if self.doc_as_upsert {
                        update.insert("doc_as_upsert".to_string(), Value::Bool(true));
                    }
                }
                if let Some(script) = &self.script {
                    update.insert("script".to_string(), script.clone());
                }
                if update.is_empty() {
                    return Err(Error::Contract(
                        "update bulk operation requires a document or script".to_string(),
                    ));
                }
                body_line = Some(Value::Object(update));
            }
            BulkAction::Delete => {
                if let Some(id) = &self.id {
                    action_meta.insert("_id".to_string(), Value::String(id.clone()));
                }
            }
        }

        let action_line = json!({ self.action.as_str(): Value::Object(action_meta) });
        let mut lines = vec![action_line];
        if let Some(body) = body_line {
            lines.push(body);
        }
        Ok(lines)
    }
}

/// Fluent accumulator for bulk operations against one index.
///
/// Single-owner: build it, append operations, then dispatch with
/// [`BulkIndexer::send`]. Operation order is preserved on the wire and in
/// the per-item results.
#[derive(Debug)]
pub struct BulkIndexer {
    client: Client,
    index: String,
    operations: Vec<BulkOperation>,
    error: Option<Error>,
}

impl BulkIndexer {
    pub(crate) fn new(client: Client, index: String) -> Self {
        Self {
            client,
            index,
            operations: Vec::new(),
            error: None,
        }
    }

    fn push(mut self, operation: BulkOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Serialize the document now; a failure is latched and surfaced by
    /// [`BulkIndexer::send`] instead of letting a placeholder document reach
    /// the wire.
    fn push_with_document<T: Serialize>(
        mut self,
        action: BulkAction,
        id: Option<String>,
        document: &T,
        doc_as_upsert: bool,
    ) -> Self {
        match serde_json::to_value(document) {
            Ok(document) => {
                let index = self.index.clone();
                self.operations.push(BulkOperation {
                    action,
                    index,
                    id,
                    document: Some(document),
                    script: None,
                    doc_as_upsert,
                });
            }
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(Error::Decode(format!(
                        "failed to serialize bulk document: {err}"
                    )));
                }
            }
        }
        self
    }

    /// Append a create operation; the ID policy assigns its identifier.
    pub fn create<T: Serialize>(self, document: &T) -> Self {
        self.push_with_document(BulkAction::Create, None, document, false)
    }

    /// Append a create operation with a specific ID.
    pub fn create_with_id<T: Serialize>(self, id: impl Into<String>, document: &T) -> Self {
        self.push_with_document(BulkAction::Create, Some(id.into()), document, false)
    }

    /// Append an index (create-or-replace) operation.
    pub fn index<T: Serialize>(self, id: impl Into<String>, document: &T) -> Self {
        self.push_with_document(BulkAction::Index, Some(id.into()), document, false)
    }

    /// Append a partial update operation.
    pub fn update<T: Serialize>(self, id: impl Into<String>, document: &T) -> Self {
        self.push_with_document(BulkAction::Update, Some(id.into()), document, false)
    }

    /// Append an upsert: update when present, insert the document otherwise.
    pub fn upsert<T: Serialize>(self, id: impl Into<String>, document: &T) -> Self {
        self.push_with_document(BulkAction::Update, Some(id.into()), document, true)
    }

    /// Append a scripted update operation.
    pub fn update_with_script(self, id: impl Into<String>, script: Value) -> Self {
        let index = self.index.clone();
        self.push(BulkOperation {
            action: BulkAction::Update,
            index,
            id: Some(id.into()),
            document: None,
            script: Some(script),
            doc_as_upsert: false,
        })
    }

    /// Append a delete operation.
    pub fn delete(self, id: impl Into<String>) -> Self {
        let index = self.index.clone();
        self.push(BulkOperation {
            action: BulkAction::Delete,
            index,
            id: Some(id.into()),
            document: None,
            script: None,
            doc_as_upsert: false,
        })
    }

    /// Number of accumulated operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True when no operations have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Dispatch all accumulated operations in one request.
    ///
    /// A document that failed to serialize while accumulating fails the
    /// whole dispatch. The result preserves per-item ordering; `errors` is
    /// true when any item failed. Partial failures are not retried; inspect
    /// the items.
    pub async fn send(self) -> Result<BulkResponse> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.operations.is_empty() {
            return Err(Error::Contract("no bulk operations provided".to_string()));
        }

        let mut lines = Vec::with_capacity(self.operations.len() * 2);
        for operation in &self.operations {
            lines.extend(operation.to_lines(self.client.config())?);
        }

        let count = self.operations.len();
        let response = send_lines(&self.client, lines).await?;

        info!(
            index = %self.index,
            operations = count,
            took = response.took,
            errors = response.errors,
            "bulk request completed"
        );
        Ok(response)
    }
}

async fn send_lines(client: &Client, lines: Vec<Value>) -> Result<BulkResponse> {
    let transport = client.transport().await?;
    let body: Vec<JsonBody<Value>> = lines.into_iter().map(Into::into).collect();

    let response = transport
        .bulk(BulkParts::None)
        .request_timeout(DEFAULT_TIMEOUT)
        .body(body)
        .send()
        .await
        .map_err(Error::transport)?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::server(status.as_u16(), body));
    }

    response
        .json()
        .await
        .map_err(|err| Error::Decode(format!("failed to decode bulk response: {err}")))
}

impl Documents {
    /// Fluent bulk accumulator for one index.
    pub fn bulk(&self, index: impl Into<String>) -> BulkIndexer {
        BulkIndexer::new(self.client().clone(), index.into())
    }

    /// Dispatch pre-formed action/body lines for callers that need exact
    /// control over the payload.
    pub async fn bulk_raw(&self, lines: Vec<Value>) -> Result<BulkResponse> {
        if lines.is_empty() {
            return Err(Error::Contract("no bulk operations provided".to_string()));
        }
        send_lines(self.client(), lines).await
    }
}
