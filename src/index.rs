//! Index management: lifecycle, aliases, mappings, settings, templates.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use opensearch::cat::CatIndicesParts;
use opensearch::http::response::Response;
use opensearch::indices::{
    IndicesAnalyzeParts, IndicesCloneParts, IndicesCloseParts, IndicesCreateParts,
    IndicesDeleteIndexTemplateParts, IndicesDeleteParts, IndicesExistsParts, IndicesFlushParts,
    IndicesGetAliasParts, IndicesGetIndexTemplateParts, IndicesGetMappingParts,
    IndicesGetSettingsParts, IndicesOpenParts, IndicesPutIndexTemplateParts,
    IndicesPutMappingParts, IndicesPutSettingsParts, IndicesRefreshParts, IndicesRolloverParts,
    IndicesShrinkParts, IndicesStatsParts,
};
use tracing::{debug, info};

use crate::client::Client;
use crate::documents::{DocumentHandle, Documents, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};

/// Deadline for flush, which can wait on segment writes.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(120);
/// Deadline for reindex and shrink, which copy data.
const LONG_OP_TIMEOUT: Duration = Duration::from_secs(300);

/// Commonly used settings for new indices.
pub fn default_index_settings() -> Value {
    json!({
        "number_of_shards": 1,
        "number_of_replicas": 1,
        "refresh_interval": "1s"
    })
}

/// Summary line for one index, as reported by the cat API.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexInfo {
    /// Index name.
    pub index: String,
    /// Open/closed status.
    #[serde(default)]
    pub status: String,
    /// Health color.
    #[serde(default)]
    pub health: String,
    /// Primary shard count.
    #[serde(rename = "pri", default)]
    pub primary_shards: String,
    /// Replica shard count.
    #[serde(rename = "rep", default)]
    pub replica_shards: String,
    /// Document count.
    #[serde(rename = "docs.count", default)]
    pub docs_count: String,
    /// Store size.
    #[serde(rename = "store.size", default)]
    pub store_size: String,
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status_code();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::server(status.as_u16(), body))
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    response
        .json()
        .await
        .map_err(|err| Error::Decode(format!("failed to decode {what} response: {err}")))
}

/// Index management operations.
///
/// A stateless reference to the client; cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct Indices {
    client: Client,
}

impl Indices {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create an index with an optional mapping/settings body.
    ///
    /// Fails with [`Error::IndexExists`] when the index is already there.
    pub async fn create(&self, name: &str, body: Option<Value>) -> Result<()> {
        if self.exists(name).await? {
            return Err(Error::IndexExists(name.to_string()));
        }

        let transport = self.client.transport().await?;
        // body() changes the request builder's type, so the two shapes
        // dispatch separately.
        let outcome = match body {
            Some(body) => {
                transport
                    .indices()
                    .create(IndicesCreateParts::Index(name))
                    .request_timeout(DEFAULT_TIMEOUT)
                    .body(body)
                    .send()
                    .await
            }
            None => {
                transport
                    .indices()
                    .create(IndicesCreateParts::Index(name))
                    .request_timeout(DEFAULT_TIMEOUT)
                    .send()
                    .await
            }
        };
        let response = outcome.map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(index = name, "index created");
        Ok(())
    }

    /// Delete an index.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .delete(IndicesDeleteParts::Index(&[name]))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        if response.status_code().as_u16() == 404 {
            return Err(Error::IndexNotFound(name.to_string()));
        }
        ensure_success(response).await?;
        info!(index = name, "index deleted");
        Ok(())
    }

    /// Check whether an index exists.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        Ok(response.status_code().as_u16() == 200)
    }

    /// List all indices with their status and size.
    pub async fn list(&self) -> Result<Vec<IndexInfo>> {
        let transport = self.client.transport().await?;
        let response = transport
            .cat()
            .indices(CatIndicesParts::None)
            .format("json")
            .h(&[
                "index",
                "status",
                "health",
                "pri",
                "rep",
                "docs.count",
                "store.size",
            ])
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        let response = ensure_success(response).await?;
        let indices: Vec<IndexInfo> = decode_json(response, "cat indices").await?;
        debug!(count = indices.len(), "indices listed");
        Ok(indices)
    }

    /// Open a previously closed index.
    pub async fn open(&self, name: &str) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .open(IndicesOpenParts::Index(&[name]))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(index = name, "index opened");
        Ok(())
    }

    /// Close an index, keeping its data but refusing reads and writes.
    pub async fn close(&self, name: &str) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .close(IndicesCloseParts::Index(&[name]))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(index = name, "index closed");
        Ok(())
    }

    /// Refresh the given indices, or all of them when none are named.
    pub async fn refresh(&self, names: &[&str]) -> Result<()> {
        let transport = self.client.transport().await?;
        let parts = if names.is_empty() {
            IndicesRefreshParts::None
        } else {
            IndicesRefreshParts::Index(names)
        };
        let response = transport
            .indices()
            .refresh(parts)
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Flush the given indices, or all of them when none are named.
    pub async fn flush(&self, names: &[&str]) -> Result<()> {
        let transport = self.client.transport().await?;
        let parts = if names.is_empty() {
            IndicesFlushParts::None
        } else {
            IndicesFlushParts::Index(names)
        };
        let response = transport
            .indices()
            .flush(parts)
            .request_timeout(FLUSH_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Statistics for the given indices, or all of them when none are named.
    pub async fn stats(&self, names: &[&str]) -> Result<Value> {
        let transport = self.client.transport().await?;
        let parts = if names.is_empty() {
            IndicesStatsParts::None
        } else {
            IndicesStatsParts::Index(names)
        };
        let response = transport
            .indices()
            .stats(parts)
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        let response = ensure_success(response).await?;
        decode_json(response, "indices stats").await
    }

    /// Clone an index into a new one.
    pub async fn clone_index(&self, source: &str, target: &str) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .clone(IndicesCloneParts::IndexTarget(source, target))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(source, target, "index cloned");
        Ok(())
    }

    /// Copy documents from one index into another.
    ///
    /// `options` may carry a `query` filter (applied to the source) and any
    /// other top-level reindex body keys.
    pub async fn reindex(&self, source: &str, target: &str, options: Option<Value>) -> Result<()> {
        let transport = self.client.transport().await?;

        let mut body = Map::new();
        body.insert("source".to_string(), json!({ "index": source }));
        body.insert("dest".to_string(), json!({ "index": target }));
        if let Some(Value::Object(options)) = options {
            for (key, value) in options {
                if key == "query" {
                    if let Some(source) = body.get_mut("source").and_then(Value::as_object_mut) {
                        source.insert("query".to_string(), value);
                    }
                } else {
                    body.insert(key, value);
                }
            }
        }

        let response = transport
            .reindex()
            .request_timeout(LONG_OP_TIMEOUT)
            .body(Value::Object(body))
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(source, target, "reindex completed");
        Ok(())
    }

    /// Shrink an index into one with fewer shards.
    pub async fn shrink(&self, source: &str, target: &str, target_shards: u32) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .shrink(IndicesShrinkParts::IndexTarget(source, target))
            .request_timeout(LONG_OP_TIMEOUT)
            .body(json!({
                "settings": { "index.number_of_shards": target_shards }
            }))
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(source, target, target_shards, "index shrunk");
        Ok(())
    }

    /// Roll an alias over to a new index when the given conditions are met.
    pub async fn rollover(&self, alias: &str, conditions: Option<Value>) -> Result<Value> {
        let transport = self.client.transport().await?;
        let outcome = match conditions {
            Some(conditions) => {
                transport
                    .indices()
                    .rollover(IndicesRolloverParts::Alias(alias))
                    .request_timeout(DEFAULT_TIMEOUT)
                    .body(conditions)
                    .send()
                    .await
            }
            None => {
                transport
                    .indices()
                    .rollover(IndicesRolloverParts::Alias(alias))
                    .request_timeout(DEFAULT_TIMEOUT)
                    .send()
                    .await
            }
        };
        let response = outcome.map_err(Error::transport)?;
        let response = ensure_success(response).await?;
        decode_json(response, "rollover").await
    }

    /// Test how an analyzer tokenizes text in an index.
    pub async fn analyze(&self, index: &str, text: &str, analyzer: &str) -> Result<Value> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .analyze(IndicesAnalyzeParts::Index(index))
            .request_timeout(DEFAULT_TIMEOUT)
            .body(json!({ "text": text, "analyzer": analyzer }))
            .send()
            .await
            .map_err(Error::transport)?;
        let response = ensure_success(response).await?;
        decode_json(response, "analyze").await
    }

    /// All alias definitions on the cluster.
    pub async fn aliases(&self) -> Result<Value> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .get_alias(IndicesGetAliasParts::None)
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        let response = ensure_success(response).await?;
        decode_json(response, "aliases").await
    }

    /// Point an alias at one or more indices.
    pub async fn alias(&self, alias: &str, indices: &[&str]) -> Result<()> {
        self.update_aliases(alias, indices, "add").await?;
        info!(alias, ?indices, "alias created");
        Ok(())
    }

    /// Remove an alias from one or more indices.
    pub async fn remove_alias(&self, alias: &str, indices: &[&str]) -> Result<()> {
        self.update_aliases(alias, indices, "remove").await?;
        info!(alias, ?indices, "alias removed");
        Ok(())
    }

    async fn update_aliases(&self, alias: &str, indices: &[&str], action: &str) -> Result<()> {
        if indices.is_empty() {
            return Err(Error::Config(
                "at least one index name must be provided".to_string(),
            ));
        }

        let actions: Vec<Value> = indices
            .iter()
            .map(|index| json!({ action: { "index": index, "alias": alias } }))
            .collect();

        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .update_aliases()
            .request_timeout(DEFAULT_TIMEOUT)
            .body(json!({ "actions": actions }))
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Create or replace a composable index template.
    pub async fn create_template(&self, name: &str, template: Value) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .put_index_template(IndicesPutIndexTemplateParts::Name(name))
            .request_timeout(DEFAULT_TIMEOUT)
            .body(template)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(template = name, "index template created");
        Ok(())
    }

    /// Retrieve an index template.
    pub async fn get_template(&self, name: &str) -> Result<Value> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .get_index_template(IndicesGetIndexTemplateParts::Name(&[name]))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        let response = ensure_success(response).await?;
        decode_json(response, "index template").await
    }

    /// Delete an index template.
    pub async fn delete_template(&self, name: &str) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .delete_index_template(IndicesDeleteIndexTemplateParts::Name(name))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(template = name, "index template deleted");
        Ok(())
    }

    /// List all index templates.
    pub async fn list_templates(&self) -> Result<Value> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .get_index_template(IndicesGetIndexTemplateParts::None)
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;
        let response = ensure_success(response).await?;
        decode_json(response, "index templates").await
    }
}

/// Operations on a single index.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    client: Client,
    name: String,
}

impl IndexHandle {
    pub(crate) fn new(client: Client, name: String) -> Self {
        Self { client, name }
    }

    /// The index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn indices(&self) -> Indices {
        Indices::new(self.client.clone())
    }

    /// Create this index with an optional mapping/settings body.
    pub async fn create(&self, body: Option<Value>) -> Result<()> {
        self.indices().create(&self.name, body).await
    }

    /// Delete this index.
    pub async fn delete(&self) -> Result<()> {
        self.indices().delete(&self.name).await
    }

    /// Check whether this index exists.
    pub async fn exists(&self) -> Result<bool> {
        self.indices().exists(&self.name).await
    }

    /// Open this index.
    pub async fn open(&self) -> Result<()> {
        self.indices().open(&self.name).await
    }

    /// Close this index.
    pub async fn close(&self) -> Result<()> {
        self.indices().close(&self.name).await
    }

    /// Refresh this index.
    pub async fn refresh(&self) -> Result<()> {
        self.indices().refresh(&[&self.name]).await
    }

    /// Flush this index.
    pub async fn flush(&self) -> Result<()> {
        self.indices().flush(&[&self.name]).await
    }

    /// Statistics for this index.
    pub async fn stats(&self) -> Result<Value> {
        self.indices().stats(&[&self.name]).await
    }

    /// Clone this index into a new one.
    pub async fn clone_to(&self, target: &str) -> Result<()> {
        self.indices().clone_index(&self.name, target).await
    }

    /// Copy this index's documents into another index.
    pub async fn reindex_to(&self, target: &str, options: Option<Value>) -> Result<()> {
        self.indices().reindex(&self.name, target, options).await
    }

    /// Shrink this index into one with fewer shards.
    pub async fn shrink_to(&self, target: &str, target_shards: u32) -> Result<()> {
        self.indices().shrink(&self.name, target, target_shards).await
    }

    /// Roll this alias over to a new index.
    pub async fn rollover(&self, conditions: Option<Value>) -> Result<Value> {
        self.indices().rollover(&self.name, conditions).await
    }

    /// Test how an analyzer tokenizes text in this index.
    pub async fn analyze(&self, text: &str, analyzer: &str) -> Result<Value> {
        self.indices().analyze(&self.name, text, analyzer).await
    }

    /// Aliases pointing at this index.
    pub async fn aliases(&self) -> Result<Value> {
        let all = self.indices().aliases().await?;
        let mut filtered = Map::new();
        if let Some(entry) = all.get(&self.name) {
            filtered.insert(self.name.clone(), entry.clone());
        }
        Ok(Value::Object(filtered))
    }

    /// Add an alias pointing at this index.
    pub async fn add_alias(&self, alias: &str) -> Result<()> {
        self.indices().alias(alias, &[&self.name]).await
    }

    /// Remove an alias from this index.
    pub async fn remove_alias(&self, alias: &str) -> Result<()> {
        self.indices().remove_alias(alias, &[&self.name]).await
    }

    /// Mapping operations for this index.
    pub fn mapping(&self) -> MappingResource {
        MappingResource {
            client: self.client.clone(),
            index: self.name.clone(),
        }
    }

    /// Settings operations for this index.
    pub fn settings(&self) -> SettingsResource {
        SettingsResource {
            client: self.client.clone(),
            index: self.name.clone(),
        }
    }

    /// Document operations on this index.
    pub fn documents(&self) -> DocumentHandle {
        Documents::new(self.client.clone()).for_index(self.name.clone())
    }
}

/// Mapping operations for one index.
#[derive(Debug, Clone)]
pub struct MappingResource {
    client: Client,
    index: String,
}

impl MappingResource {
    /// The index mapping, unwrapped from the per-index envelope.
    pub async fn get(&self) -> Result<Value> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&[&self.index]))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        if response.status_code().as_u16() == 404 {
            return Err(Error::IndexNotFound(self.index.clone()));
        }
        let response = ensure_success(response).await?;
        let result: Value = decode_json(response, "mapping").await?;

        if let Some(mappings) = result
            .get(&self.index)
            .and_then(|entry| entry.get("mappings"))
        {
            return Ok(mappings.clone());
        }
        Ok(result)
    }

    /// Update the index mapping.
    pub async fn update(&self, mapping: Value) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .put_mapping(IndicesPutMappingParts::Index(&[&self.index]))
            .request_timeout(DEFAULT_TIMEOUT)
            .body(mapping)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(index = %self.index, "mapping updated");
        Ok(())
    }

    /// Create the index with this mapping.
    ///
    /// Errors when the index already exists; use
    /// [`MappingResource::update`] for live indices.
    pub async fn create(&self, mapping: Value) -> Result<()> {
        let indices = Indices::new(self.client.clone());
        if indices.exists(&self.index).await? {
            return Err(Error::IndexExists(format!(
                "cannot create mapping for existing index '{}', use update instead",
                self.index
            )));
        }
        indices.create(&self.index, Some(mapping)).await
    }

    /// The mapping of a single field.
    pub async fn get_field(&self, field: &str) -> Result<Value> {
        let mapping = self.get().await?;
        mapping
            .get("properties")
            .and_then(|properties| properties.get(field))
            .cloned()
            .ok_or_else(|| Error::Mapping(format!("field '{field}' not found in mapping")))
    }

    /// Add a single field to the mapping.
    pub async fn add_field(&self, field: &str, field_mapping: Value) -> Result<()> {
        self.update(json!({ "properties": { field: field_mapping } }))
            .await
    }
}

/// Settings operations for one index.
#[derive(Debug, Clone)]
pub struct SettingsResource {
    client: Client,
    index: String,
}

impl SettingsResource {
    /// The index settings, unwrapped from the per-index envelope.
    pub async fn get(&self) -> Result<Value> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .get_settings(IndicesGetSettingsParts::Index(&[&self.index]))
            .request_timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(Error::transport)?;

        if response.status_code().as_u16() == 404 {
            return Err(Error::IndexNotFound(self.index.clone()));
        }
        let response = ensure_success(response).await?;
        let result: Value = decode_json(response, "settings").await?;

        if let Some(settings) = result
            .get(&self.index)
            .and_then(|entry| entry.get("settings"))
        {
            return Ok(settings.clone());
        }
        Ok(result)
    }

    /// Update the index settings.
    pub async fn update(&self, settings: Value) -> Result<()> {
        let transport = self.client.transport().await?;
        let response = transport
            .indices()
            .put_settings(IndicesPutSettingsParts::Index(&[&self.index]))
            .request_timeout(DEFAULT_TIMEOUT)
            .body(settings)
            .send()
            .await
            .map_err(Error::transport)?;
        ensure_success(response).await?;
        info!(index = %self.index, "settings updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElasticConfig;

    fn offline_indices() -> Indices {
        Client::disconnected(ElasticConfig::default()).indices()
    }

    #[tokio::test]
    async fn alias_with_no_indices_is_config_invalid() {
        let indices = offline_indices();
        let err = indices.alias("all-users", &[]).await.unwrap_err();
        assert!(err.is_config());

        let err = indices.remove_alias("all-users", &[]).await.unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn default_settings_shape() {
        let settings = default_index_settings();
        assert_eq!(settings["number_of_shards"], 1);
        assert_eq!(settings["number_of_replicas"], 1);
        assert_eq!(settings["refresh_interval"], "1s");
    }

    #[test]
    fn index_info_decodes_cat_output() {
        let body = json!([{
            "index": "users",
            "status": "open",
            "health": "green",
            "pri": "1",
            "rep": "1",
            "docs.count": "42",
            "store.size": "10.2kb"
        }]);
        let infos: Vec<IndexInfo> = serde_json::from_value(body).unwrap();
        assert_eq!(infos[0].index, "users");
        assert_eq!(infos[0].docs_count, "42");
        assert_eq!(infos[0].store_size, "10.2kb");
    }

    #[tokio::test]
    async fn operations_fail_cleanly_when_disconnected() {
        let indices = offline_indices();
        assert!(indices.exists("users").await.unwrap_err().is_connection());
        assert!(indices.list().await.unwrap_err().is_connection());

        let client = Client::disconnected(ElasticConfig::default());
        let handle = client.index("users");
        assert!(handle.mapping().get().await.unwrap_err().is_connection());
        assert!(handle.settings().get().await.unwrap_err().is_connection());
    }
}
