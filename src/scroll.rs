//! Lazy scroll iteration with guaranteed context release.

use serde::de::DeserializeOwned;
use serde_json::json;

use opensearch::ClearScrollParts;
use tracing::{debug, warn};

use crate::client::Client;
use crate::documents::DEFAULT_TIMEOUT;
use crate::error::{Error, Result};
use crate::response::SearchResponse;
use crate::result::{convert_hit, TypedHit};

/// Lazy cursor over a large result set backed by a server-side scroll
/// context.
///
/// For every context opened, exactly one clear-scroll is issued: either by
/// the terminal transition (an empty batch fetched) or by an explicit
/// [`ScrollIterator::close`], whichever happens first. A canceled iteration
/// leaves the context live until `close` runs, so pair every scroll with a
/// close. Not safe for concurrent use.
#[derive(Debug)]
pub struct ScrollIterator<T> {
    client: Client,
    scroll_id: String,
    scroll_time: String,
    hits: Vec<TypedHit<T>>,
    index: isize,
    done: bool,
    error: Option<Error>,
    total_hits: i64,
    processed: u64,
}

impl<T: DeserializeOwned> ScrollIterator<T> {
    /// Build an iterator from the initial scroll response. A decode failure
    /// releases the just-opened context before surfacing the error.
    pub(crate) async fn from_initial_response(
        client: Client,
        scroll_time: String,
        response: SearchResponse,
    ) -> Result<Self> {
        let scroll_id = response.scroll_id.unwrap_or_default();
        let total_hits = response.hits.total.value;

        let converted: Result<Vec<TypedHit<T>>> =
            response.hits.hits.into_iter().map(convert_hit::<T>).collect();

        match converted {
            Ok(hits) => Ok(Self {
                client,
                scroll_id,
                scroll_time,
                hits,
                index: -1,
                done: false,
                error: None,
                total_hits,
                processed: 0,
            }),
            Err(err) => {
                if !scroll_id.is_empty() {
                    if let Err(clear_err) = clear_scroll(&client, &scroll_id).await {
                        warn!(
                            scroll_id = %scroll_id,
                            error = %clear_err,
                            "failed to clear scroll context"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Advance to the next document.
    ///
    /// Walks the current batch, then fetches the next one with the last
    /// scroll ID. Returns `false` once iteration is complete or an error is
    /// recorded; check [`ScrollIterator::err`] to distinguish.
    pub async fn next(&mut self) -> bool {
        if self.error.is_some() || self.done {
            return false;
        }

        if self.index + 1 < self.hits.len() as isize {
            self.index += 1;
            self.processed += 1;
            return true;
        }

        if self.scroll_id.is_empty() {
            self.done = true;
            return false;
        }

        if let Err(err) = self.fetch_next_batch().await {
            self.error = Some(err);
            return false;
        }

        if self.hits.is_empty() {
            self.done = true;
            self.release().await;
            return false;
        }

        self.index = 0;
        self.processed += 1;
        true
    }

    async fn fetch_next_batch(&mut self) -> Result<()> {
        let transport = self.client.transport().await?;

        let response = transport
            .scroll(opensearch::ScrollParts::None)
            .request_timeout(DEFAULT_TIMEOUT)
            .body(json!({
                "scroll": self.scroll_time,
                "scroll_id": self.scroll_id,
            }))
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
            .map_err(|err| Error::Decode(format!("failed to decode scroll response: {err}")))?;

        self.scroll_id = result.scroll_id.unwrap_or_default();
        self.hits = result
            .hits
            .hits
            .into_iter()
            .map(convert_hit::<T>)
            .collect::<Result<Vec<_>>>()?;
        self.index = -1;

        debug!(
            scroll_id = %self.scroll_id,
            batch_size = self.hits.len(),
            processed = self.processed,
            "fetched next scroll batch"
        );
        Ok(())
    }
}

impl<T> ScrollIterator<T> {
    fn current_position(&self) -> Option<usize> {
        if self.index < 0 || self.index >= self.hits.len() as isize {
            None
        } else {
            Some(self.index as usize)
        }
    }

    /// The current document, or `None` outside a valid position.
    pub fn current(&self) -> Option<&T> {
        self.current_position().map(|i| &self.hits[i].source)
    }

    /// The current hit with its metadata, or `None` outside a valid position.
    pub fn current_hit(&self) -> Option<&TypedHit<T>> {
        self.current_position().map(|i| &self.hits[i])
    }

    /// Copy the current document into `dest`.
    ///
    /// Fails with [`Error::Contract`] before the first successful
    /// [`ScrollIterator::next`] or after it returned `false`.
    pub fn scan(&self, dest: &mut T) -> Result<()>
    where
        T: Clone,
    {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        match self.current() {
            Some(source) => {
                *dest = source.clone();
                Ok(())
            }
            None => Err(Error::Contract(
                "no current document - call next() first".to_string(),
            )),
        }
    }

    /// The sticky iteration error, if one occurred.
    pub fn err(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Total hits matched by the search.
    pub fn total_hits(&self) -> i64 {
        self.total_hits
    }

    /// Documents yielded so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Release the server-side scroll context.
    ///
    /// Idempotent; called automatically when iteration reaches the end.
    pub async fn close(&mut self) -> Result<()> {
        if self.scroll_id.is_empty() {
            return Ok(());
        }
        let result = clear_scroll(&self.client, &self.scroll_id).await;
        self.scroll_id.clear();
        result
    }

    /// Terminal-path release: log a warning instead of surfacing failures so
    /// the primary iteration outcome is preserved.
    async fn release(&mut self) {
        if self.scroll_id.is_empty() {
            return;
        }
        if let Err(err) = clear_scroll(&self.client, &self.scroll_id).await {
            warn!(
                scroll_id = %self.scroll_id,
                error = %err,
                "failed to clear scroll context"
            );
        }
        self.scroll_id.clear();
    }
}

async fn clear_scroll(client: &Client, scroll_id: &str) -> Result<()> {
    let transport = client.transport().await?;

    let response = transport
        .clear_scroll(ClearScrollParts::None)
        .request_timeout(DEFAULT_TIMEOUT)
        .body(json!({ "scroll_id": [scroll_id] }))
        .send()
        .await
        .map_err(Error::transport)?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::server(status.as_u16(), body));
    }

    debug!(scroll_id, "scroll context cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElasticConfig;
    use serde_json::{json, Value};

    async fn iterator_with(
        scroll_id: Option<&str>,
        sources: &[Value],
    ) -> ScrollIterator<Value> {
        let response: SearchResponse = serde_json::from_value(json!({
            "took": 1,
            "timed_out": false,
            "_scroll_id": scroll_id,
            "hits": {
                "total": {"value": sources.len(), "relation": "eq"},
                "hits": sources
                    .iter()
                    .enumerate()
                    .map(|(i, source)| json!({
                        "_index": "users",
                        "_id": (i + 1).to_string(),
                        "_score": 1.0,
                        "_source": source
                    }))
                    .collect::<Vec<_>>()
            }
        }))
        .unwrap();

        ScrollIterator::from_initial_response(
            Client::disconnected(ElasticConfig::default()),
            "1m".to_string(),
            response,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn walks_a_single_batch_then_finishes() {
        let docs = [json!({"n": 1}), json!({"n": 2}), json!({"n": 3})];
        let mut iter = iterator_with(None, &docs).await;

        assert_eq!(iter.total_hits(), 3);
        let mut seen = Vec::new();
        while iter.next().await {
            seen.push(iter.current().unwrap()["n"].as_i64().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(iter.processed(), 3);
        assert!(iter.err().is_none());

        // Exhausted with no scroll ID: terminal, and further calls stay false.
        assert!(!iter.next().await);
        iter.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_batch_is_immediately_done() {
        let mut iter = iterator_with(None, &[]).await;
        assert!(!iter.next().await);
        assert!(iter.current().is_none());
        assert!(iter.err().is_none());
    }

    #[tokio::test]
    async fn scan_outside_a_position_is_a_contract_violation() {
        let mut iter = iterator_with(None, &[json!({"n": 1})]).await;

        let mut dest = Value::Null;
        let err = iter.scan(&mut dest).unwrap_err();
        assert!(matches!(err, Error::Contract(_)));

        assert!(iter.next().await);
        iter.scan(&mut dest).unwrap();
        assert_eq!(dest["n"], 1);

        assert!(!iter.next().await);
        let err = iter.scan(&mut dest).unwrap_err();
        assert!(matches!(err, Error::Contract(_)));
    }

    #[tokio::test]
    async fn current_hit_exposes_metadata() {
        let mut iter = iterator_with(None, &[json!({"n": 7})]).await;
        assert!(iter.current_hit().is_none());
        assert!(iter.next().await);
        let hit = iter.current_hit().unwrap();
        assert_eq!(hit.id, "1");
        assert_eq!(hit.index, "users");
    }

    #[tokio::test]
    async fn fetch_failure_is_sticky() {
        // One-document batch with a scroll ID: exhausting it forces a fetch,
        // which fails because the client is disconnected.
        let mut iter = iterator_with(Some("scroll-abc"), &[json!({"n": 1})]).await;

        assert!(iter.next().await);
        assert!(!iter.next().await);
        assert!(iter.err().unwrap().is_connection());

        // The error sticks; later calls never un-stick it.
        assert!(!iter.next().await);
        let mut dest = Value::Null;
        assert!(iter.scan(&mut dest).is_err());
    }

    #[tokio::test]
    async fn close_without_context_is_a_no_op() {
        let mut iter = iterator_with(None, &[]).await;
        iter.close().await.unwrap();
        iter.close().await.unwrap();
    }
}
