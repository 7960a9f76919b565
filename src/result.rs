//! Typed search results.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::response::{Hit, SearchResponse, ShardSummary, TotalHits};

/// A single search hit with its source decoded into `T`.
#[derive(Debug, Clone)]
pub struct TypedHit<T> {
    /// Index the hit came from.
    pub index: String,
    /// Document ID.
    pub id: String,
    /// Relevance score; absent under certain sorts.
    pub score: Option<f64>,
    /// Decoded document source.
    pub source: T,
    /// Sort keys, present when the search sorts.
    pub sort: Option<Vec<Value>>,
    /// Stored or runtime fields requested by the search.
    pub fields: Option<Value>,
    /// Highlighted fragments keyed by field.
    pub highlight: Option<HashMap<String, Vec<String>>>,
    /// Inner hits for nested/parent-child queries.
    pub inner_hits: Option<Value>,
    /// Score explanation, present when requested.
    pub explanation: Option<Value>,
}

/// A document paired with its ID.
#[derive(Debug, Clone)]
pub struct DocumentWithId<T> {
    /// Document ID.
    pub id: String,
    /// The document itself.
    pub document: T,
}

/// Immutable, typed result of a search.
///
/// All accessors operate on the in-memory result; none issue further
/// requests.
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    /// Server-side execution time in milliseconds.
    pub took: i64,
    /// True when the search timed out server-side.
    pub timed_out: bool,
    /// Scroll ID, present on scroll searches.
    pub scroll_id: Option<String>,
    /// Shard summary.
    pub shards: ShardSummary,
    /// Total hit count with its accuracy relation.
    pub total: TotalHits,
    /// Maximum score over the returned hits.
    pub max_score: Option<f64>,
    /// Returned hits in server order.
    pub hits: Vec<TypedHit<T>>,
    /// Aggregation results, opaque to the client.
    pub aggregations: Option<Value>,
    /// Suggester results, opaque to the client.
    pub suggest: Option<Value>,
}

pub(crate) fn convert_hit<T: DeserializeOwned>(hit: Hit) -> Result<TypedHit<T>> {
    let source = hit.source.unwrap_or_else(|| json!({}));
    let source: T = serde_json::from_value(source).map_err(Error::decode::<T>)?;
    Ok(TypedHit {
        index: hit.index,
        id: hit.id,
        score: hit.score,
        source,
        sort: hit.sort,
        fields: hit.fields,
        highlight: hit.highlight,
        inner_hits: hit.inner_hits,
        explanation: hit.explanation,
    })
}

impl<T: DeserializeOwned> SearchResult<T> {
    /// Convert an untyped search response, decoding every hit source into
    /// `T`. A single failing hit fails the whole conversion.
    pub(crate) fn from_response(response: SearchResponse) -> Result<Self> {
        let hits = response
            .hits
            .hits
            .into_iter()
            .map(convert_hit::<T>)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            took: response.took,
            timed_out: response.timed_out,
            scroll_id: response.scroll_id,
            shards: response.shards,
            total: response.hits.total,
            max_score: response.hits.max_score,
            hits,
            aggregations: response.aggregations,
            suggest: response.suggest,
        })
    }
}

impl<T> SearchResult<T> {
    /// Total number of matching documents.
    pub fn total_hits(&self) -> i64 {
        self.total.value
    }

    /// True when the result carries at least one hit.
    pub fn has_hits(&self) -> bool {
        !self.hits.is_empty()
    }

    /// Maximum score over the returned hits.
    pub fn max_score(&self) -> Option<f64> {
        self.max_score
    }

    /// Document IDs in hit order.
    pub fn document_ids(&self) -> Vec<String> {
        self.hits.iter().map(|hit| hit.id.clone()).collect()
    }

    /// The first document, if any.
    pub fn first(&self) -> Option<&T> {
        self.hits.first().map(|hit| &hit.source)
    }

    /// The last document, if any.
    pub fn last(&self) -> Option<&T> {
        self.hits.last().map(|hit| &hit.source)
    }

    /// Call `f` for each hit in order.
    pub fn each<F: FnMut(&TypedHit<T>)>(&self, mut f: F) {
        for hit in &self.hits {
            f(hit);
        }
    }

    /// Transform each document into a new value, in hit order.
    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> Vec<U> {
        self.hits.iter().map(|hit| f(&hit.source)).collect()
    }
}

impl<T: Clone> SearchResult<T> {
    /// Documents in hit order.
    pub fn documents(&self) -> Vec<T> {
        self.hits.iter().map(|hit| hit.source.clone()).collect()
    }

    /// Documents paired with their IDs, in hit order.
    pub fn documents_with_ids(&self) -> Vec<DocumentWithId<T>> {
        self.hits
            .iter()
            .map(|hit| DocumentWithId {
                id: hit.id.clone(),
                document: hit.source.clone(),
            })
            .collect()
    }

    /// Documents matching the predicate, in hit order.
    pub fn filter<F: FnMut(&T) -> bool>(&self, mut pred: F) -> Vec<T> {
        self.hits
            .iter()
            .filter(|hit| pred(&hit.source))
            .map(|hit| hit.source.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct User {
        name: String,
        #[serde(default)]
        age: i64,
    }

    fn sample_response() -> SearchResponse {
        serde_json::from_value(json!({
            "took": 4,
            "timed_out": false,
            "_shards": {"total": 1, "successful": 1, "skipped": 0, "failed": 0},
            "hits": {
                "total": {"value": 3, "relation": "eq"},
                "max_score": 2.0,
                "hits": [
                    {"_index": "users", "_id": "1", "_score": 2.0,
                     "_source": {"name": "alice", "age": 30}},
                    {"_index": "users", "_id": "2", "_score": 1.5,
                     "_source": {"name": "bob", "age": 25},
                     "sort": [25]},
                    {"_index": "users", "_id": "3", "_score": 1.0,
                     "_source": {"name": "carol", "age": 41}}
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn hits_decode_in_order() {
        let result = SearchResult::<User>::from_response(sample_response()).unwrap();
        assert_eq!(result.total_hits(), 3);
        assert!(result.has_hits());
        assert_eq!(result.max_score(), Some(2.0));
        assert_eq!(result.document_ids(), vec!["1", "2", "3"]);
        assert_eq!(
            result.documents(),
            vec![
                User { name: "alice".to_string(), age: 30 },
                User { name: "bob".to_string(), age: 25 },
                User { name: "carol".to_string(), age: 41 },
            ]
        );
        assert_eq!(result.hits[1].sort, Some(vec![json!(25)]));
    }

    #[test]
    fn one_bad_hit_fails_the_conversion_naming_the_type() {
        let mut response = sample_response();
        response.hits.hits[1].source = Some(json!({"name": 42}));
        let err = SearchResult::<User>::from_response(response).unwrap_err();
        match err {
            Error::Decode(msg) => assert!(msg.contains("User"), "got: {msg}"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn first_last_and_combinators() {
        let result = SearchResult::<User>::from_response(sample_response()).unwrap();
        assert_eq!(result.first().unwrap().name, "alice");
        assert_eq!(result.last().unwrap().name, "carol");

        let names = result.map(|u| u.name.clone());
        assert_eq!(names, vec!["alice", "bob", "carol"]);

        let adults = result.filter(|u| u.age > 28);
        assert_eq!(adults.len(), 2);

        let pairs = result.documents_with_ids();
        assert_eq!(pairs[0].id, "1");
        assert_eq!(pairs[0].document.name, "alice");

        let mut seen = 0;
        result.each(|hit| {
            assert!(!hit.id.is_empty());
            seen += 1;
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn empty_result_accessors() {
        let response: SearchResponse = serde_json::from_value(json!({
            "took": 1,
            "timed_out": false,
            "hits": {"total": {"value": 0, "relation": "eq"}, "hits": []}
        }))
        .unwrap();
        let result = SearchResult::<User>::from_response(response).unwrap();
        assert!(!result.has_hits());
        assert!(result.first().is_none());
        assert!(result.last().is_none());
        assert!(result.documents().is_empty());
    }

    #[test]
    fn untyped_results_decode_into_value() {
        let result = SearchResult::<Value>::from_response(sample_response()).unwrap();
        assert_eq!(result.hits[0].source["name"], "alice");
    }
}
