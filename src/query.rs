//! Fluent, typed query builder.
//!
//! Leaf constructors ([`term`], [`match_query`], [`range`], ...) build the
//! individual query clauses; [`bool_query`] builds the composite that
//! combines them. The clause methods `must`, `filter`, `should`, `must_not`
//! and `minimum_should_match` are defined only on bool builders and panic
//! with a message naming the offending method when called on a leaf.
//!
//! ```
//! use elasticlink::query;
//!
//! let q = query::bool_query()
//!     .must(query::match_query("title", "rust"))
//!     .filter(query::term("active", true))
//!     .build();
//! ```

use serde_json::{json, Map, Value};

/// A composable query node: either a leaf query or a bool composite.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    node: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Value),
    Bool(BoolNode),
}

#[derive(Debug, Clone, Default)]
struct BoolNode {
    must: Vec<Value>,
    filter: Vec<Value>,
    should: Vec<Value>,
    must_not: Vec<Value>,
    minimum_should_match: Option<i64>,
}

impl QueryBuilder {
    fn leaf(value: Value) -> Self {
        Self {
            node: Node::Leaf(value),
        }
    }

    fn bool_node(&mut self, method: &str) -> &mut BoolNode {
        match &mut self.node {
            Node::Bool(node) => node,
            Node::Leaf(_) => panic!(
                "query: cannot call {method} on a non-bool query builder \
                 (e.g., a term, match, or range query)"
            ),
        }
    }

    /// Add a query to the `must` clause. Panics on a leaf builder.
    pub fn must(mut self, query: QueryBuilder) -> Self {
        let child = query.build();
        self.bool_node("must()").must.push(child);
        self
    }

    /// Add a query to the `filter` clause. Panics on a leaf builder.
    pub fn filter(mut self, query: QueryBuilder) -> Self {
        let child = query.build();
        self.bool_node("filter()").filter.push(child);
        self
    }

    /// Add a query to the `should` clause. Panics on a leaf builder.
    pub fn should(mut self, query: QueryBuilder) -> Self {
        let child = query.build();
        self.bool_node("should()").should.push(child);
        self
    }

    /// Add a query to the `must_not` clause. Panics on a leaf builder.
    pub fn must_not(mut self, query: QueryBuilder) -> Self {
        let child = query.build();
        self.bool_node("must_not()").must_not.push(child);
        self
    }

    /// Set the minimum number of `should` clauses that must match.
    /// Panics on a leaf builder.
    pub fn minimum_should_match(mut self, count: i64) -> Self {
        self.bool_node("minimum_should_match()").minimum_should_match = Some(count);
        self
    }

    /// Emit the wire-shape JSON for this query.
    ///
    /// Builds are repeatable: successive calls on the same builder yield
    /// equal values.
    pub fn build(&self) -> Value {
        match &self.node {
            Node::Leaf(value) => value.clone(),
            Node::Bool(node) => {
                let mut body = Map::new();
                body.insert("must".to_string(), Value::Array(node.must.clone()));
                body.insert("must_not".to_string(), Value::Array(node.must_not.clone()));
                body.insert("should".to_string(), Value::Array(node.should.clone()));
                body.insert("filter".to_string(), Value::Array(node.filter.clone()));
                if let Some(min) = node.minimum_should_match {
                    body.insert("minimum_should_match".to_string(), json!(min));
                }
                json!({ "bool": body })
            }
        }
    }
}

/// Create an empty bool query builder.
pub fn bool_query() -> QueryBuilder {
    QueryBuilder {
        node: Node::Bool(BoolNode::default()),
    }
}

/// Create a term query for an exact value.
pub fn term(field: impl Into<String>, value: impl Into<Value>) -> QueryBuilder {
    QueryBuilder::leaf(json!({ "term": { field.into(): value.into() } }))
}

/// Create a terms query matching any of the given values.
pub fn terms<I, V>(field: impl Into<String>, values: I) -> QueryBuilder
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    QueryBuilder::leaf(json!({ "terms": { field.into(): values } }))
}

/// Create a full-text match query.
pub fn match_query(field: impl Into<String>, text: impl Into<Value>) -> QueryBuilder {
    QueryBuilder::leaf(json!({ "match": { field.into(): text.into() } }))
}

/// Create a match_phrase query for exact phrase matching.
pub fn match_phrase(field: impl Into<String>, text: impl Into<Value>) -> QueryBuilder {
    QueryBuilder::leaf(json!({ "match_phrase": { field.into(): text.into() } }))
}

/// Create a multi_match query across several fields.
pub fn multi_match<I, S>(text: impl Into<Value>, fields: I) -> QueryBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
    QueryBuilder::leaf(json!({ "multi_match": { "query": text.into(), "fields": fields } }))
}

/// Create a match_all query.
pub fn match_all() -> QueryBuilder {
    QueryBuilder::leaf(json!({ "match_all": {} }))
}

/// Create a match_none query.
pub fn match_none() -> QueryBuilder {
    QueryBuilder::leaf(json!({ "match_none": {} }))
}

/// Create an exists query for documents that have the field.
pub fn exists(field: impl Into<String>) -> QueryBuilder {
    QueryBuilder::leaf(json!({ "exists": { "field": field.into() } }))
}

/// Create an ids query.
pub fn ids<I, S>(values: I) -> QueryBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    QueryBuilder::leaf(json!({ "ids": { "values": values } }))
}

/// Create a prefix query.
pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> QueryBuilder {
    QueryBuilder::leaf(json!({ "prefix": { field.into(): value.into() } }))
}

/// Create a wildcard query.
pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> QueryBuilder {
    QueryBuilder::leaf(json!({ "wildcard": { field.into(): pattern.into() } }))
}

/// Create a regexp query.
pub fn regexp(field: impl Into<String>, pattern: impl Into<String>) -> QueryBuilder {
    QueryBuilder::leaf(json!({ "regexp": { field.into(): pattern.into() } }))
}

/// Create a fuzzy query.
pub fn fuzzy(field: impl Into<String>, value: impl Into<Value>) -> QueryBuilder {
    QueryBuilder::leaf(json!({ "fuzzy": { field.into(): value.into() } }))
}

/// Create a range query sub-builder for the given field.
pub fn range(field: impl Into<String>) -> RangeBuilder {
    RangeBuilder {
        field: field.into(),
        bounds: Map::new(),
    }
}

/// Fluent sub-builder for range queries.
#[derive(Debug, Clone)]
pub struct RangeBuilder {
    field: String,
    bounds: Map<String, Value>,
}

impl RangeBuilder {
    /// Greater than or equal.
    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.bounds.insert("gte".to_string(), value.into());
        self
    }

    /// Greater than.
    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.bounds.insert("gt".to_string(), value.into());
        self
    }

    /// Less than or equal.
    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.bounds.insert("lte".to_string(), value.into());
        self
    }

    /// Less than.
    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.bounds.insert("lt".to_string(), value.into());
        self
    }

    /// Date format for date range queries.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.bounds
            .insert("format".to_string(), Value::String(format.into()));
        self
    }

    /// Timezone for date range queries.
    pub fn time_zone(mut self, tz: impl Into<String>) -> Self {
        self.bounds
            .insert("time_zone".to_string(), Value::String(tz.into()));
        self
    }

    /// Lift the range into a query node.
    pub fn build(self) -> QueryBuilder {
        QueryBuilder::leaf(json!({ "range": { self.field: self.bounds } }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_emits_wire_shape() {
        let q = term("status", "active").build();
        assert_eq!(q, json!({ "term": { "status": "active" } }));
    }

    #[test]
    fn match_emits_wire_shape() {
        let q = match_query("title", "elasticsearch").build();
        assert_eq!(q, json!({ "match": { "title": "elasticsearch" } }));
    }

    #[test]
    fn range_emits_wire_shape() {
        let q = range("age").gte(18).lte(65).build().build();
        assert_eq!(q, json!({ "range": { "age": { "gte": 18, "lte": 65 } } }));
    }

    #[test]
    fn range_with_format_and_time_zone() {
        let q = range("ts")
            .gt("2024-01-01")
            .format("yyyy-MM-dd")
            .time_zone("+01:00")
            .build()
            .build();
        assert_eq!(
            q,
            json!({ "range": { "ts": {
                "gt": "2024-01-01",
                "format": "yyyy-MM-dd",
                "time_zone": "+01:00"
            } } })
        );
    }

    #[test]
    fn bool_query_places_children_in_their_clauses() {
        let q = bool_query()
            .must(match_query("name", "John"))
            .filter(term("active", true))
            .should(prefix("tag", "ru"))
            .must_not(exists("deleted_at"))
            .build();

        let b = &q["bool"];
        assert_eq!(b["must"], json!([{ "match": { "name": "John" } }]));
        assert_eq!(b["filter"], json!([{ "term": { "active": true } }]));
        assert_eq!(b["should"], json!([{ "prefix": { "tag": "ru" } }]));
        assert_eq!(b["must_not"], json!([{ "exists": { "field": "deleted_at" } }]));
        assert!(b.get("minimum_should_match").is_none());
    }

    #[test]
    fn minimum_should_match_is_emitted() {
        let q = bool_query()
            .should(term("a", 1))
            .should(term("b", 2))
            .minimum_should_match(1)
            .build();
        assert_eq!(q["bool"]["minimum_should_match"], json!(1));
    }

    #[test]
    fn build_is_repeatable() {
        let builder = bool_query().must(term("a", 1));
        assert_eq!(builder.build(), builder.build());
    }

    #[test]
    fn leaf_constructors_cover_each_variant() {
        assert!(terms("tag", ["a", "b"]).build()["terms"]["tag"].is_array());
        assert_eq!(
            match_phrase("title", "exact phrase").build()["match_phrase"]["title"],
            json!("exact phrase")
        );
        let mm = multi_match("text", ["title", "body"]).build();
        assert_eq!(mm["multi_match"]["fields"], json!(["title", "body"]));
        assert_eq!(match_all().build(), json!({ "match_all": {} }));
        assert_eq!(match_none().build(), json!({ "match_none": {} }));
        assert_eq!(
            ids(["1", "2"]).build(),
            json!({ "ids": { "values": ["1", "2"] } })
        );
        assert_eq!(
            wildcard("name", "jo*").build(),
            json!({ "wildcard": { "name": "jo*" } })
        );
        assert_eq!(
            regexp("name", "jo.*").build(),
            json!({ "regexp": { "name": "jo.*" } })
        );
        assert_eq!(
            fuzzy("name", "jon").build(),
            json!({ "fuzzy": { "name": "jon" } })
        );
    }

    #[test]
    #[should_panic(expected = "must()")]
    fn must_on_leaf_panics() {
        let _ = term("s", "a").must(match_query("t", "x"));
    }

    #[test]
    #[should_panic(expected = "filter()")]
    fn filter_on_leaf_panics() {
        let _ = match_query("title", "test").filter(term("active", true));
    }

    #[test]
    #[should_panic(expected = "should()")]
    fn should_on_leaf_panics() {
        let _ = range("age").gte(18).build().should(term("active", true));
    }

    #[test]
    #[should_panic(expected = "must_not()")]
    fn must_not_on_leaf_panics() {
        let _ = exists("field").must_not(term("a", 1));
    }

    #[test]
    #[should_panic(expected = "minimum_should_match()")]
    fn minimum_should_match_on_leaf_panics() {
        let _ = term("status", "active").minimum_should_match(1);
    }
}
