//! Fluent aggregation builders.
//!
//! Constructors build the aggregation body; the result attaches to a search
//! via [`SearchOptions::aggregation`](crate::SearchOptions::aggregation).

use serde_json::{json, Map, Value};

/// A composable aggregation.
#[derive(Debug, Clone)]
pub struct AggregationBuilder {
    agg: Value,
}

impl AggregationBuilder {
    fn new(agg: Value) -> Self {
        Self { agg }
    }

    /// Terms aggregation over a field.
    pub fn terms(field: impl Into<String>) -> Self {
        Self::new(json!({ "terms": { "field": field.into() } }))
    }

    /// Date histogram aggregation with a calendar interval.
    pub fn date_histogram(field: impl Into<String>, interval: impl Into<String>) -> Self {
        Self::new(json!({ "date_histogram": {
            "field": field.into(),
            "calendar_interval": interval.into()
        } }))
    }

    /// Histogram aggregation with a numeric bucket interval.
    pub fn histogram(field: impl Into<String>, interval: f64) -> Self {
        Self::new(json!({ "histogram": { "field": field.into(), "interval": interval } }))
    }

    /// Range aggregation; add buckets with [`AggregationBuilder::add_range`].
    pub fn range(field: impl Into<String>) -> Self {
        Self::new(json!({ "range": { "field": field.into(), "ranges": [] } }))
    }

    /// Average metric aggregation.
    pub fn avg(field: impl Into<String>) -> Self {
        Self::new(json!({ "avg": { "field": field.into() } }))
    }

    /// Sum metric aggregation.
    pub fn sum(field: impl Into<String>) -> Self {
        Self::new(json!({ "sum": { "field": field.into() } }))
    }

    /// Minimum metric aggregation.
    pub fn min(field: impl Into<String>) -> Self {
        Self::new(json!({ "min": { "field": field.into() } }))
    }

    /// Maximum metric aggregation.
    pub fn max(field: impl Into<String>) -> Self {
        Self::new(json!({ "max": { "field": field.into() } }))
    }

    /// Stats aggregation (count, min, max, avg, sum).
    pub fn stats(field: impl Into<String>) -> Self {
        Self::new(json!({ "stats": { "field": field.into() } }))
    }

    /// Cardinality (distinct count) aggregation.
    pub fn cardinality(field: impl Into<String>) -> Self {
        Self::new(json!({ "cardinality": { "field": field.into() } }))
    }

    /// Top-hits aggregation returning the highest-ranked documents per bucket.
    pub fn top_hits(size: i64) -> Self {
        Self::new(json!({ "top_hits": { "size": size } }))
    }

    /// Filters aggregation with named filter buckets.
    pub fn filters<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let map: Map<String, Value> = filters
            .into_iter()
            .map(|(name, filter)| (name.into(), filter))
            .collect();
        Self::new(json!({ "filters": { "filters": map } }))
    }

    /// Bucket size for terms aggregations.
    pub fn size(mut self, size: i64) -> Self {
        if let Some(terms) = self.agg.get_mut("terms") {
            terms["size"] = json!(size);
        }
        self
    }

    /// Bucket ordering for terms aggregations.
    pub fn order(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        if let Some(terms) = self.agg.get_mut("terms") {
            terms["order"] = json!({ field.into(): direction.into() });
        }
        self
    }

    /// Minimum document count for terms buckets.
    pub fn min_doc_count(mut self, count: i64) -> Self {
        if let Some(terms) = self.agg.get_mut("terms") {
            terms["min_doc_count"] = json!(count);
        }
        self
    }

    /// Add a bucket to a range aggregation.
    pub fn add_range(mut self, key: impl Into<String>, from: Option<f64>, to: Option<f64>) -> Self {
        if let Some(ranges) = self
            .agg
            .get_mut("range")
            .and_then(|r| r.get_mut("ranges"))
            .and_then(Value::as_array_mut)
        {
            let mut bucket = Map::new();
            bucket.insert("key".to_string(), Value::String(key.into()));
            if let Some(from) = from {
                bucket.insert("from".to_string(), json!(from));
            }
            if let Some(to) = to {
                bucket.insert("to".to_string(), json!(to));
            }
            ranges.push(Value::Object(bucket));
        }
        self
    }

    /// Key format for date histogram aggregations.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        if let Some(dh) = self.agg.get_mut("date_histogram") {
            dh["format"] = json!(format.into());
        }
        self
    }

    /// Timezone for date histogram aggregations.
    pub fn time_zone(mut self, tz: impl Into<String>) -> Self {
        if let Some(dh) = self.agg.get_mut("date_histogram") {
            dh["time_zone"] = json!(tz.into());
        }
        self
    }

    /// Sort order for top-hits aggregations.
    pub fn sort(mut self, sort: Value) -> Self {
        if let Some(th) = self.agg.get_mut("top_hits") {
            match th.get_mut("sort").and_then(Value::as_array_mut) {
                Some(sorts) => sorts.push(sort),
                None => th["sort"] = json!([sort]),
            }
        }
        self
    }

    /// Nest a sub-aggregation under this one.
    pub fn sub_aggregation(mut self, name: impl Into<String>, agg: AggregationBuilder) -> Self {
        let name: String = name.into();
        let aggs = self
            .agg
            .as_object_mut()
            .expect("aggregation body is always an object")
            .entry("aggs")
            .or_insert_with(|| json!({}));
        aggs[name.as_str()] = agg.build();
        self
    }

    /// Emit the aggregation body.
    pub fn build(&self) -> Value {
        self.agg.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_with_modifiers() {
        let agg = AggregationBuilder::terms("category")
            .size(20)
            .order("_count", "desc")
            .min_doc_count(2)
            .build();
        assert_eq!(
            agg,
            json!({ "terms": {
                "field": "category",
                "size": 20,
                "order": { "_count": "desc" },
                "min_doc_count": 2
            } })
        );
    }

    #[test]
    fn date_histogram_with_format_and_zone() {
        let agg = AggregationBuilder::date_histogram("ts", "day")
            .format("yyyy-MM-dd")
            .time_zone("+02:00")
            .build();
        assert_eq!(agg["date_histogram"]["calendar_interval"], "day");
        assert_eq!(agg["date_histogram"]["format"], "yyyy-MM-dd");
        assert_eq!(agg["date_histogram"]["time_zone"], "+02:00");
    }

    #[test]
    fn range_buckets_accumulate_in_order() {
        let agg = AggregationBuilder::range("price")
            .add_range("cheap", None, Some(10.0))
            .add_range("mid", Some(10.0), Some(100.0))
            .add_range("expensive", Some(100.0), None)
            .build();
        let ranges = agg["range"]["ranges"].as_array().unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0], json!({ "key": "cheap", "to": 10.0 }));
        assert_eq!(ranges[1], json!({ "key": "mid", "from": 10.0, "to": 100.0 }));
        assert_eq!(ranges[2], json!({ "key": "expensive", "from": 100.0 }));
    }

    #[test]
    fn metric_aggregations() {
        assert_eq!(
            AggregationBuilder::avg("price").build(),
            json!({ "avg": { "field": "price" } })
        );
        assert_eq!(
            AggregationBuilder::stats("price").build(),
            json!({ "stats": { "field": "price" } })
        );
        assert_eq!(
            AggregationBuilder::cardinality("user_id").build(),
            json!({ "cardinality": { "field": "user_id" } })
        );
    }

    #[test]
    fn top_hits_with_sort() {
        let agg = AggregationBuilder::top_hits(3)
            .sort(json!({ "created_at": { "order": "desc" } }))
            .build();
        assert_eq!(agg["top_hits"]["size"], 3);
        assert_eq!(agg["top_hits"]["sort"][0]["created_at"]["order"], "desc");
    }

    #[test]
    fn sub_aggregations_nest() {
        let agg = AggregationBuilder::terms("category")
            .sub_aggregation("avg_price", AggregationBuilder::avg("price"))
            .build();
        assert_eq!(agg["aggs"]["avg_price"], json!({ "avg": { "field": "price" } }));
    }

    #[test]
    fn filters_aggregation() {
        let agg = AggregationBuilder::filters([
            ("active", json!({ "term": { "status": "active" } })),
            ("inactive", json!({ "term": { "status": "inactive" } })),
        ])
        .build();
        assert!(agg["filters"]["filters"]["active"].is_object());
        assert!(agg["filters"]["filters"]["inactive"].is_object());
    }
}
