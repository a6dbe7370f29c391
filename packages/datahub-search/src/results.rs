use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Error, Result, builder::COUNT_BY_TYPE};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityCount {
	pub entity: String,
	pub count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SearchResults {
	pub count: u64,
	pub results: Vec<Value>,
	/// Raw aggregation results other than `count_by_type`, keyed by aggregation name.
	#[serde(skip_serializing_if = "Map::is_empty")]
	pub aggregations: Map<String, Value>,
	#[serde(skip)]
	pub count_by_type: Vec<EntityCount>,
}
impl SearchResults {
	/// Reads a `_search` response. `hits.total` may be a plain number or `{ "value": n }`.
	pub fn from_response(response: &Value) -> Result<Self> {
		let hits = response.get("hits").ok_or_else(|| malformed("missing hits"))?;
		let count = match hits.get("total") {
			Some(Value::Number(total)) => total.as_u64(),
			Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
			_ => None,
		}
		.ok_or_else(|| malformed("missing hits.total"))?;
		let results = hits
			.get("hits")
			.and_then(Value::as_array)
			.ok_or_else(|| malformed("missing hits.hits"))?
			.iter()
			.map(|hit| hit.get("_source").cloned().unwrap_or(Value::Null))
			.collect();
		let mut aggregations = response
			.get("aggregations")
			.and_then(Value::as_object)
			.cloned()
			.unwrap_or_default();
		let count_by_type = match aggregations.remove(COUNT_BY_TYPE) {
			Some(buckets) => parse_type_counts(&buckets)?,
			None => Vec::new(),
		};

		Ok(Self { count, results, aggregations, count_by_type })
	}
}

fn parse_type_counts(aggregation: &Value) -> Result<Vec<EntityCount>> {
	let buckets = aggregation
		.get("buckets")
		.and_then(Value::as_array)
		.ok_or_else(|| malformed("count_by_type has no buckets"))?;

	buckets
		.iter()
		.map(|bucket| {
			let entity = bucket.get("key").and_then(Value::as_str);
			let count = bucket.get("doc_count").and_then(Value::as_u64);

			match (entity, count) {
				(Some(entity), Some(count)) => Ok(EntityCount { entity: entity.to_string(), count }),
				_ => Err(malformed("count_by_type bucket needs key and doc_count")),
			}
		})
		.collect()
}

fn malformed(message: &str) -> Error {
	Error::MalformedResponse { message: message.to_string() }
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn reads_sources_and_type_counts() {
		let results = SearchResults::from_response(&json!({
			"hits": {
				"total": { "value": 3, "relation": "eq" },
				"hits": [{ "_id": "1", "_source": { "name": "Acme" } }],
			},
			"aggregations": {
				"count_by_type": {
					"buckets": [
						{ "key": "company", "doc_count": 2 },
						{ "key": "contact", "doc_count": 1 },
					]
				}
			}
		}))
		.expect("valid response");

		assert_eq!(results.count, 3);
		assert_eq!(results.results, vec![json!({ "name": "Acme" })]);
		assert_eq!(
			results.count_by_type,
			vec![
				EntityCount { entity: "company".to_string(), count: 2 },
				EntityCount { entity: "contact".to_string(), count: 1 },
			]
		);
		assert!(results.aggregations.is_empty());
	}

	#[test]
	fn accepts_numeric_total_and_keeps_other_aggregations() {
		let results = SearchResults::from_response(&json!({
			"hits": { "total": 0, "hits": [] },
			"aggregations": { "kind": { "buckets": [] } },
		}))
		.expect("valid response");

		assert_eq!(results.count, 0);
		assert_eq!(results.aggregations.get("kind"), Some(&json!({ "buckets": [] })));
	}

	#[test]
	fn missing_hits_is_malformed() {
		let err = SearchResults::from_response(&json!({ "took": 1 })).expect_err("malformed");

		assert!(matches!(err, Error::MalformedResponse { .. }));
	}
}
