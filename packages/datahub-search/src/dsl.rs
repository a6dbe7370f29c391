//! Typed Elasticsearch query clauses.
//!
//! Every clause serializes through [`Query::to_value`]. Values are never mutated in place once
//! handed out; composition helpers consume their inputs and return a new clause.

use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeBounds {
	pub gte: Option<Value>,
	pub lte: Option<Value>,
}
impl RangeBounds {
	fn to_value(&self) -> Value {
		let mut out = Map::new();

		if let Some(gte) = &self.gte {
			out.insert("gte".to_string(), gte.clone());
		}
		if let Some(lte) = &self.lte {
			out.insert("lte".to_string(), lte.clone());
		}

		Value::Object(out)
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoolQuery {
	pub must: Vec<Query>,
	pub should: Vec<Query>,
	pub must_not: Vec<Query>,
	pub filter: Vec<Query>,
	pub minimum_should_match: Option<u32>,
}
impl BoolQuery {
	pub fn must(clauses: impl IntoIterator<Item = Query>) -> Self {
		Self { must: clauses.into_iter().collect(), ..Default::default() }
	}

	pub fn should(clauses: impl IntoIterator<Item = Query>) -> Self {
		Self { should: clauses.into_iter().collect(), ..Default::default() }
	}

	pub fn must_not(clauses: impl IntoIterator<Item = Query>) -> Self {
		Self { must_not: clauses.into_iter().collect(), ..Default::default() }
	}

	/// `should` with `minimum_should_match: 1`.
	pub fn any_of(clauses: impl IntoIterator<Item = Query>) -> Self {
		Self { minimum_should_match: Some(1), ..Self::should(clauses) }
	}

	pub fn with_filter(mut self, clause: Query) -> Self {
		self.filter.push(clause);

		self
	}

	fn to_value(&self) -> Value {
		let mut out = Map::new();

		for (kind, clauses) in [
			("must", &self.must),
			("should", &self.should),
			("must_not", &self.must_not),
			("filter", &self.filter),
		] {
			if !clauses.is_empty() {
				let clauses = clauses.iter().map(Query::to_value).collect();

				out.insert(kind.to_string(), Value::Array(clauses));
			}
		}

		if let Some(min) = self.minimum_should_match {
			out.insert("minimum_should_match".to_string(), Value::from(min));
		}

		Value::Object(out)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum Query {
	MatchAll,
	MatchNone,
	/// Analyzed match requiring every term.
	Match { field: String, query: Value },
	MatchPhrase { field: String, query: Value, boost: Option<f64> },
	/// `cross_fields` match requiring every term somewhere across `fields`.
	MultiMatch { query: String, fields: Vec<String> },
	Term { field: String, value: Value },
	Range { field: String, bounds: RangeBounds },
	Exists { field: String },
	Bool(BoolQuery),
	Nested { path: String, query: Box<Query> },
}
impl Query {
	pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
		Self::Term { field: field.into(), value: value.into() }
	}

	pub fn match_phrase(field: impl Into<String>, query: impl Into<Value>) -> Self {
		Self::MatchPhrase { field: field.into(), query: query.into(), boost: None }
	}

	pub fn exists(field: impl Into<String>) -> Self {
		Self::Exists { field: field.into() }
	}

	pub fn nested(path: impl Into<String>, query: Self) -> Self {
		Self::Nested { path: path.into(), query: Box::new(query) }
	}

	/// Both clauses must match. A left-hand `bool` without `should` clauses absorbs the right-hand
	/// side into its `must` list instead of nesting.
	pub fn and(self, other: Self) -> Self {
		match self {
			Self::Bool(mut lhs) if lhs.should.is_empty() => {
				lhs.must.push(other);

				Self::Bool(lhs)
			},
			lhs => Self::Bool(BoolQuery::must([lhs, other])),
		}
	}

	pub fn to_value(&self) -> Value {
		match self {
			Self::MatchAll => serde_json::json!({ "match_all": {} }),
			Self::MatchNone => serde_json::json!({ "match_none": {} }),
			Self::Match { field, query } => {
				serde_json::json!({
					"match": { field.as_str(): { "query": query, "operator": "and" } }
				})
			},
			Self::MatchPhrase { field, query, boost: None } => {
				serde_json::json!({ "match_phrase": { field.as_str(): query } })
			},
			Self::MatchPhrase { field, query, boost: Some(boost) } => {
				serde_json::json!({
					"match_phrase": { field.as_str(): { "query": query, "boost": boost } }
				})
			},
			Self::MultiMatch { query, fields } => {
				serde_json::json!({
					"multi_match": {
						"query": query,
						"fields": fields,
						"type": "cross_fields",
						"operator": "and",
					}
				})
			},
			Self::Term { field, value } => serde_json::json!({ "term": { field.as_str(): value } }),
			Self::Range { field, bounds } => {
				serde_json::json!({ "range": { field.as_str(): bounds.to_value() } })
			},
			Self::Exists { field } => serde_json::json!({ "exists": { "field": field } }),
			Self::Bool(query) => serde_json::json!({ "bool": query.to_value() }),
			Self::Nested { path, query } => {
				serde_json::json!({ "nested": { "path": path, "query": query.to_value() } })
			},
		}
	}
}
impl From<BoolQuery> for Query {
	fn from(query: BoolQuery) -> Self {
		Self::Bool(query)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn bool_omits_empty_clause_lists() {
		let query = Query::from(BoolQuery::any_of([Query::term("_type", "company")]));

		assert_eq!(
			query.to_value(),
			json!({
				"bool": {
					"should": [{ "term": { "_type": "company" } }],
					"minimum_should_match": 1,
				}
			})
		);
	}

	#[test]
	fn boosted_phrase_uses_object_form() {
		let query = Query::MatchPhrase {
			field: "name_keyword".to_string(),
			query: json!("Acme"),
			boost: Some(2.0),
		};

		assert_eq!(
			query.to_value(),
			json!({ "match_phrase": { "name_keyword": { "query": "Acme", "boost": 2.0 } } })
		);
		assert_eq!(
			Query::match_phrase("id", "abc").to_value(),
			json!({ "match_phrase": { "id": "abc" } })
		);
	}

	#[test]
	fn and_extends_must_only_bool() {
		let combined = Query::term("_type", "company")
			.and(Query::MatchNone)
			.and(Query::exists("name"));

		assert_eq!(
			combined.to_value(),
			json!({
				"bool": {
					"must": [
						{ "term": { "_type": "company" } },
						{ "match_none": {} },
						{ "exists": { "field": "name" } },
					]
				}
			})
		);
	}

	#[test]
	fn and_nests_bool_with_should_clauses() {
		let should = Query::from(BoolQuery::should([Query::term("a", 1)]));
		let combined = should.clone().and(Query::term("b", 2));

		assert_eq!(combined, Query::Bool(BoolQuery::must([should, Query::term("b", 2)])));
	}

	#[test]
	fn range_serializes_present_bounds_only() {
		let query = Query::Range {
			field: "date".to_string(),
			bounds: RangeBounds { gte: Some(json!("2017-12-01")), lte: None },
		};

		assert_eq!(query.to_value(), json!({ "range": { "date": { "gte": "2017-12-01" } } }));
	}
}
