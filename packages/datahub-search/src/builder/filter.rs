use std::collections::BTreeMap;

use serde_json::Value;

use crate::dsl::{BoolQuery, Query, RangeBounds};

const BEFORE_SUFFIX: &str = "_before";
const AFTER_SUFFIX: &str = "_after";
const EXISTS_SUFFIX: &str = "_exists";

/// Request filter key to filter value, iterated in key order.
pub type FilterMap = BTreeMap<String, FilterValue>;
/// Logical filter key to the indexed fields it expands to.
pub type CompositeFilters = BTreeMap<String, Vec<String>>;
/// Indexed field to the bounds collected from `<field>_before` and `<field>_after` keys.
pub type RangeMap = BTreeMap<String, RangeBounds>;

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
	Null,
	Scalar(Value),
	List(Vec<FilterValue>),
	Nested(FilterMap),
}
impl FilterValue {
	pub fn from_json(value: Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
			Value::Object(map) => Self::Nested(
				map.into_iter().map(|(key, value)| (key, Self::from_json(value))).collect(),
			),
			scalar => Self::Scalar(scalar),
		}
	}

	pub fn to_json(&self) -> Value {
		match self {
			Self::Null => Value::Null,
			Self::Scalar(value) => value.clone(),
			Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
			Self::Nested(map) => Value::Object(
				map.iter().map(|(key, value)| (key.clone(), value.to_json())).collect(),
			),
		}
	}

	/// Truthiness used by `_exists` filters. The strings `false`, `0` and `no` count as false so
	/// that query-string style values behave like booleans.
	pub fn is_truthy(&self) -> bool {
		match self {
			Self::Null => false,
			Self::Scalar(Value::Bool(flag)) => *flag,
			Self::Scalar(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
			Self::Scalar(Value::String(raw)) => {
				let lowered = raw.trim().to_ascii_lowercase();

				!lowered.is_empty() && !matches!(lowered.as_str(), "false" | "0" | "no")
			},
			Self::Scalar(_) => true,
			Self::List(items) => !items.is_empty(),
			Self::Nested(map) => !map.is_empty(),
		}
	}
}

/// How a single filter key/value pair is matched.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldPredicate {
	/// The value was null: the object holding the field must be absent. `parent` is the key
	/// without its last dotted segment.
	Missing { parent: String },
	Exists { field: String, exists: bool },
	Phrase { field: String, value: Value },
	Match { field: String, value: Value },
}
impl FieldPredicate {
	pub fn classify(field: &str, value: &FilterValue) -> Self {
		if matches!(value, FilterValue::Null) {
			let parent = field.rsplit_once('.').map(|(parent, _)| parent).unwrap_or(field);

			return Self::Missing { parent: parent.to_string() };
		}
		if field.ends_with(".id") || field.ends_with("_keyword") {
			return Self::Phrase { field: field.to_string(), value: value.to_json() };
		}
		if let Some(real_field) = field.strip_suffix(EXISTS_SUFFIX) {
			return Self::Exists { field: real_field.to_string(), exists: value.is_truthy() };
		}

		Self::Match { field: field.to_string(), value: value.to_json() }
	}

	pub fn to_query(&self) -> Query {
		match self {
			Self::Missing { parent } => exists_query(parent, false),
			Self::Exists { field, exists } => exists_query(field, *exists),
			Self::Phrase { field, value } => Query::match_phrase(field.as_str(), value.clone()),
			Self::Match { field, value } => {
				Query::Match { field: field.clone(), query: value.clone() }
			},
		}
	}
}

/// Leaf clause for one field. Dotted fields are scoped to their nested parent document, except
/// for null values, which test the parent object itself.
pub fn field_query(field: &str, value: &FilterValue) -> Query {
	let predicate = FieldPredicate::classify(field, value);
	let query = predicate.to_query();

	if matches!(predicate, FieldPredicate::Missing { .. }) {
		return query;
	}

	match field.rsplit_once('.') {
		Some((path, _)) => Query::nested(path, query),
		None => query,
	}
}

/// A list value matches when any of its items does.
pub fn filter_query(field: &str, value: &FilterValue) -> Query {
	match value {
		FilterValue::List(items) => {
			BoolQuery::any_of(items.iter().map(|item| field_query(field, item))).into()
		},
		_ => field_query(field, value),
	}
}

/// Separates range keys from the rest. `<field>_before` becomes an `lte` bound and
/// `<field>_after` a `gte` bound on `<field>`.
pub fn split_range_fields(filters: &FilterMap) -> (FilterMap, RangeMap) {
	let mut plain = FilterMap::new();
	let mut ranges = RangeMap::new();

	for (key, value) in filters {
		if let Some(field) = key.strip_suffix(BEFORE_SUFFIX) {
			ranges.entry(field.to_string()).or_default().lte = Some(value.to_json());
		} else if let Some(field) = key.strip_suffix(AFTER_SUFFIX) {
			ranges.entry(field.to_string()).or_default().gte = Some(value.to_json());
		} else {
			plain.insert(key.clone(), value.clone());
		}
	}

	(plain, ranges)
}

pub fn range_queries(ranges: &RangeMap) -> Vec<Query> {
	ranges
		.iter()
		.map(|(field, bounds)| Query::Range { field: field.clone(), bounds: bounds.clone() })
		.collect()
}

/// Clauses that must all match. Composite keys and nested sub-filters each contribute one
/// clause that matches when any of their expansions does.
pub fn must_filter_query(
	filters: &FilterMap,
	composite_filters: Option<&CompositeFilters>,
	ranges: &RangeMap,
) -> Vec<Query> {
	let mut must = Vec::with_capacity(filters.len() + ranges.len());

	for (key, value) in filters {
		let should = if let Some(fields) = composite_filters.and_then(|composite| composite.get(key))
		{
			fields.iter().map(|field| filter_query(field, value)).collect()
		} else if let FilterValue::Nested(inner) = value {
			nested_filters(key, inner)
		} else {
			Vec::new()
		};

		if should.is_empty() {
			must.push(filter_query(key, value));
		} else {
			must.push(BoolQuery::any_of(should).into());
		}
	}

	must.extend(range_queries(ranges));

	must
}

fn nested_filters(field: &str, inner: &FilterMap) -> Vec<Query> {
	let prefixed: FilterMap =
		inner.iter().map(|(key, value)| (format!("{field}_{key}"), value.clone())).collect();
	let (plain, ranges) = split_range_fields(&prefixed);
	let mut should: Vec<Query> =
		plain.iter().map(|(key, value)| filter_query(key, value)).collect();

	should.extend(range_queries(&ranges));

	should
}

fn exists_query(field: &str, exists: bool) -> Query {
	let clause = Query::exists(field);

	if exists { BoolQuery::must([clause]).into() } else { BoolQuery::must_not([clause]).into() }
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn filters(value: Value) -> FilterMap {
		match FilterValue::from_json(value) {
			FilterValue::Nested(map) => map,
			other => panic!("expected object, got {other:?}"),
		}
	}

	#[test]
	fn classifies_by_field_suffix() {
		let value = FilterValue::Scalar(json!("x"));

		assert_eq!(
			FieldPredicate::classify("company.id", &value),
			FieldPredicate::Phrase { field: "company.id".to_string(), value: json!("x") }
		);
		assert_eq!(
			FieldPredicate::classify("name_keyword", &value),
			FieldPredicate::Phrase { field: "name_keyword".to_string(), value: json!("x") }
		);
		assert_eq!(
			FieldPredicate::classify("subject", &value),
			FieldPredicate::Match { field: "subject".to_string(), value: json!("x") }
		);
		assert_eq!(
			FieldPredicate::classify("created_on_exists", &FilterValue::Scalar(json!(false))),
			FieldPredicate::Exists { field: "created_on".to_string(), exists: false }
		);
		assert_eq!(
			FieldPredicate::classify("company.id", &FilterValue::Null),
			FieldPredicate::Missing { parent: "company".to_string() }
		);
	}

	#[test]
	fn null_value_tests_parent_absence_without_nesting() {
		assert_eq!(
			field_query("investment_project.id", &FilterValue::Null).to_value(),
			json!({ "bool": { "must_not": [{ "exists": { "field": "investment_project" } }] } })
		);
	}

	#[test]
	fn analyzed_match_requires_all_terms() {
		assert_eq!(
			field_query("subject", &FilterValue::Scalar(json!("exports meeting"))).to_value(),
			json!({ "match": { "subject": { "query": "exports meeting", "operator": "and" } } })
		);
	}

	#[test]
	fn dotted_field_is_nested_under_parent_path() {
		assert_eq!(
			field_query("dit_team.id", &FilterValue::Scalar(json!("t1"))).to_value(),
			json!({
				"nested": {
					"path": "dit_team",
					"query": { "match_phrase": { "dit_team.id": "t1" } },
				}
			})
		);
	}

	#[test]
	fn exists_filter_honours_truthiness() {
		assert_eq!(
			field_query("created_on_exists", &FilterValue::Scalar(json!(true))).to_value(),
			json!({ "bool": { "must": [{ "exists": { "field": "created_on" } }] } })
		);
		assert_eq!(
			field_query("created_on_exists", &FilterValue::Scalar(json!("false"))).to_value(),
			json!({ "bool": { "must_not": [{ "exists": { "field": "created_on" } }] } })
		);
	}

	#[test]
	fn string_flags_are_truthy_unless_false_like() {
		for raw in ["false", "FALSE", "0", "no", " No ", ""] {
			assert!(!FilterValue::Scalar(json!(raw)).is_truthy(), "{raw:?}");
		}
		for raw in ["true", "1", "yes", "on"] {
			assert!(FilterValue::Scalar(json!(raw)).is_truthy(), "{raw:?}");
		}

		assert!(!FilterValue::Scalar(json!(0)).is_truthy());
		assert!(!FilterValue::Null.is_truthy());
	}

	#[test]
	fn list_value_matches_any_item() {
		let value = FilterValue::from_json(json!(["interaction", "service_delivery"]));
		let query = filter_query("kind", &value);

		assert_eq!(
			query.to_value(),
			json!({
				"bool": {
					"should": [
						{ "match": { "kind": { "query": "interaction", "operator": "and" } } },
						{ "match": { "kind": { "query": "service_delivery", "operator": "and" } } },
					],
					"minimum_should_match": 1,
				}
			})
		);
	}

	#[test]
	fn splits_range_suffixes_into_bounds() {
		let (plain, ranges) = split_range_fields(&filters(json!({
			"date_after": "2017-12-01",
			"date_before": "2018-01-02",
			"subject": "cats",
		})));

		assert_eq!(plain.keys().collect::<Vec<_>>(), vec!["subject"]);
		assert_eq!(
			ranges.get("date"),
			Some(&RangeBounds { gte: Some(json!("2017-12-01")), lte: Some(json!("2018-01-02")) })
		);
	}

	#[test]
	fn composite_key_expands_to_any_field() {
		let composite = CompositeFilters::from([(
			"contact_name".to_string(),
			vec!["contact.name".to_string(), "contact.name_trigram".to_string()],
		)]);
		let must = must_filter_query(
			&filters(json!({ "contact_name": "jo" })),
			Some(&composite),
			&RangeMap::new(),
		);

		assert_eq!(must.len(), 1);
		assert_eq!(
			must[0].to_value(),
			json!({
				"bool": {
					"should": [
						{
							"nested": {
								"path": "contact",
								"query": {
									"match": { "contact.name": { "query": "jo", "operator": "and" } }
								},
							}
						},
						{
							"nested": {
								"path": "contact",
								"query": {
									"match": { "contact.name_trigram": { "query": "jo", "operator": "and" } }
								},
							}
						},
					],
					"minimum_should_match": 1,
				}
			})
		);
	}

	#[test]
	fn nested_mapping_prefixes_inner_keys() {
		let must = must_filter_query(
			&filters(json!({ "estimated_land_date": { "after": "2018-01-01", "exists": false } })),
			None,
			&RangeMap::new(),
		);

		assert_eq!(
			must[0].to_value(),
			json!({
				"bool": {
					"should": [
						{ "bool": { "must_not": [{ "exists": { "field": "estimated_land_date" } }] } },
						{ "range": { "estimated_land_date": { "gte": "2018-01-01" } } },
					],
					"minimum_should_match": 1,
				}
			})
		);
	}

	#[test]
	fn ranges_follow_plain_filters() {
		let (plain, ranges) = split_range_fields(&filters(json!({
			"created_on_before": "2017-02-02",
			"primary_market": "france",
		})));
		let must = must_filter_query(&plain, None, &ranges);

		assert_eq!(must.len(), 2);
		assert!(matches!(&must[0], Query::Match { field, .. } if field == "primary_market"));
		assert!(matches!(&must[1], Query::Range { field, .. } if field == "created_on"));
	}

	#[test]
	fn empty_filters_add_no_constraint() {
		assert!(must_filter_query(&FilterMap::new(), None, &RangeMap::new()).is_empty());
	}
}
