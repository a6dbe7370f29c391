//! Request body parsing and validation.

use datahub_config::{Entity, Search};
use serde_json::{Map, Value};
use time::{
	Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};

use crate::{
	Error, Result, ValidationErrors,
	builder::{CompositeFilters, FilterMap, FilterValue, SortOrder},
	registry::Registry,
};

pub const DATE_FORMAT_ERROR: &str = "Date(s) in incorrect format.";

const TERM_KEY: &str = "term";
const ENTITY_KEY: &str = "entity";
const ORIGINAL_QUERY_KEY: &str = "original_query";
const SORTBY_KEY: &str = "sortby";
const OFFSET_KEY: &str = "offset";
const LIMIT_KEY: &str = "limit";
const AGGREGATIONS_KEY: &str = "aggregations";
const RESERVED_KEYS: [&str; 5] =
	[ORIGINAL_QUERY_KEY, SORTBY_KEY, OFFSET_KEY, LIMIT_KEY, AGGREGATIONS_KEY];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
	pub offset: u64,
	pub limit: u64,
}
impl Pagination {
	/// Lenient parsing: a missing, non-numeric, zero or negative limit falls back to the default,
	/// and a missing, non-numeric or negative offset to zero.
	pub fn parse(offset: Option<&Value>, limit: Option<&Value>, default_limit: u64) -> Self {
		let limit = limit.and_then(parse_int).filter(|limit| *limit > 0);
		let offset = offset.and_then(parse_int).filter(|offset| *offset >= 0);

		Self {
			offset: offset.map(|offset| offset.unsigned_abs()).unwrap_or(0),
			limit: limit.map(|limit| limit.unsigned_abs()).unwrap_or(default_limit),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct BasicSearchParams {
	pub term: String,
	pub entity: String,
	pub sort: SortOrder,
	pub pagination: Pagination,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntitySearchParams {
	pub term: String,
	pub sort: SortOrder,
	pub filters: FilterMap,
	/// Composite keys present in `filters`, with the fields each expands to.
	pub composite_filters: CompositeFilters,
	pub aggregations: Vec<String>,
	pub pagination: Pagination,
}

/// Parameters of a search across every entity. `sortby` may name any field sortable on at least
/// one entity.
pub fn basic_search_params(
	body: &Value,
	search_cfg: &Search,
	registry: &Registry,
) -> Result<BasicSearchParams> {
	let body = as_object(body)?;
	let mut errors = ValidationErrors::default();
	let term = match body.get(TERM_KEY) {
		None | Some(Value::Null) => {
			errors.add(TERM_KEY, "This field is required.");

			String::new()
		},
		Some(value) => string_field(TERM_KEY, value, &mut errors),
	};
	let entity = match body.get(ENTITY_KEY) {
		None | Some(Value::Null) => search_cfg.default_entity.clone(),
		Some(value) => string_field(ENTITY_KEY, value, &mut errors),
	};

	if !entity.is_empty() && registry.get(&entity).is_none() {
		errors.add(ENTITY_KEY, format!("\"{entity}\" is not a valid choice."));
	}

	let sort = sort_field(body, None, &registry.sort_fields(), &mut errors);
	let pagination =
		Pagination::parse(body.get(OFFSET_KEY), body.get(LIMIT_KEY), search_cfg.default_limit);

	errors.into_result()?;

	Ok(BasicSearchParams { term, entity, sort, pagination })
}

/// Parameters of a search within one entity. Keys that are not filter fields of the entity are
/// ignored; remapped keys are renamed to the indexed field.
pub fn entity_search_params(
	body: &Value,
	entity: &Entity,
	default_limit: u64,
) -> Result<EntitySearchParams> {
	let body = as_object(body)?;
	let mut errors = ValidationErrors::default();
	let term = match body.get(ORIGINAL_QUERY_KEY) {
		None | Some(Value::Null) => String::new(),
		Some(value) => string_field(ORIGINAL_QUERY_KEY, value, &mut errors),
	};
	let sort = sort_field(body, entity.default_sort.as_deref(), &entity.sort_fields, &mut errors);
	let aggregations = aggregation_fields(body.get(AGGREGATIONS_KEY), entity, &mut errors);
	let (filters, composite_filters) = filter_fields(body, entity, &mut errors);
	let pagination = Pagination::parse(body.get(OFFSET_KEY), body.get(LIMIT_KEY), default_limit);

	errors.into_result()?;

	Ok(EntitySearchParams { term, sort, filters, composite_filters, aggregations, pagination })
}

/// `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn is_valid_date(raw: &str) -> bool {
	Date::parse(raw, format_description!("[year]-[month]-[day]")).is_ok()
		|| OffsetDateTime::parse(raw, &Rfc3339).is_ok()
}

fn as_object(body: &Value) -> Result<&Map<String, Value>> {
	body.as_object().ok_or_else(|| Error::InvalidRequest {
		message: "Request body must be a JSON object.".to_string(),
	})
}

fn parse_int(value: &Value) -> Option<i64> {
	match value {
		Value::Number(number) => number.as_i64(),
		Value::String(raw) => raw.trim().parse().ok(),
		_ => None,
	}
}

fn string_field(key: &str, value: &Value, errors: &mut ValidationErrors) -> String {
	match value {
		Value::String(raw) => raw.clone(),
		_ => {
			errors.add(key, "Not a valid string.");

			String::new()
		},
	}
}

fn sort_field(
	body: &Map<String, Value>,
	default: Option<&str>,
	allowed_fields: &[String],
	errors: &mut ValidationErrors,
) -> SortOrder {
	let token = match body.get(SORTBY_KEY) {
		None | Some(Value::Null) => default.map(str::to_string),
		Some(value) => Some(string_field(SORTBY_KEY, value, errors)),
	};

	SortOrder::resolve(token.as_deref(), allowed_fields).unwrap_or_else(|messages| {
		for message in messages {
			errors.add(SORTBY_KEY, message);
		}

		SortOrder::Relevance
	})
}

fn aggregation_fields(
	value: Option<&Value>,
	entity: &Entity,
	errors: &mut ValidationErrors,
) -> Vec<String> {
	match value {
		None | Some(Value::Null) => Vec::new(),
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(Value::as_str)
			.filter(|field| entity.aggregation_fields.iter().any(|allowed| allowed == field))
			.map(str::to_string)
			.collect(),
		Some(_) => {
			errors.add(AGGREGATIONS_KEY, "Expected a list of items.");

			Vec::new()
		},
	}
}

fn filter_fields(
	body: &Map<String, Value>,
	entity: &Entity,
	errors: &mut ValidationErrors,
) -> (FilterMap, CompositeFilters) {
	let mut filters = FilterMap::new();
	let mut composite = CompositeFilters::new();
	let mut bad_date = false;

	for (key, value) in body {
		if RESERVED_KEYS.contains(&key.as_str()) || !entity.filter_fields.contains(key) {
			continue;
		}
		if is_range_key(key) && value.is_null() {
			continue;
		}
		if !range_dates_are_valid(key, value) {
			bad_date = true;

			continue;
		}

		if let Some(fields) = entity.composite_filters.get(key) {
			composite.insert(key.clone(), fields.clone());
			filters.insert(key.clone(), FilterValue::from_json(value.clone()));

			continue;
		}

		let field = entity.remap_fields.get(key).unwrap_or(key);

		filters.insert(field.clone(), FilterValue::from_json(value.clone()));
	}

	if bad_date {
		errors.non_field(DATE_FORMAT_ERROR);
	}

	(filters, composite)
}

fn is_range_key(key: &str) -> bool {
	key.ends_with("_before") || key.ends_with("_after")
}

/// Range bounds under `key`. Keys of a nested filter object are checked as `<key>_<inner>`,
/// the name they are split under when the filter is built.
fn range_dates_are_valid(key: &str, value: &Value) -> bool {
	if is_range_key(key) {
		return match value {
			Value::Null => true,
			Value::String(raw) => is_valid_date(raw),
			_ => false,
		};
	}

	match value {
		Value::Object(inner) => inner.iter().all(|(inner_key, inner_value)| {
			range_dates_are_valid(&format!("{key}_{inner_key}"), inner_value)
		}),
		_ => true,
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use serde_json::json;

	use super::*;
	use crate::builder::SortDirection;

	fn interaction() -> Entity {
		Entity {
			name: "interaction".to_string(),
			doc_type: "interaction".to_string(),
			search_fields: vec!["subject".to_string()],
			sort_fields: vec!["date".to_string(), "subject".to_string()],
			filter_fields: ["company", "contact_name", "date_after", "date_before", "kind"]
				.into_iter()
				.map(str::to_string)
				.collect(),
			remap_fields: BTreeMap::from([("company".to_string(), "company.id".to_string())]),
			composite_filters: BTreeMap::from([(
				"contact_name".to_string(),
				vec!["contact.name".to_string(), "contact.name_trigram".to_string()],
			)]),
			aggregation_fields: vec!["kind".to_string()],
			default_sort: Some("date:desc".to_string()),
			read_permission: None,
			permissions: None,
		}
	}

	fn validation_errors(err: Error) -> ValidationErrors {
		match err {
			Error::Validation(errors) => errors,
			other => panic!("expected validation error, got {other:?}"),
		}
	}

	#[test]
	fn pagination_falls_back_on_bad_values() {
		for limit in [json!("abc"), json!(-5), json!(0), json!(1.5)] {
			assert_eq!(
				Pagination::parse(None, Some(&limit), 100),
				Pagination { offset: 0, limit: 100 },
				"limit {limit}"
			);
		}

		assert_eq!(
			Pagination::parse(Some(&json!("x")), Some(&json!("25")), 100),
			Pagination { offset: 0, limit: 25 }
		);
		assert_eq!(
			Pagination::parse(Some(&json!(-3)), None, 100),
			Pagination { offset: 0, limit: 100 }
		);
		assert_eq!(
			Pagination::parse(Some(&json!(40)), Some(&json!(20)), 100),
			Pagination { offset: 40, limit: 20 }
		);
	}

	#[test]
	fn filters_are_remapped_and_unknown_keys_dropped() {
		let params = entity_search_params(
			&json!({
				"original_query": "exports",
				"company": "c-1",
				"contact_name": "jo",
				"not_a_filter": "x",
				"limit": "10",
			}),
			&interaction(),
			100,
		)
		.expect("valid params");

		assert_eq!(params.term, "exports");
		assert_eq!(params.filters.keys().collect::<Vec<_>>(), vec!["company.id", "contact_name"]);
		assert_eq!(params.composite_filters.keys().collect::<Vec<_>>(), vec!["contact_name"]);
		assert_eq!(params.pagination.limit, 10);
	}

	#[test]
	fn entity_default_sort_applies_without_sortby() {
		let params = entity_search_params(&json!({}), &interaction(), 100).expect("valid params");

		assert_eq!(
			params.sort,
			SortOrder::Field { field: "date".to_string(), direction: SortDirection::Desc }
		);
	}

	#[test]
	fn bad_dates_are_one_non_field_error() {
		let err = entity_search_params(
			&json!({ "date_after": "not a date", "date_before": "2018-13-45" }),
			&interaction(),
			100,
		)
		.expect_err("invalid dates");
		let errors = validation_errors(err);

		assert_eq!(errors.get("non_field_errors"), Some(&[DATE_FORMAT_ERROR.to_string()][..]));
		assert_eq!(errors.fields().len(), 1);
	}

	#[test]
	fn nested_range_bounds_are_validated() {
		let project = Entity {
			filter_fields: ["estimated_land_date"].into_iter().map(str::to_string).collect(),
			..interaction()
		};
		let err = entity_search_params(
			&json!({ "estimated_land_date": { "after": "not-a-date" } }),
			&project,
			100,
		)
		.expect_err("invalid nested date");
		let errors = validation_errors(err);

		assert_eq!(errors.get("non_field_errors"), Some(&[DATE_FORMAT_ERROR.to_string()][..]));

		let body = json!({
			"estimated_land_date": { "after": "2018-01-01", "before": null, "exists": false },
		});
		let params = entity_search_params(&body, &project, 100).expect("valid nested dates");

		assert!(params.filters.contains_key("estimated_land_date"));
	}

	#[test]
	fn accepts_plain_and_rfc3339_dates() {
		assert!(is_valid_date("2017-12-01"));
		assert!(is_valid_date("2017-12-01T10:00:00Z"));
		assert!(!is_valid_date("01/12/2017"));
	}

	#[test]
	fn unknown_aggregations_are_dropped() {
		let params = entity_search_params(
			&json!({ "aggregations": ["kind", "subject"] }),
			&interaction(),
			100,
		)
		.expect("valid params");

		assert_eq!(params.aggregations, vec!["kind"]);
	}

	#[test]
	fn sort_errors_are_reported_under_sortby() {
		let body = json!({ "sortby": "gyratory:backwards" });
		let err = entity_search_params(&body, &interaction(), 100).expect_err("invalid sort");
		let errors = validation_errors(err);

		assert_eq!(errors.get("sortby").map(<[String]>::len), Some(2));
	}

	#[test]
	fn basic_search_requires_term_and_known_entity() {
		let registry = Registry::new([interaction()]);
		let search = Search { default_entity: "interaction".to_string(), ..Default::default() };
		let err = basic_search_params(&json!({ "entity": "widget" }), &search, &registry)
			.expect_err("invalid params");
		let errors = validation_errors(err);

		assert!(errors.get("term").is_some());
		assert!(errors.get("entity").is_some());

		let params = basic_search_params(&json!({ "term": "" }), &search, &registry)
			.expect("valid params");

		assert_eq!(params.entity, "interaction");
		assert_eq!(params.sort, SortOrder::Relevance);
	}
}
