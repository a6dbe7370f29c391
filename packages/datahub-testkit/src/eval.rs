//! Evaluation of serialized query clauses against JSON documents.
//!
//! Covers the subset of the query language the search builder emits. Analysis is a lowercase
//! split on non-alphanumeric characters; nested clauses are evaluated once per nested object.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use time::{
	Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};

use crate::{Error, Result};

pub(crate) const TYPE_FIELD: &str = "_type";

/// One document, or one nested object of a document, as seen by a clause.
#[derive(Clone, Debug)]
pub(crate) struct View<'a> {
	pub(crate) doc_type: &'a str,
	pub(crate) source: Value,
}

/// Relevance score of the view, or `None` when the clause does not match.
pub(crate) fn score(view: &View<'_>, query: &Value) -> Result<Option<f64>> {
	let (kind, body) = single_entry(query)?;

	match kind {
		"match_all" => Ok(Some(1.0)),
		"match_none" => Ok(None),
		"term" => term(view, body),
		"match" => analyzed_match(view, body),
		"match_phrase" => phrase(view, body),
		"multi_match" => multi_match(view, body),
		"range" => range(view, body),
		"exists" => {
			let field = str_param(body, "field")?;

			Ok(hit(!field_values(view, field).is_empty(), 1.0))
		},
		"bool" => boolean(view, body),
		"nested" => nested(view, body),
		other => Err(Error::Unsupported(format!("query clause {other}"))),
	}
}

pub(crate) fn matches(view: &View<'_>, query: &Value) -> Result<bool> {
	Ok(score(view, query)?.is_some())
}

/// Non-null leaf values at a dotted path. Arrays are flattened at every level.
pub(crate) fn field_values<'a>(view: &'a View<'_>, path: &str) -> Vec<&'a Value> {
	if path == TYPE_FIELD {
		return Vec::new();
	}

	let mut current = vec![&view.source];

	for segment in path.split('.') {
		current = flatten(current).into_iter().filter_map(|value| value.get(segment)).collect();
	}

	flatten(current).into_iter().filter(|value| !value.is_null()).collect()
}

/// Views of the document restricted, in turn, to each object under `path`.
pub(crate) fn nested_views<'a>(view: &View<'a>, path: &str) -> Vec<View<'a>> {
	let elements: Vec<Value> = {
		let mut current = vec![&view.source];

		for segment in path.split('.') {
			current =
				flatten(current).into_iter().filter_map(|value| value.get(segment)).collect();
		}

		flatten(current).into_iter().filter(|value| value.is_object()).cloned().collect()
	};

	elements
		.into_iter()
		.map(|element| {
			let mut source = view.source.clone();

			set_path(&mut source, path, element);

			View { doc_type: view.doc_type, source }
		})
		.collect()
}

/// Orders two field values: dates chronologically, numbers numerically, other strings
/// lexicographically.
pub(crate) fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
	match (lhs, rhs) {
		(Value::Number(lhs), Value::Number(rhs)) => lhs.as_f64()?.partial_cmp(&rhs.as_f64()?),
		(Value::String(lhs), Value::String(rhs)) => match (parse_date(lhs), parse_date(rhs)) {
			(Some(lhs), Some(rhs)) => Some(lhs.cmp(&rhs)),
			_ => Some(lhs.cmp(rhs)),
		},
		(Value::Bool(lhs), Value::Bool(rhs)) => Some(lhs.cmp(rhs)),
		_ => None,
	}
}

pub(crate) fn single_entry(value: &Value) -> Result<(&str, &Value)> {
	let object = value
		.as_object()
		.ok_or_else(|| Error::Unsupported(format!("expected an object, got {value}")))?;
	let mut entries = object.iter();

	match (entries.next(), entries.next()) {
		(Some((key, value)), None) => Ok((key.as_str(), value)),
		_ => Err(Error::Unsupported(format!("expected a single-key object, got {value}"))),
	}
}

fn term(view: &View<'_>, body: &Value) -> Result<Option<f64>> {
	let (field, expected) = single_entry(body)?;
	let expected = expected.get("value").unwrap_or(expected);
	let found = if field == TYPE_FIELD {
		expected.as_str() == Some(view.doc_type)
	} else {
		field_values(view, field).into_iter().any(|value| value == expected)
	};

	Ok(hit(found, 1.0))
}

fn analyzed_match(view: &View<'_>, body: &Value) -> Result<Option<f64>> {
	let (field, params) = single_entry(body)?;
	let (query, operator) = match params {
		Value::Object(params) => (
			params.get("query").unwrap_or(&Value::Null),
			params.get("operator").and_then(Value::as_str).unwrap_or("or"),
		),
		query => (query, "or"),
	};
	let wanted = tokens(query);
	let present: Vec<String> = field_values(view, field).into_iter().flat_map(tokens).collect();

	Ok(token_overlap(&wanted, &present, operator))
}

fn phrase(view: &View<'_>, body: &Value) -> Result<Option<f64>> {
	let (field, params) = single_entry(body)?;
	let (query, boost) = match params {
		Value::Object(params) => (
			params.get("query").unwrap_or(&Value::Null),
			params.get("boost").and_then(Value::as_f64).unwrap_or(1.0),
		),
		query => (query, 1.0),
	};
	let wanted = tokens(query);
	let found = !wanted.is_empty()
		&& field_values(view, field).into_iter().any(|value| {
			let present = tokens(value);

			present.windows(wanted.len()).any(|window| window == wanted.as_slice())
		});

	Ok(hit(found, boost))
}

fn multi_match(view: &View<'_>, body: &Value) -> Result<Option<f64>> {
	let query = body.get("query").unwrap_or(&Value::Null);
	let operator = body.get("operator").and_then(Value::as_str).unwrap_or("or");
	let fields = body
		.get("fields")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::Unsupported("multi_match without fields".to_string()))?;
	let present: Vec<String> = fields
		.iter()
		.filter_map(Value::as_str)
		.map(|field| field.split_once('^').map(|(field, _)| field).unwrap_or(field))
		.flat_map(|field| field_values(view, field))
		.flat_map(tokens)
		.collect();

	Ok(token_overlap(&tokens(query), &present, operator))
}

fn range(view: &View<'_>, body: &Value) -> Result<Option<f64>> {
	let (field, bounds) = single_entry(body)?;
	let bounds = bounds
		.as_object()
		.ok_or_else(|| Error::Unsupported(format!("range bounds for {field}")))?;
	let found = field_values(view, field).into_iter().any(|value| within(value, bounds));

	Ok(hit(found, 1.0))
}

fn within(value: &Value, bounds: &Map<String, Value>) -> bool {
	bounds.iter().all(|(op, bound)| {
		let Some(ordering) = compare(value, bound) else {
			return false;
		};

		match op.as_str() {
			"gte" => ordering != Ordering::Less,
			"gt" => ordering == Ordering::Greater,
			"lte" => ordering != Ordering::Greater,
			"lt" => ordering == Ordering::Less,
			_ => true,
		}
	})
}

fn boolean(view: &View<'_>, body: &Value) -> Result<Option<f64>> {
	let must = clauses(body, "must")?;
	let filter = clauses(body, "filter")?;
	let should = clauses(body, "should")?;
	let must_not = clauses(body, "must_not")?;
	let mut total = 0.0;

	for clause in must {
		match score(view, clause)? {
			Some(score) => total += score,
			None => return Ok(None),
		}
	}
	for clause in filter {
		if !matches(view, clause)? {
			return Ok(None);
		}
	}
	for clause in must_not {
		if matches(view, clause)? {
			return Ok(None);
		}
	}

	let scoring_only = must.is_empty() && filter.is_empty() && !should.is_empty();
	let minimum = body
		.get("minimum_should_match")
		.and_then(Value::as_u64)
		.unwrap_or(u64::from(scoring_only));
	let mut matched = 0;

	for clause in should {
		if let Some(score) = score(view, clause)? {
			matched += 1;
			total += score;
		}
	}

	if matched < minimum {
		return Ok(None);
	}

	Ok(Some(total.max(1.0)))
}

fn nested(view: &View<'_>, body: &Value) -> Result<Option<f64>> {
	let path = str_param(body, "path")?;
	let query = body
		.get("query")
		.ok_or_else(|| Error::Unsupported("nested without query".to_string()))?;
	let mut best: Option<f64> = None;

	for nested in nested_views(view, path) {
		if let Some(score) = score(&nested, query)? {
			best = Some(best.map_or(score, |best| best.max(score)));
		}
	}

	Ok(best)
}

fn clauses<'a>(body: &'a Value, kind: &str) -> Result<&'a [Value]> {
	match body.get(kind) {
		None => Ok(&[]),
		Some(Value::Array(items)) => Ok(items),
		Some(other) => Err(Error::Unsupported(format!("bool.{kind} must be a list, got {other}"))),
	}
}

fn str_param<'a>(body: &'a Value, key: &str) -> Result<&'a str> {
	body.get(key)
		.and_then(Value::as_str)
		.ok_or_else(|| Error::Unsupported(format!("missing string parameter {key}")))
}

fn token_overlap(wanted: &[String], present: &[String], operator: &str) -> Option<f64> {
	if wanted.is_empty() {
		return None;
	}

	let found = wanted.iter().filter(|token| present.contains(token)).count();
	let matched = if operator == "and" { found == wanted.len() } else { found > 0 };

	hit(matched, found as f64)
}

fn tokens(value: &Value) -> Vec<String> {
	let text = match value {
		Value::String(raw) => raw.to_lowercase(),
		Value::Number(number) => number.to_string(),
		Value::Bool(flag) => flag.to_string(),
		_ => return Vec::new(),
	};

	text.split(|c: char| !c.is_alphanumeric())
		.filter(|token| !token.is_empty())
		.map(str::to_string)
		.collect()
}

fn flatten(values: Vec<&Value>) -> Vec<&Value> {
	values
		.into_iter()
		.flat_map(|value| match value {
			Value::Array(items) => items.iter().collect(),
			other => vec![other],
		})
		.collect()
}

fn set_path(source: &mut Value, path: &str, element: Value) {
	let mut current = source;
	let mut segments = path.split('.').peekable();

	while let Some(segment) = segments.next() {
		let Some(object) = current.as_object_mut() else {
			return;
		};

		if segments.peek().is_none() {
			object.insert(segment.to_string(), element);

			return;
		}

		match object.get_mut(segment) {
			Some(next) => current = next,
			None => return,
		}
	}
}

fn parse_date(raw: &str) -> Option<OffsetDateTime> {
	if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
		return Some(date.midnight().assume_utc());
	}

	OffsetDateTime::parse(raw, &Rfc3339).ok()
}

fn hit(found: bool, score: f64) -> Option<f64> {
	found.then_some(score)
}
