pub mod fixtures;

mod error;
mod eval;

pub use error::{Error, Result};

use std::{cmp::Ordering, collections::BTreeMap, sync::Mutex};

use serde_json::{Map, Value};

use datahub_config::Elasticsearch;
use datahub_search::{BoxFuture, SearchBackend};
use eval::{TYPE_FIELD, View};

const DEFAULT_SIZE: u64 = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
	pub id: String,
	pub doc_type: String,
	pub source: Value,
}

/// In-memory stand-in for an Elasticsearch index. Executes `_search` bodies and records every
/// body it was given.
#[derive(Debug, Default)]
pub struct MemoryIndex {
	documents: Vec<Document>,
	requests: Mutex<Vec<Value>>,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a document. Its id is read from the `id` field of the source.
	pub fn insert(&mut self, doc_type: &str, source: Value) -> Result<()> {
		let id = source
			.get("id")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::Message(format!("Document of type {doc_type} has no id.")))?
			.to_string();

		self.documents.push(Document { id, doc_type: doc_type.to_string(), source });

		Ok(())
	}

	/// Bodies received so far, oldest first.
	pub fn requests(&self) -> Vec<Value> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn execute(&self, body: &Value) -> Result<Value> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).push(body.clone());

		let query = body.get("query").cloned().unwrap_or(serde_json::json!({ "match_all": {} }));
		let mut hits = Vec::new();

		for document in &self.documents {
			let view = View { doc_type: &document.doc_type, source: document.source.clone() };

			if let Some(score) = eval::score(&view, &query)? {
				hits.push(Hit { document, view, score });
			}
		}

		let aggregations = match body.get("aggs") {
			Some(aggs) => {
				let views: Vec<View<'_>> = hits.iter().map(|hit| hit.view.clone()).collect();

				Some(aggregate(aggs, &views)?)
			},
			None => None,
		};

		if let Some(post_filter) = body.get("post_filter") {
			let mut kept = Vec::with_capacity(hits.len());

			for hit in hits {
				if eval::matches(&hit.view, post_filter)? {
					kept.push(hit);
				}
			}

			hits = kept;
		}

		if let Some(sort) = body.get("sort") {
			let keys = sort_keys(sort)?;

			hits.sort_by(|lhs, rhs| compare_hits(lhs, rhs, &keys));
		}

		let total = hits.len();
		let from = body.get("from").and_then(Value::as_u64).unwrap_or(0);
		let size = body.get("size").and_then(Value::as_u64).unwrap_or(DEFAULT_SIZE);
		let page: Vec<Value> = hits
			.iter()
			.skip(usize::try_from(from).unwrap_or(usize::MAX))
			.take(usize::try_from(size).unwrap_or(usize::MAX))
			.map(|hit| {
				serde_json::json!({
					"_id": hit.document.id,
					"_type": hit.document.doc_type,
					"_score": hit.score,
					"_source": hit.document.source,
				})
			})
			.collect();
		let mut response = serde_json::json!({
			"hits": { "total": { "value": total, "relation": "eq" }, "hits": page }
		});

		if let (Some(aggregations), Some(object)) = (aggregations, response.as_object_mut()) {
			object.insert("aggregations".to_string(), aggregations);
		}

		Ok(response)
	}
}
impl SearchBackend for MemoryIndex {
	fn search<'a>(
		&'a self,
		_cfg: &'a Elasticsearch,
		_index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, datahub_search::Result<Value>> {
		Box::pin(async move {
			self.execute(body)
				.map_err(|err| datahub_search::Error::Backend { message: err.to_string() })
		})
	}
}

struct Hit<'a> {
	document: &'a Document,
	view: View<'a>,
	score: f64,
}

enum SortKey {
	Score,
	Field { field: String, descending: bool, missing_first: bool },
}

fn sort_keys(sort: &Value) -> Result<Vec<SortKey>> {
	let items = sort
		.as_array()
		.ok_or_else(|| Error::Unsupported("sort must be a list".to_string()))?;

	items
		.iter()
		.map(|item| match item {
			Value::String(field) if field == "_score" => Ok(SortKey::Score),
			Value::String(field) => {
				Ok(SortKey::Field { field: field.clone(), descending: false, missing_first: false })
			},
			other => {
				let (field, params) = eval::single_entry(other)?;
				let descending = params.get("order").and_then(Value::as_str) == Some("desc");
				let missing_first =
					params.get("missing").and_then(Value::as_str) == Some("_first");

				Ok(SortKey::Field { field: field.to_string(), descending, missing_first })
			},
		})
		.collect()
}

fn compare_hits(lhs: &Hit<'_>, rhs: &Hit<'_>, keys: &[SortKey]) -> Ordering {
	for key in keys {
		let ordering = match key {
			SortKey::Score => rhs.score.partial_cmp(&lhs.score).unwrap_or(Ordering::Equal),
			SortKey::Field { field, descending, missing_first } => {
				let lhs = sort_value(&lhs.view, field, *descending);
				let rhs = sort_value(&rhs.view, field, *descending);

				match (lhs, rhs) {
					(Some(lhs), Some(rhs)) => {
						let ordering = eval::compare(lhs, rhs).unwrap_or(Ordering::Equal);

						if *descending { ordering.reverse() } else { ordering }
					},
					(None, Some(_)) if *missing_first => Ordering::Less,
					(None, Some(_)) => Ordering::Greater,
					(Some(_), None) if *missing_first => Ordering::Greater,
					(Some(_), None) => Ordering::Less,
					(None, None) => Ordering::Equal,
				}
			},
		};

		if ordering != Ordering::Equal {
			return ordering;
		}
	}

	Ordering::Equal
}

/// Multi-valued fields sort on their smallest value ascending and their largest descending.
fn sort_value<'a>(view: &'a View<'_>, field: &str, descending: bool) -> Option<&'a Value> {
	let values = eval::field_values(view, field);
	let pick = |lhs: &&Value, rhs: &&Value| eval::compare(lhs, rhs).unwrap_or(Ordering::Equal);

	if descending { values.into_iter().max_by(pick) } else { values.into_iter().min_by(pick) }
}

fn aggregate(aggs: &Value, views: &[View<'_>]) -> Result<Value> {
	let aggs = aggs
		.as_object()
		.ok_or_else(|| Error::Unsupported("aggs must be an object".to_string()))?;
	let mut out = Map::new();

	for (name, definition) in aggs {
		let result = if let Some(terms) = definition.get("terms") {
			let field = terms
				.get("field")
				.and_then(Value::as_str)
				.ok_or_else(|| Error::Unsupported(format!("terms aggregation {name}")))?;

			terms_buckets(field, views)
		} else if let Some(nested) = definition.get("nested") {
			let path = nested
				.get("path")
				.and_then(Value::as_str)
				.ok_or_else(|| Error::Unsupported(format!("nested aggregation {name}")))?;
			let inner: Vec<View<'_>> =
				views.iter().flat_map(|view| eval::nested_views(view, path)).collect();
			let mut result = match definition.get("aggs") {
				Some(inner_aggs) => aggregate(inner_aggs, &inner)?,
				None => Value::Object(Map::new()),
			};

			if let Some(object) = result.as_object_mut() {
				object.insert("doc_count".to_string(), Value::from(inner.len()));
			}

			result
		} else {
			return Err(Error::Unsupported(format!("aggregation {name}")));
		};

		out.insert(name.clone(), result);
	}

	Ok(Value::Object(out))
}

/// Buckets ordered by count descending, then key. A document counts once per distinct value.
fn terms_buckets(field: &str, views: &[View<'_>]) -> Value {
	let mut counts: BTreeMap<String, (Value, u64)> = BTreeMap::new();

	for view in views {
		let values: Vec<Value> = if field == TYPE_FIELD {
			vec![Value::from(view.doc_type)]
		} else {
			eval::field_values(view, field).into_iter().cloned().collect()
		};
		let distinct: BTreeMap<String, Value> = values
			.into_iter()
			.map(|value| (bucket_key(&value), value))
			.collect();

		for (key, value) in distinct {
			counts.entry(key).or_insert((value, 0)).1 += 1;
		}
	}

	let mut buckets: Vec<(Value, u64)> = counts.into_values().collect();

	buckets.sort_by(|lhs, rhs| rhs.1.cmp(&lhs.1));

	let buckets: Vec<Value> = buckets
		.into_iter()
		.map(|(key, doc_count)| serde_json::json!({ "key": key, "doc_count": doc_count }))
		.collect();

	serde_json::json!({ "buckets": buckets })
}

fn bucket_key(value: &Value) -> String {
	value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())
}
