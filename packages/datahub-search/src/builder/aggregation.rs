use serde_json::{Map, Value};

/// Suffixes of range and search-only filters, which have no field to bucket on.
const UNAGGREGATABLE_SUFFIXES: [&str; 4] = ["_before", "_after", "_trigram", "_exists"];

#[derive(Clone, Debug, PartialEq)]
pub enum Aggregation {
	Terms { name: String, field: String },
	Nested { name: String, path: String, inner: Box<Aggregation> },
}
impl Aggregation {
	pub fn terms(name: impl Into<String>, field: impl Into<String>) -> Self {
		Self::Terms { name: name.into(), field: field.into() }
	}

	/// Bucket for a requested facet field, or `None` when the field cannot be aggregated.
	/// Dotted fields are bucketed inside their nested document.
	pub fn for_field(field: &str) -> Option<Self> {
		if UNAGGREGATABLE_SUFFIXES.iter().any(|suffix| field.ends_with(suffix)) {
			return None;
		}

		let terms = Self::terms(field, field);

		match field.split_once('.') {
			Some((path, _)) => Some(Self::Nested {
				name: field.to_string(),
				path: path.to_string(),
				inner: Box::new(terms),
			}),
			None => Some(terms),
		}
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Terms { name, .. } | Self::Nested { name, .. } => name,
		}
	}

	/// Body of this aggregation, without its name.
	pub fn to_value(&self) -> Value {
		match self {
			Self::Terms { field, .. } => serde_json::json!({ "terms": { "field": field } }),
			Self::Nested { path, inner, .. } => {
				let mut aggs = Map::new();

				aggs.insert(inner.name().to_string(), inner.to_value());

				serde_json::json!({ "nested": { "path": path }, "aggs": aggs })
			},
		}
	}
}
