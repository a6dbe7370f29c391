use serde_json::{Map, Value};

/// Analyzed fields that cannot be sorted on, mapped to their keyword sub-field.
const SORT_FIELD_ALIASES: &[(&str, &str)] = &[("name", "name_keyword")];
const DIRECTIONS: [&str; 2] = ["asc", "desc"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
	Asc,
	Desc,
}
impl SortDirection {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"asc" => Some(Self::Asc),
			"desc" => Some(Self::Desc),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Asc => "asc",
			Self::Desc => "desc",
		}
	}

	/// Documents without the field sort first ascending and last descending.
	pub fn missing(self) -> &'static str {
		match self {
			Self::Asc => "_first",
			Self::Desc => "_last",
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum SortKey {
	Score,
	Id,
	Field { field: String, direction: SortDirection, nested_path: Option<String> },
}
impl SortKey {
	pub fn to_value(&self) -> Value {
		match self {
			Self::Score => Value::String("_score".to_string()),
			Self::Id => Value::String("id".to_string()),
			Self::Field { field, direction, nested_path } => {
				let mut params = Map::new();

				params.insert("order".to_string(), Value::from(direction.as_str()));
				params.insert("missing".to_string(), Value::from(direction.missing()));

				if let Some(path) = nested_path {
					params.insert("nested_path".to_string(), Value::from(path.as_str()));
				}

				serde_json::json!({ field.as_str(): params })
			},
		}
	}
}

/// Requested result ordering. Every ordering ends with `id` so pages are stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SortOrder {
	#[default]
	Relevance,
	Field { field: String, direction: SortDirection },
}
impl SortOrder {
	/// Parses `field[:direction]`. Field and direction are checked independently and every
	/// problem is reported.
	pub fn parse(token: &str, allowed_fields: &[String]) -> Result<Self, Vec<String>> {
		let (field, direction) = token.rsplit_once(':').unwrap_or((token, "asc"));
		let mut errors = Vec::new();

		if !allowed_fields.iter().any(|allowed| allowed == field) {
			let mut choices: Vec<&str> = allowed_fields.iter().map(String::as_str).collect();

			choices.sort_unstable();
			choices.dedup();
			errors.push(format!("'sortby' field is not one of {}.", tuple_repr(&choices)));
		}

		let direction = SortDirection::parse(direction);

		if direction.is_none() {
			let raw = token.rsplit_once(':').map(|(_, raw)| raw).unwrap_or_default();

			errors.push(format!(
				"Invalid sort direction '{raw}', must be one of {}",
				tuple_repr(&DIRECTIONS)
			));
		}

		match direction {
			Some(direction) if errors.is_empty() => {
				Ok(Self::Field { field: field.to_string(), direction })
			},
			_ => Err(errors),
		}
	}

	pub fn resolve(token: Option<&str>, allowed_fields: &[String]) -> Result<Self, Vec<String>> {
		match token.map(str::trim).filter(|token| !token.is_empty()) {
			Some(token) => Self::parse(token, allowed_fields),
			None => Ok(Self::Relevance),
		}
	}

	pub fn keys(&self) -> Vec<SortKey> {
		match self {
			Self::Relevance => vec![SortKey::Score, SortKey::Id],
			Self::Field { field, direction } => {
				let nested_path = field.split_once('.').map(|(path, _)| path.to_string());

				vec![
					SortKey::Field {
						field: remap_sort_field(field),
						direction: *direction,
						nested_path,
					},
					SortKey::Id,
				]
			},
		}
	}
}

fn remap_sort_field(field: &str) -> String {
	SORT_FIELD_ALIASES
		.iter()
		.find(|(logical, _)| *logical == field)
		.map(|(_, keyword)| (*keyword).to_string())
		.unwrap_or_else(|| field.to_string())
}

fn tuple_repr(items: &[&str]) -> String {
	let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();

	match quoted.as_slice() {
		[single] => format!("({single},)"),
		_ => format!("({})", quoted.join(", ")),
	}
}
