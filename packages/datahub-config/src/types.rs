use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub elasticsearch: Elasticsearch,
	#[serde(default)]
	pub search: Search,
	pub entities: Vec<Entity>,
}
impl Config {
	pub fn entity(&self, name: &str) -> Option<&Entity> {
		self.entities.iter().find(|entity| entity.name == name)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Elasticsearch {
	pub url: String,
	pub index: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Optional. Sent as `Authorization: ApiKey <key>` when present.
	pub api_key: Option<String>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	#[serde(default = "default_limit")]
	pub default_limit: u64,
	#[serde(default = "default_entity")]
	pub default_entity: String,
	/// Document types never returned by global search, even when readable.
	#[serde(default)]
	pub ignored_entities: Vec<String>,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_limit: default_limit(),
			default_entity: default_entity(),
			ignored_entities: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
	pub name: String,
	pub doc_type: String,
	pub search_fields: Vec<String>,
	pub sort_fields: Vec<String>,
	#[serde(default)]
	pub filter_fields: Vec<String>,
	/// Request filter name to indexed field name, e.g. `company = "company.id"`.
	#[serde(default)]
	pub remap_fields: BTreeMap<String, String>,
	/// Request filter name to the indexed fields it is matched against, any of which may match.
	#[serde(default)]
	pub composite_filters: BTreeMap<String, Vec<String>>,
	#[serde(default)]
	pub aggregation_fields: Vec<String>,
	/// Sort token used when the request does not carry `sortby`, e.g. `"date:desc"`.
	pub default_sort: Option<String>,
	pub read_permission: Option<String>,
	pub permissions: Option<EntityPermissions>,
}

/// Row-level visibility rules for an entity.
///
/// Principals holding `view_all` see every document. Other principals see documents whose
/// `team_fields` match their team, and nothing when they have no team.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityPermissions {
	pub view_all: String,
	pub team_fields: Vec<String>,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_timeout_ms() -> u64 {
	5_000
}

fn default_limit() -> u64 {
	100
}

fn default_entity() -> String {
	"company".to_string()
}
