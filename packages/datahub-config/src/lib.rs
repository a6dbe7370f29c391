mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Elasticsearch, Entity, EntityPermissions, Search, Service};

use std::{collections::HashSet, fs, path::Path};

/// Elasticsearch refuses `from + size` beyond this window unless the index is reconfigured.
pub const MAX_RESULT_WINDOW: u64 = 10_000;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.log_level", &cfg.service.log_level),
		("elasticsearch.url", &cfg.elasticsearch.url),
		("elasticsearch.index", &cfg.elasticsearch.index),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.elasticsearch.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "elasticsearch.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_limit > MAX_RESULT_WINDOW {
		return Err(Error::Validation {
			message: format!("search.default_limit must be {MAX_RESULT_WINDOW} or less."),
		});
	}
	if cfg.entities.is_empty() {
		return Err(Error::Validation {
			message: "At least one [[entities]] table is required.".to_string(),
		});
	}

	for (key, value) in &cfg.elasticsearch.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("elasticsearch.default_headers.{key} must be a string."),
			});
		}
	}

	let mut names = HashSet::new();
	let mut doc_types = HashSet::new();

	for entity in &cfg.entities {
		if !names.insert(entity.name.as_str()) {
			return Err(Error::DuplicateEntity { name: entity.name.clone() });
		}
		if !doc_types.insert(entity.doc_type.as_str()) {
			return Err(Error::Validation {
				message: format!(
					"entities.doc_type '{}' is shared by more than one entity.",
					entity.doc_type
				),
			});
		}

		validate_entity(entity)?;
	}

	if cfg.entity(&cfg.search.default_entity).is_none() {
		return Err(Error::Validation {
			message: format!(
				"search.default_entity '{}' is not a declared entity.",
				cfg.search.default_entity
			),
		});
	}

	Ok(())
}

fn validate_entity(entity: &types::Entity) -> Result<()> {
	let name = entity.name.as_str();

	if name.trim().is_empty() || entity.doc_type.trim().is_empty() {
		return Err(Error::Validation {
			message: "entities.name and entities.doc_type must be non-empty.".to_string(),
		});
	}
	if entity.search_fields.is_empty() {
		return Err(Error::Validation {
			message: format!("entities.{name}.search_fields must be non-empty."),
		});
	}
	if entity.sort_fields.is_empty() {
		return Err(Error::Validation {
			message: format!("entities.{name}.sort_fields must be non-empty."),
		});
	}

	for key in entity.remap_fields.keys().chain(entity.composite_filters.keys()) {
		if !entity.filter_fields.contains(key) {
			return Err(Error::Validation {
				message: format!("entities.{name}: '{key}' is not listed in filter_fields."),
			});
		}
	}
	for (key, fields) in &entity.composite_filters {
		if fields.is_empty() {
			return Err(Error::Validation {
				message: format!("entities.{name}.composite_filters.{key} must be non-empty."),
			});
		}
	}

	if let Some(token) = entity.default_sort.as_deref() {
		let (field, direction) = token.rsplit_once(':').unwrap_or((token, "asc"));

		if !entity.sort_fields.iter().any(|sort_field| sort_field == field) {
			return Err(Error::Validation {
				message: format!(
					"entities.{name}.default_sort field '{field}' is not a sort field."
				),
			});
		}
		if !matches!(direction, "asc" | "desc") {
			return Err(Error::Validation {
				message: format!("entities.{name}.default_sort direction must be asc or desc."),
			});
		}
	}
	if let Some(permissions) = entity.permissions.as_ref() {
		if permissions.view_all.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("entities.{name}.permissions.view_all must be non-empty."),
			});
		}
		if permissions.team_fields.is_empty() {
			return Err(Error::Validation {
				message: format!("entities.{name}.permissions.team_fields must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.elasticsearch.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.elasticsearch.api_key = None;
	}

	cfg.elasticsearch.url = cfg.elasticsearch.url.trim_end_matches('/').to_string();

	for entity in &mut cfg.entities {
		if entity.default_sort.as_deref().map(|sort| sort.trim().is_empty()).unwrap_or(false) {
			entity.default_sort = None;
		}
		if entity.read_permission.as_deref().map(|perm| perm.trim().is_empty()).unwrap_or(false) {
			entity.read_permission = None;
		}
	}
}
