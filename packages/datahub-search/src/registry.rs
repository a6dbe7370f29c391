use std::collections::{BTreeMap, BTreeSet};

use datahub_config::{Config, Entity};

/// Searchable entity types, keyed and iterated by name.
#[derive(Clone, Debug, Default)]
pub struct Registry {
	entities: BTreeMap<String, Entity>,
}
impl Registry {
	pub fn new(entities: impl IntoIterator<Item = Entity>) -> Self {
		Self { entities: entities.into_iter().map(|entity| (entity.name.clone(), entity)).collect() }
	}

	pub fn from_config(cfg: &Config) -> Self {
		Self::new(cfg.entities.iter().cloned())
	}

	pub fn get(&self, name: &str) -> Option<&Entity> {
		self.entities.get(name)
	}

	pub fn by_doc_type(&self, doc_type: &str) -> Option<&Entity> {
		self.entities.values().find(|entity| entity.doc_type == doc_type)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Entity> {
		self.entities.values()
	}

	/// Union of every entity's search fields, sorted so that identical registries always build
	/// identical queries.
	pub fn search_fields(&self) -> Vec<String> {
		self.union(|entity| &entity.search_fields)
	}

	pub fn sort_fields(&self) -> Vec<String> {
		self.union(|entity| &entity.sort_fields)
	}

	fn union(&self, fields: impl Fn(&Entity) -> &Vec<String>) -> Vec<String> {
		self.entities
			.values()
			.flat_map(|entity| fields(entity).iter().cloned())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect()
	}
}
