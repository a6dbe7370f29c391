use std::collections::{BTreeMap, BTreeSet};

use datahub_config::Entity;
use serde_json::Value;

use crate::{
	builder::{PermissionFilter, PermissionScope},
	registry::Registry,
};

/// The caller, as described by the permissions and team it presents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
	pub permissions: BTreeSet<String>,
	pub team_id: Option<String>,
}
impl Principal {
	pub fn new(permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self { permissions: permissions.into_iter().map(Into::into).collect(), team_id: None }
	}

	pub fn with_team(self, team_id: impl Into<String>) -> Self {
		Self { team_id: Some(team_id.into()), ..self }
	}

	pub fn has_permission(&self, permission: &str) -> bool {
		self.permissions.contains(permission)
	}
}

pub fn can_read(principal: &Principal, entity: &Entity) -> bool {
	entity.read_permission.as_deref().is_none_or(|permission| principal.has_permission(permission))
}

/// Row-level filter for one entity. Entities without permission rules are unrestricted; the
/// `view_all` permission lifts the rules; otherwise the caller sees only its team's documents.
pub fn permission_filter(principal: &Principal, entity: &Entity) -> PermissionFilter {
	let Some(rules) = &entity.permissions else {
		return PermissionFilter::Unrestricted;
	};

	if principal.has_permission(&rules.view_all) {
		return PermissionFilter::Unrestricted;
	}

	match &principal.team_id {
		Some(team_id) => PermissionFilter::RestrictedTo(
			rules
				.team_fields
				.iter()
				.map(|field| (field.clone(), Value::from(team_id.as_str())))
				.collect(),
		),
		None => PermissionFilter::ExcludeAll,
	}
}

/// Visibility across every entity the caller can read, keyed by document type.
pub fn permission_scope(principal: &Principal, registry: &Registry) -> PermissionScope {
	let filters: BTreeMap<String, PermissionFilter> = registry
		.iter()
		.filter(|entity| can_read(principal, entity))
		.map(|entity| (entity.doc_type.clone(), permission_filter(principal, entity)))
		.collect();

	PermissionScope::ByEntity(filters)
}

/// Document types of every entity the caller can read, in registry order.
pub fn readable_doc_types(principal: &Principal, registry: &Registry) -> Vec<String> {
	registry
		.iter()
		.filter(|entity| can_read(principal, entity))
		.map(|entity| entity.doc_type.clone())
		.collect()
}

#[cfg(test)]
mod tests {
	use datahub_config::EntityPermissions;
	use serde_json::json;

	use super::*;

	fn entity(name: &str, read_permission: Option<&str>, restricted: bool) -> Entity {
		Entity {
			name: name.to_string(),
			doc_type: name.to_string(),
			search_fields: vec!["name".to_string()],
			sort_fields: vec!["name".to_string()],
			filter_fields: Vec::new(),
			remap_fields: BTreeMap::new(),
			composite_filters: BTreeMap::new(),
			aggregation_fields: Vec::new(),
			default_sort: None,
			read_permission: read_permission.map(str::to_string),
			permissions: restricted.then(|| EntityPermissions {
				view_all: format!("{name}.view_all"),
				team_fields: vec!["created_by.dit_team.id".to_string(), "team.id".to_string()],
			}),
		}
	}

	#[test]
	fn read_permission_gates_entity() {
		let gated = entity("order", Some("order.view_order"), false);

		assert!(can_read(&Principal::default(), &entity("company", None, false)));
		assert!(!can_read(&Principal::default(), &gated));
		assert!(can_read(&Principal::new(["order.view_order"]), &gated));
	}

	#[test]
	fn view_all_lifts_team_restriction() {
		let project = entity("investment_project", None, true);

		assert_eq!(
			permission_filter(&Principal::new(["investment_project.view_all"]), &project),
			PermissionFilter::Unrestricted
		);
	}

	#[test]
	fn team_member_is_restricted_to_team_fields() {
		let project = entity("investment_project", None, true);

		assert_eq!(
			permission_filter(&Principal::default().with_team("t1"), &project),
			PermissionFilter::RestrictedTo(vec![
				("created_by.dit_team.id".to_string(), json!("t1")),
				("team.id".to_string(), json!("t1")),
			])
		);
	}

	#[test]
	fn caller_without_team_sees_nothing_restricted() {
		let project = entity("investment_project", None, true);

		assert_eq!(permission_filter(&Principal::default(), &project), PermissionFilter::ExcludeAll);
	}

	#[test]
	fn scope_covers_readable_entities_only() {
		let registry = Registry::new([
			entity("company", None, false),
			entity("order", Some("order.view_order"), false),
		]);

		assert_eq!(
			permission_scope(&Principal::default(), &registry),
			PermissionScope::ByEntity(BTreeMap::from([(
				"company".to_string(),
				PermissionFilter::Unrestricted
			)]))
		);
		assert_eq!(readable_doc_types(&Principal::default(), &registry), vec!["company"]);
	}
}
