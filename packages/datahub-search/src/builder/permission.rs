use std::collections::BTreeMap;

use serde_json::Value;

use crate::dsl::{BoolQuery, Query};

/// Row-level visibility for one entity type.
#[derive(Clone, Debug, PartialEq)]
pub enum PermissionFilter {
	Unrestricted,
	ExcludeAll,
	/// Documents must match at least one of the field/value pairs. No pairs means no documents.
	RestrictedTo(Vec<(String, Value)>),
}
impl PermissionFilter {
	/// `None` when no clause should be applied at all.
	pub fn to_query(&self) -> Option<Query> {
		match self {
			Self::Unrestricted => None,
			Self::ExcludeAll => Some(Query::MatchNone),
			Self::RestrictedTo(conditions) => Some(any_or_none(
				conditions.iter().map(|(field, value)| Query::term(field.as_str(), value.clone())),
			)),
		}
	}
}

/// Visibility across entity types for global search.
#[derive(Clone, Debug, PartialEq)]
pub enum PermissionScope {
	/// Permissions are not in effect for this query.
	Unrestricted,
	/// Only the listed document types are visible, each narrowed by its own filter.
	ByEntity(BTreeMap<String, PermissionFilter>),
}
impl PermissionScope {
	pub fn to_query(&self) -> Option<Query> {
		match self {
			Self::Unrestricted => None,
			Self::ByEntity(filters) => Some(any_or_none(filters.iter().map(|(doc_type, filter)| {
				let branch = Query::term("_type", doc_type.as_str());

				match filter.to_query() {
					Some(condition) => branch.and(condition),
					None => branch,
				}
			}))),
		}
	}
}

/// `bool.should` over the clauses, or `match_none` when there are none: at least one condition
/// can never be met from an empty set.
fn any_or_none(clauses: impl IntoIterator<Item = Query>) -> Query {
	let should: Vec<Query> = clauses.into_iter().collect();

	if should.is_empty() { Query::MatchNone } else { BoolQuery::should(should).into() }
}
