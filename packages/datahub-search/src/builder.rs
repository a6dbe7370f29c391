//! Assembly of complete `_search` requests.
//!
//! Everything here is pure: the same inputs always produce the same [`SearchQuery`], and the same
//! [`SearchQuery`] always serializes to the same body.

mod aggregation;
mod filter;
mod permission;
mod sort;

pub use aggregation::Aggregation;
pub use filter::{
	CompositeFilters, FieldPredicate, FilterMap, FilterValue, RangeMap, field_query, filter_query,
	must_filter_query, range_queries, split_range_fields,
};
pub use permission::{PermissionFilter, PermissionScope};
pub use sort::{SortDirection, SortKey, SortOrder};

use serde_json::{Map, Value};

use crate::{
	dsl::{BoolQuery, Query},
	registry::Registry,
};

/// Largest `from + size` window the index serves.
pub const MAX_RESULTS: u64 = datahub_config::MAX_RESULT_WINDOW;
pub const COUNT_BY_TYPE: &str = "count_by_type";

const TYPE_FIELD: &str = "_type";
const NAME_KEYWORD_BOOST: f64 = 2.0;

/// Largest page size that keeps `offset + limit` inside the result window. Never negative.
pub fn clip_limit(offset: u64, limit: u64) -> u64 {
	MAX_RESULTS.saturating_sub(offset).min(limit)
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
	index: String,
	query: Query,
	filter: Option<Query>,
	post_filter: Option<Query>,
	sort: Vec<SortKey>,
	aggregations: Vec<Aggregation>,
	from: u64,
	size: Option<u64>,
}
impl SearchQuery {
	pub fn new(index: impl Into<String>, query: Query) -> Self {
		Self {
			index: index.into(),
			query,
			filter: None,
			post_filter: None,
			sort: Vec::new(),
			aggregations: Vec::new(),
			from: 0,
			size: None,
		}
	}

	/// Adds a non-scoring clause. Repeated calls require every clause to match.
	pub fn with_filter(self, clause: Query) -> Self {
		let filter = match self.filter {
			Some(existing) => existing.and(clause),
			None => clause,
		};

		Self { filter: Some(filter), ..self }
	}

	/// Clause applied to hits after aggregations are computed.
	pub fn with_post_filter(self, clause: Query) -> Self {
		Self { post_filter: Some(clause), ..self }
	}

	pub fn with_sort(self, order: &SortOrder) -> Self {
		Self { sort: order.keys(), ..self }
	}

	pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
		self.aggregations.push(aggregation);

		self
	}

	/// Sets `from`/`size`, clipping `size` so the window ends inside [`MAX_RESULTS`].
	pub fn with_window(self, offset: u64, limit: u64) -> Self {
		Self { from: offset, size: Some(clip_limit(offset, limit)), ..self }
	}

	pub fn index(&self) -> &str {
		&self.index
	}

	pub fn query(&self) -> &Query {
		&self.query
	}

	pub fn filter(&self) -> Option<&Query> {
		self.filter.as_ref()
	}

	pub fn post_filter(&self) -> Option<&Query> {
		self.post_filter.as_ref()
	}

	pub fn sort(&self) -> &[SortKey] {
		&self.sort
	}

	pub fn aggregations(&self) -> &[Aggregation] {
		&self.aggregations
	}

	pub fn from(&self) -> u64 {
		self.from
	}

	pub fn size(&self) -> Option<u64> {
		self.size
	}

	/// The `_search` request body.
	pub fn to_body(&self) -> Value {
		let mut body = Map::new();

		body.insert("query".to_string(), self.scoring_with_filter().to_value());

		if let Some(post_filter) = &self.post_filter {
			body.insert("post_filter".to_string(), post_filter.to_value());
		}
		if !self.sort.is_empty() {
			body.insert(
				"sort".to_string(),
				Value::Array(self.sort.iter().map(SortKey::to_value).collect()),
			);
		}
		if !self.aggregations.is_empty() {
			let aggs: Map<String, Value> = self
				.aggregations
				.iter()
				.map(|aggregation| (aggregation.name().to_string(), aggregation.to_value()))
				.collect();

			body.insert("aggs".to_string(), Value::Object(aggs));
		}

		body.insert("from".to_string(), Value::from(self.from));

		if let Some(size) = self.size {
			body.insert("size".to_string(), Value::from(size));
		}

		Value::Object(body)
	}

	/// Stable hash of the request body, used to correlate logged queries.
	pub fn fingerprint(&self) -> String {
		blake3::hash(self.to_body().to_string().as_bytes()).to_hex().to_string()
	}

	fn scoring_with_filter(&self) -> Query {
		let Some(filter) = self.filter.clone() else {
			return self.query.clone();
		};

		// A `should`-only bool stops requiring a should match once it gains a filter.
		match self.query.clone() {
			Query::Bool(scoring) if scoring.should.is_empty() => {
				Query::Bool(scoring.with_filter(filter))
			},
			scoring => BoolQuery::must([scoring]).with_filter(filter).into(),
		}
	}
}

/// Relevance query for a free-text term. An empty term matches everything.
pub fn search_term_query(term: &str, fields: &[String]) -> Query {
	if term.is_empty() {
		return Query::MatchAll;
	}

	BoolQuery::should([
		Query::MatchPhrase {
			field: "name_keyword".to_string(),
			query: Value::from(term),
			boost: Some(NAME_KEYWORD_BOOST),
		},
		Query::match_phrase("id", term),
		Query::MultiMatch { query: term.to_string(), fields: fields.to_vec() },
	])
	.into()
}

pub struct GlobalSearchArgs<'a> {
	pub index: &'a str,
	pub term: &'a str,
	pub registry: &'a Registry,
	/// Document types the caller may see in the hits.
	pub entities: &'a [String],
	pub permission_scope: &'a PermissionScope,
	pub sort: &'a SortOrder,
	pub ignored_entities: &'a [String],
	pub offset: u64,
	pub limit: u64,
}

pub struct EntitySearchArgs<'a> {
	pub index: &'a str,
	pub doc_type: &'a str,
	pub term: &'a str,
	pub search_fields: &'a [String],
	pub filters: &'a FilterMap,
	pub composite_filters: Option<&'a CompositeFilters>,
	pub permission: &'a PermissionFilter,
	pub sort: &'a SortOrder,
	pub aggregations: &'a [String],
}

/// Search across every registered entity, counting hits per type.
pub fn global_search_query(args: GlobalSearchArgs<'_>) -> SearchQuery {
	let GlobalSearchArgs {
		index,
		term,
		registry,
		entities,
		permission_scope,
		sort,
		ignored_entities,
		offset,
		limit,
	} = args;
	let fields = registry.search_fields();
	let visible_types = entities
		.iter()
		.filter(|doc_type| !ignored_entities.contains(doc_type))
		.map(|doc_type| Query::term(TYPE_FIELD, doc_type.as_str()));
	let post_filter = BoolQuery::should(visible_types);
	let post_filter =
		if post_filter.should.is_empty() { Query::MatchNone } else { post_filter.into() };
	let mut query = SearchQuery::new(index, search_term_query(term, &fields))
		.with_post_filter(post_filter)
		.with_sort(sort)
		.with_aggregation(Aggregation::terms(COUNT_BY_TYPE, TYPE_FIELD))
		.with_window(offset, limit);

	if let Some(permission) = permission_scope.to_query() {
		query = query.with_filter(permission);
	}

	query
}

/// Search within one entity type. The window is applied separately with [`limit_search_query`].
pub fn entity_search_query(args: EntitySearchArgs<'_>) -> SearchQuery {
	let EntitySearchArgs {
		index,
		doc_type,
		term,
		search_fields,
		filters,
		composite_filters,
		permission,
		sort,
		aggregations,
	} = args;
	let mut must = vec![Query::term(TYPE_FIELD, doc_type)];

	if !term.is_empty() {
		must.push(search_term_query(term, search_fields));
	}

	let (plain, ranges) = split_range_fields(filters);
	let must_filters = must_filter_query(&plain, composite_filters, &ranges);
	let mut query = SearchQuery::new(index, BoolQuery::must(must).into()).with_sort(sort);

	if !must_filters.is_empty() {
		query = query.with_post_filter(BoolQuery::must(must_filters).into());
	}
	if let Some(permission) = permission.to_query() {
		query = query.with_filter(permission);
	}

	aggregations
		.iter()
		.filter_map(|field| Aggregation::for_field(field))
		.fold(query, SearchQuery::with_aggregation)
}

pub fn limit_search_query(query: SearchQuery, offset: u64, limit: u64) -> SearchQuery {
	query.with_window(offset, limit)
}
