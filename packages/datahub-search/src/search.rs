use serde::Serialize;
use serde_json::Value;

use crate::{
	EntityCount, Error, Result, SearchResults, SearchService,
	access::{self, Principal},
	builder::{
		self, EntitySearchArgs, GlobalSearchArgs, SearchQuery, entity_search_query,
		global_search_query, limit_search_query,
	},
	params,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BasicSearchResponse {
	pub count: u64,
	pub results: Vec<Value>,
	/// Hits per entity across every entity the caller can read.
	pub aggregations: Vec<EntityCount>,
}

impl SearchService {
	/// Searches every entity, returning the hits of the requested entity and the hit count of
	/// each readable entity.
	pub async fn basic_search(
		&self,
		principal: &Principal,
		body: &Value,
	) -> Result<BasicSearchResponse> {
		let params = params::basic_search_params(body, &self.cfg.search, &self.registry)?;
		let entity = self
			.registry
			.get(&params.entity)
			.ok_or_else(|| Error::UnknownEntity { name: params.entity.clone() })?;
		let entities = if access::can_read(principal, entity) {
			vec![entity.doc_type.clone()]
		} else {
			Vec::new()
		};
		let permission_scope = access::permission_scope(principal, &self.registry);
		let query = global_search_query(GlobalSearchArgs {
			index: &self.cfg.elasticsearch.index,
			term: &params.term,
			registry: &self.registry,
			entities: &entities,
			permission_scope: &permission_scope,
			sort: &params.sort,
			ignored_entities: &self.cfg.search.ignored_entities,
			offset: params.pagination.offset,
			limit: params.pagination.limit,
		});
		let results = self.execute(&query, &params.entity).await?;
		let aggregations = results
			.count_by_type
			.into_iter()
			.filter_map(|bucket| {
				let entity = self.registry.by_doc_type(&bucket.entity)?;

				Some(EntityCount { entity: entity.name.clone(), count: bucket.count })
			})
			.collect();

		Ok(BasicSearchResponse { count: results.count, results: results.results, aggregations })
	}

	/// Searches one entity with its filters, sort and aggregations.
	pub async fn entity_search(
		&self,
		principal: &Principal,
		entity_name: &str,
		body: &Value,
	) -> Result<SearchResults> {
		let entity = self
			.registry
			.get(entity_name)
			.ok_or_else(|| Error::UnknownEntity { name: entity_name.to_string() })?;

		if !access::can_read(principal, entity) {
			return Err(Error::PermissionDenied {
				message: format!("Caller may not read {entity_name}."),
			});
		}

		let params = params::entity_search_params(body, entity, self.cfg.search.default_limit)?;
		let permission = access::permission_filter(principal, entity);
		let composite_filters =
			(!params.composite_filters.is_empty()).then_some(&params.composite_filters);
		let query = entity_search_query(EntitySearchArgs {
			index: &self.cfg.elasticsearch.index,
			doc_type: &entity.doc_type,
			term: &params.term,
			search_fields: &entity.search_fields,
			filters: &params.filters,
			composite_filters,
			permission: &permission,
			sort: &params.sort,
			aggregations: &params.aggregations,
		});
		let query =
			limit_search_query(query, params.pagination.offset, params.pagination.limit);

		self.execute(&query, entity_name).await
	}

	async fn execute(&self, query: &SearchQuery, entity: &str) -> Result<SearchResults> {
		let body = query.to_body();

		tracing::debug!(
			entity,
			from = query.from(),
			size = query.size().unwrap_or(builder::MAX_RESULTS),
			fingerprint = %query.fingerprint(),
			"Executing search."
		);

		let response = match self.backend.search(&self.cfg.elasticsearch, query.index(), &body).await
		{
			Ok(response) => response,
			Err(err) => {
				tracing::warn!(error = %err, entity, "Search backend request failed.");

				return Err(err);
			},
		};

		SearchResults::from_response(&response)
	}
}
