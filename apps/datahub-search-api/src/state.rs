use std::sync::Arc;

use datahub_config::Config;
use datahub_search::{SearchBackend, SearchService};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SearchService>,
}
impl AppState {
	/// State backed by the configured Elasticsearch cluster.
	pub fn new(config: Config) -> Self {
		Self { service: Arc::new(SearchService::new(config)) }
	}

	pub fn with_backend(config: Config, backend: Arc<dyn SearchBackend>) -> Self {
		Self { service: Arc::new(SearchService::with_backend(config, backend)) }
	}
}
