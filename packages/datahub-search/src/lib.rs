pub mod access;
pub mod builder;
pub mod dsl;
pub mod params;
pub mod registry;
pub mod results;
pub mod search;

mod error;

pub use access::Principal;
pub use error::{Error, NON_FIELD_ERRORS, Result, ValidationErrors};
pub use registry::Registry;
pub use results::{EntityCount, SearchResults};
pub use search::BasicSearchResponse;

use std::{future::Future, pin::Pin, sync::Arc};

use datahub_config::{Config, Elasticsearch};
use serde_json::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executes a `_search` body against an index and returns the raw response.
pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a Elasticsearch,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, Result<Value>>;
}

pub struct SearchService {
	pub cfg: Config,
	pub registry: Registry,
	pub backend: Arc<dyn SearchBackend>,
}
impl SearchService {
	pub fn new(cfg: Config) -> Self {
		Self::with_backend(cfg, Arc::new(DefaultBackend))
	}

	pub fn with_backend(cfg: Config, backend: Arc<dyn SearchBackend>) -> Self {
		let registry = Registry::from_config(&cfg);

		Self { cfg, registry, backend }
	}
}

struct DefaultBackend;
impl SearchBackend for DefaultBackend {
	fn search<'a>(
		&'a self,
		cfg: &'a Elasticsearch,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move { Ok(datahub_elasticsearch::search(cfg, index, body).await?) })
	}
}
