pub mod authority;
pub mod backends;
pub mod entity;
pub mod orchestrator;
pub mod profile;
pub mod rerank;
pub mod retrieve;
pub mod snapshot;
pub mod time_serde;

mod error;

pub use authority::{AuthorityCache, AuthorityRefresh, AuthorityWeights};
pub use entity::{EntityResolver, GraphSeeding};
pub use error::{Error, Result};
pub use orchestrator::{
	DegradedReason, ModalityFilters, ModalityOutput, ModalityReport, ModalityStatus, Orchestrator,
};
pub use profile::{CallerSettings, ProfileResolver, ProfileSource, ResolvedProfile};
pub use rerank::{RerankChain, RerankOutcome, RerankTier};
pub use retrieve::{RetrieveMetadata, RetrieveRequest, RetrieveResponse};

use std::{pin::Pin, sync::Arc, time::Duration};

use serde_json::{Map, Value};

use graphrag_config::Config;
use graphrag_domain::{
	AuthorityTable, DictionaryExtractor, Entity, GraphView, RankedItem, SearchProfile,
};
use graphrag_providers::rerank::RerankScore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Arguments for one vector or keyword adapter call.
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
	pub text: &'a str,
	pub top_k: u32,
	pub min_score: f32,
	pub filters: &'a Map<String, Value>,
}

/// Vector or keyword search adapter. "No results" is `Ok(vec![])`, never an error.
pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, query: SearchQuery<'a>) -> BoxFuture<'a, Result<Vec<RankedItem>>>;
}

pub trait GraphBackend
where
	Self: Send + Sync,
{
	/// Node ids whose normalized name equals `name`, optionally narrowed to `node_type`.
	fn find_nodes<'a>(
		&'a self,
		name: &'a str,
		node_type: Option<&'a str>,
		view: &'a GraphView,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<String>>>;

	/// Breadth-first expansion from `seeds`. Every returned item carries its evidence path.
	fn traverse<'a>(
		&'a self,
		seeds: &'a [String],
		view: &'a GraphView,
		top_k: u32,
		filters: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Vec<RankedItem>>>;
}

pub trait ProfileStore
where
	Self: Send + Sync,
{
	fn profile<'a>(&'a self, profile_id: &'a str) -> BoxFuture<'a, Result<Option<SearchProfile>>>;

	fn caller<'a>(&'a self, caller_id: &'a str) -> BoxFuture<'a, Result<Option<CallerSettings>>>;
}

pub trait AuthorityStore
where
	Self: Send + Sync,
{
	fn load(&self) -> BoxFuture<'_, Result<AuthorityWeights>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		model: Option<&'a str>,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<RerankScore>>>;
}

/// In-process reranker. One score per document, same order.
pub trait LocalReranker
where
	Self: Send + Sync,
{
	fn score(&self, query: &str, docs: &[String]) -> Result<Vec<f64>>;
}

pub trait EntityModel
where
	Self: Send + Sync,
{
	fn extract<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<Entity>>>;
}

/// Search adapters per modality. A `None` adapter reports its modality as unavailable.
#[derive(Clone, Default)]
pub struct Backends {
	pub vector: Option<Arc<dyn SearchBackend>>,
	pub keyword: Option<Arc<dyn SearchBackend>>,
	pub graph: Option<Arc<dyn GraphBackend>>,
}

#[derive(Clone, Default)]
pub struct Stores {
	pub profiles: Option<Arc<dyn ProfileStore>>,
	pub authority: Option<Arc<dyn AuthorityStore>>,
}

#[derive(Clone, Default)]
pub struct Providers {
	pub rerank: Option<Arc<dyn RerankProvider>>,
	pub local_rerank: Option<Arc<dyn LocalReranker>>,
	pub entity_model: Option<Arc<dyn EntityModel>>,
}

pub struct GraphRagService {
	pub cfg: Config,
	pub(crate) profiles: ProfileResolver,
	pub(crate) orchestrator: Orchestrator,
	pub(crate) reranker: RerankChain,
	pub(crate) authority: AuthorityCache,
}
impl GraphRagService {
	pub fn new(cfg: Config, backends: Backends, stores: Stores, providers: Providers) -> Result<Self> {
		let dictionary = DictionaryExtractor::with_terms(&cfg.entities.dictionary).map_err(|err| {
			Error::Config { message: format!("Entity dictionary is invalid: {err}") }
		})?;
		let entities = EntityResolver::new(providers.entity_model.clone(), dictionary);
		let orchestrator = Orchestrator::new(
			backends,
			Arc::new(entities),
			Duration::from_millis(cfg.search.modality_timeout_ms),
			cfg.search.graph.seeds_per_entity,
		);
		let profiles = ProfileResolver::new(
			stores.profiles,
			Duration::from_secs(cfg.profiles.cache_ttl_secs),
		);
		let authority = AuthorityCache::new(
			stores.authority,
			AuthorityTable::empty(
				f64::from(cfg.authority.default_source_weight),
				f64::from(cfg.authority.default_type_weight),
			),
		);
		let reranker = RerankChain::new(providers.rerank, providers.local_rerank);

		Ok(Self { cfg, profiles, orchestrator, reranker, authority })
	}

	/// Wires the Postgres, Qdrant, and HTTP adapters from configuration and loads the authority
	/// tables once.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let (backends, stores, providers) = backends::connect_defaults(&cfg).await?;
		let service = Self::new(cfg, backends, stores, providers)?;

		if let Err(err) = service.refresh_authority().await {
			tracing::warn!(error = %err, "Initial authority load failed. Using default weights.");
		}

		Ok(service)
	}

	pub async fn refresh_authority(&self) -> Result<AuthorityRefresh> {
		self.authority.refresh().await
	}

	pub async fn invalidate_profiles(&self) -> usize {
		self.profiles.invalidate().await
	}

	pub fn default_view(&self) -> GraphView {
		GraphView::unrestricted(
			self.cfg.search.graph.default_max_hops,
			self.cfg.search.graph.default_max_results,
		)
	}
}
