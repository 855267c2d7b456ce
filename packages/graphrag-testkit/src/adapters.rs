//! In-memory adapters for driving the broker without Postgres, Qdrant, or HTTP providers.

use std::{
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value};

use graphrag_domain::{
	Entity, EvidencePath, GraphView, Modality, RankedItem, SearchProfile, SourceRef,
};
use graphrag_providers::rerank::RerankScore;
use graphrag_service::{
	AuthorityStore, AuthorityWeights, BoxFuture, CallerSettings, EntityModel, Error, GraphBackend,
	LocalReranker, ProfileStore, RerankProvider, Result, SearchBackend, SearchQuery,
};

pub fn item(id: &str, modality: Modality, text: &str, source_id: &str) -> RankedItem {
	let source = SourceRef { source_id: source_id.to_string(), ..Default::default() };

	RankedItem::new(id, modality, 1.0, text, source)
}

/// Arguments of the most recent adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
	pub text: String,
	pub top_k: u32,
	pub min_score: f32,
	pub filters: Map<String, Value>,
}
impl RecordedQuery {
	fn from_query(query: &SearchQuery<'_>) -> Self {
		Self {
			text: query.text.to_string(),
			top_k: query.top_k,
			min_score: query.min_score,
			filters: query.filters.clone(),
		}
	}
}

/// Returns fixed items, truncated to `top_k`, and records every call.
#[derive(Default)]
pub struct StaticBackend {
	items: Vec<RankedItem>,
	calls: AtomicUsize,
	last: Mutex<Option<RecordedQuery>>,
}
impl StaticBackend {
	pub fn new(items: Vec<RankedItem>) -> Self {
		Self { items, ..Default::default() }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn last_query(&self) -> Option<RecordedQuery> {
		self.last.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl SearchBackend for StaticBackend {
	fn search<'a>(&'a self, query: SearchQuery<'a>) -> BoxFuture<'a, Result<Vec<RankedItem>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		*self.last.lock().unwrap_or_else(|err| err.into_inner()) =
			Some(RecordedQuery::from_query(&query));

		let items = self.items.iter().take(query.top_k as usize).cloned().collect();

		Box::pin(async move { Ok(items) })
	}
}

pub struct FailingBackend;
impl SearchBackend for FailingBackend {
	fn search<'a>(&'a self, _: SearchQuery<'a>) -> BoxFuture<'a, Result<Vec<RankedItem>>> {
		Box::pin(async { Err(Error::Backend { message: "connection refused".to_string() }) })
	}
}

pub struct PanickingBackend;
impl SearchBackend for PanickingBackend {
	fn search<'a>(&'a self, _: SearchQuery<'a>) -> BoxFuture<'a, Result<Vec<RankedItem>>> {
		Box::pin(async { explode() })
	}
}

fn explode() -> Result<Vec<RankedItem>> {
	panic!("adapter bug")
}

/// Answers after `delay`. Records whether the call ran to completion.
pub struct SlowBackend {
	pub delay: Duration,
	pub items: Vec<RankedItem>,
	finished: AtomicBool,
}
impl SlowBackend {
	pub fn new(delay: Duration, items: Vec<RankedItem>) -> Self {
		Self { delay, items, finished: AtomicBool::new(false) }
	}

	pub fn finished(&self) -> bool {
		self.finished.load(Ordering::SeqCst)
	}
}
impl SearchBackend for SlowBackend {
	fn search<'a>(&'a self, _: SearchQuery<'a>) -> BoxFuture<'a, Result<Vec<RankedItem>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.finished.store(true, Ordering::SeqCst);

			Ok(self.items.clone())
		})
	}
}

/// Graph with named nodes for seed lookup and a fixed traversal result.
#[derive(Default)]
pub struct StaticGraph {
	/// Normalized name to `(node_id, node_type)`.
	nodes: HashMap<String, Vec<(String, String)>>,
	results: Vec<RankedItem>,
	traversals: AtomicUsize,
	seeds: Mutex<Vec<String>>,
}
impl StaticGraph {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_node(mut self, name_norm: &str, node_id: &str, node_type: &str) -> Self {
		self.nodes
			.entry(name_norm.to_string())
			.or_default()
			.push((node_id.to_string(), node_type.to_string()));

		self
	}

	/// Adds a traversal result reached through `path_nodes`, one edge per hop.
	pub fn with_result(mut self, id: &str, text: &str, path_nodes: &[&str]) -> Self {
		let nodes: Vec<String> = path_nodes.iter().map(|node| node.to_string()).collect();
		let edges = nodes.windows(2).map(|pair| format!("{}->{}", pair[0], pair[1])).collect();
		let path = EvidencePath::new(nodes, edges);
		let mut result = item(id, Modality::Graph, text, "kb");

		result.score = path.score as f32;
		result.evidence = Some(path);

		self.results.push(result);

		self
	}

	pub fn traversals(&self) -> usize {
		self.traversals.load(Ordering::SeqCst)
	}

	pub fn last_seeds(&self) -> Vec<String> {
		self.seeds.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl GraphBackend for StaticGraph {
	fn find_nodes<'a>(
		&'a self,
		name: &'a str,
		node_type: Option<&'a str>,
		view: &'a GraphView,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		let ids = self
			.nodes
			.get(name)
			.into_iter()
			.flatten()
			.filter(|(_, kind)| node_type.is_none_or(|wanted| kind.as_str() == wanted))
			.filter(|(_, kind)| view.allows_node_type(kind))
			.take(limit as usize)
			.map(|(id, _)| id.clone())
			.collect();

		Box::pin(async move { Ok(ids) })
	}

	fn traverse<'a>(
		&'a self,
		seeds: &'a [String],
		view: &'a GraphView,
		top_k: u32,
		_: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Vec<RankedItem>>> {
		self.traversals.fetch_add(1, Ordering::SeqCst);
		*self.seeds.lock().unwrap_or_else(|err| err.into_inner()) = seeds.to_vec();

		let limit = view.max_results.min(top_k) as usize;
		let items = self
			.results
			.iter()
			.filter(|item| {
				item.evidence.as_ref().is_none_or(|path| path.hop_count() as u32 <= view.max_hops)
			})
			.take(limit)
			.cloned()
			.collect();

		Box::pin(async move { Ok(items) })
	}
}

#[derive(Default)]
pub struct MemoryProfileStore {
	profiles: Mutex<HashMap<String, SearchProfile>>,
	callers: Mutex<HashMap<String, CallerSettings>>,
	down: AtomicBool,
	caller_lookups: AtomicUsize,
}
impl MemoryProfileStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_profile(&self, profile: SearchProfile) {
		self.profiles
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.insert(profile.profile_id.clone(), profile);
	}

	pub fn insert_caller(&self, caller_id: &str, settings: CallerSettings) {
		self.callers
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.insert(caller_id.to_string(), settings);
	}

	pub fn set_down(&self, down: bool) {
		self.down.store(down, Ordering::SeqCst);
	}

	pub fn caller_lookups(&self) -> usize {
		self.caller_lookups.load(Ordering::SeqCst)
	}

	fn check(&self) -> Result<()> {
		if self.down.load(Ordering::SeqCst) {
			return Err(Error::Storage { message: "profile store is down".to_string() });
		}

		Ok(())
	}
}
impl ProfileStore for MemoryProfileStore {
	fn profile<'a>(&'a self, profile_id: &'a str) -> BoxFuture<'a, Result<Option<SearchProfile>>> {
		let result = self.check().map(|()| {
			self.profiles.lock().unwrap_or_else(|err| err.into_inner()).get(profile_id).cloned()
		});

		Box::pin(async move { result })
	}

	fn caller<'a>(&'a self, caller_id: &'a str) -> BoxFuture<'a, Result<Option<CallerSettings>>> {
		self.caller_lookups.fetch_add(1, Ordering::SeqCst);

		let result = self.check().map(|()| {
			self.callers.lock().unwrap_or_else(|err| err.into_inner()).get(caller_id).cloned()
		});

		Box::pin(async move { result })
	}
}

/// Profile store whose lookups never answer within `delay`.
pub struct HangingProfileStore {
	pub delay: Duration,
}
impl ProfileStore for HangingProfileStore {
	fn profile<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<Option<SearchProfile>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			Ok(None)
		})
	}

	fn caller<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<Option<CallerSettings>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			Ok(None)
		})
	}
}

#[derive(Default)]
pub struct MemoryAuthorityStore {
	weights: Mutex<AuthorityWeights>,
}
impl MemoryAuthorityStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_source(&self, source_id: &str, weight: f64) {
		self.weights
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.sources
			.insert(source_id.to_string(), weight);
	}

	pub fn set_document_type(&self, document_type: &str, weight: f64) {
		self.weights
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.document_types
			.insert(document_type.to_string(), weight);
	}
}
impl AuthorityStore for MemoryAuthorityStore {
	fn load(&self) -> BoxFuture<'_, Result<AuthorityWeights>> {
		let weights = self.weights.lock().unwrap_or_else(|err| err.into_inner()).clone();

		Box::pin(async move { Ok(weights) })
	}
}

/// Scores documents by reversed input position: the last document scores highest.
fn reversed_scores(count: usize) -> Vec<f64> {
	(0..count).map(|idx| (idx + 1) as f64 / count as f64).collect()
}

/// Remote reranker double. `failing()` mimics a provider without credentials.
pub struct StaticReranker {
	fail: bool,
	calls: AtomicUsize,
	models: Mutex<Vec<Option<String>>>,
}
impl StaticReranker {
	pub fn reversing() -> Self {
		Self { fail: false, calls: AtomicUsize::new(0), models: Mutex::new(Vec::new()) }
	}

	pub fn failing() -> Self {
		Self { fail: true, ..Self::reversing() }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn models(&self) -> Vec<Option<String>> {
		self.models.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl RerankProvider for StaticReranker {
	fn rerank<'a>(
		&'a self,
		model: Option<&'a str>,
		_: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<RerankScore>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.models.lock().unwrap_or_else(|err| err.into_inner()).push(model.map(str::to_string));

		let result = if self.fail {
			Err(Error::Provider { message: "Provider rerank has no api_key.".to_string() })
		} else {
			Ok(reversed_scores(docs.len())
				.into_iter()
				.enumerate()
				.map(|(index, score)| RerankScore { index, score })
				.collect())
		};

		Box::pin(async move { result })
	}
}

/// Local reranker double with the same scoring as [`StaticReranker::reversing`].
pub struct StaticLocalReranker {
	pub fail: bool,
}
impl LocalReranker for StaticLocalReranker {
	fn score(&self, _: &str, docs: &[String]) -> Result<Vec<f64>> {
		if self.fail {
			return Err(Error::Provider { message: "tokenizer missing".to_string() });
		}

		Ok(reversed_scores(docs.len()))
	}
}

/// Entity model double. `None` entities mean the model is down.
pub struct StaticEntityModel {
	pub entities: Option<Vec<Entity>>,
}
impl EntityModel for StaticEntityModel {
	fn extract<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<Vec<Entity>>> {
		let result = self.entities.clone().ok_or_else(|| Error::Provider {
			message: "entity model unavailable".to_string(),
		});

		Box::pin(async move { result })
	}
}
