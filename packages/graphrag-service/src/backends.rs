//! Default adapters: Qdrant for vectors, Postgres for keyword, graph, profiles, and authority, and
//! HTTP providers for embedding, rerank, and entity extraction.

use std::{collections::HashMap, path::Path, sync::Arc};

use qdrant_client::qdrant::ScoredPoint;
use reqwest::Client;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::{
	AuthorityStore, AuthorityWeights, Backends, BoxFuture, CallerSettings, EmbeddingProvider,
	EntityModel, GraphBackend, LocalReranker, ProfileStore, Providers, RerankProvider, Result,
	SearchBackend, SearchQuery, Stores,
};
use graphrag_config::Config;
use graphrag_domain::{
	Entity, GraphEdge, GraphView, Modality, ModalityMap, ProfileOverrides, RankedItem,
	SearchProfile, SourceRef, Traversal,
};
use graphrag_providers::{local::LexicalCrossScorer, rerank::RerankScore};
use graphrag_storage::{
	authority,
	db::Db,
	graph,
	keyword::{self, KeywordQuery},
	models::{CallerProfileRow, ChunkHit, GraphNodeRow, SearchProfileRow},
	profiles,
	qdrant::{self, QdrantStore},
};

/// Payload keys lifted into `RankedItem` fields instead of metadata.
const KNOWN_PAYLOAD_KEYS: [&str; 6] =
	["chunk_id", "text", "source_id", "document_type", "title", "uri"];
const UNKNOWN_SOURCE: &str = "unknown";
/// Edges fetched per hop, as a multiple of the result ceiling.
const EDGES_PER_RESULT: u32 = 8;

pub struct QdrantVectorBackend {
	pub store: Arc<QdrantStore>,
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl SearchBackend for QdrantVectorBackend {
	fn search<'a>(&'a self, query: SearchQuery<'a>) -> BoxFuture<'a, Result<Vec<RankedItem>>> {
		Box::pin(async move {
			let vector = self.embedding.embed(query.text).await?;
			let points =
				self.store.nearest(vector, query.top_k, query.min_score, query.filters).await?;

			Ok(points.iter().map(point_item).collect())
		})
	}
}

fn point_item(point: &ScoredPoint) -> RankedItem {
	let id = qdrant::payload_string(&point.payload, "chunk_id")
		.or_else(|| point.id.as_ref().and_then(qdrant::point_id_string))
		.unwrap_or_default();
	let source = SourceRef {
		source_id: qdrant::payload_string(&point.payload, "source_id")
			.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
		document_type: qdrant::payload_string(&point.payload, "document_type"),
		title: qdrant::payload_string(&point.payload, "title"),
		uri: qdrant::payload_string(&point.payload, "uri"),
	};
	let text = qdrant::payload_string(&point.payload, "text").unwrap_or_default();
	let mut item = RankedItem::new(id, Modality::Vector, point.score, text, source);

	item.metadata = qdrant::payload_json(&point.payload, &KNOWN_PAYLOAD_KEYS);

	item
}

pub struct PgKeywordBackend {
	pub pool: PgPool,
	pub text_search_config: String,
}
impl SearchBackend for PgKeywordBackend {
	fn search<'a>(&'a self, query: SearchQuery<'a>) -> BoxFuture<'a, Result<Vec<RankedItem>>> {
		Box::pin(async move {
			let hits = keyword::search_chunks(&self.pool, &KeywordQuery {
				text_search_config: &self.text_search_config,
				query: query.text,
				limit: query.top_k,
				min_rank: query.min_score,
				filter: query.filters,
			})
			.await?;

			Ok(hits.into_iter().map(chunk_item).collect())
		})
	}
}

fn chunk_item(hit: ChunkHit) -> RankedItem {
	let source = SourceRef {
		source_id: hit.source_id,
		document_type: hit.document_type,
		title: hit.title,
		uri: hit.uri,
	};
	let mut item = RankedItem::new(hit.chunk_id, Modality::Keyword, hit.rank, hit.text, source);

	if let Value::Object(metadata) = hit.metadata {
		item.metadata = metadata;
	}

	item
}

pub struct PgGraphBackend {
	pub pool: PgPool,
}
impl GraphBackend for PgGraphBackend {
	fn find_nodes<'a>(
		&'a self,
		name: &'a str,
		node_type: Option<&'a str>,
		view: &'a GraphView,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			Ok(graph::find_node_ids(&self.pool, name, node_type, &view.node_types, limit).await?)
		})
	}

	fn traverse<'a>(
		&'a self,
		seeds: &'a [String],
		view: &'a GraphView,
		top_k: u32,
		filters: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Vec<RankedItem>>> {
		Box::pin(async move {
			let limit = view.max_results.min(top_k);
			let mut traversal = Traversal::new(seeds.iter().cloned());

			while traversal.depth() < view.max_hops
				&& !traversal.is_exhausted()
				&& traversal.len() < limit as usize
			{
				let rows = graph::list_edges_touching(
					&self.pool,
					&traversal.frontier(),
					&view.edge_types,
					&view.node_types,
					limit.saturating_mul(EDGES_PER_RESULT),
				)
				.await?;
				let edges: Vec<GraphEdge> = rows
					.into_iter()
					.map(|row| GraphEdge {
						edge_id: row.edge_id,
						from: row.from_node,
						to: row.to_node,
						edge_type: row.edge_type,
					})
					.collect();

				traversal.advance(&edges, limit as usize);
			}

			let paths = traversal.paths();
			let node_ids: Vec<String> = paths.iter().map(|(node_id, _)| node_id.clone()).collect();
			let mut nodes: HashMap<String, GraphNodeRow> =
				graph::list_nodes(&self.pool, &node_ids, filters)
					.await?
					.into_iter()
					.map(|node| (node.node_id.clone(), node))
					.collect();
			let items = paths
				.into_iter()
				.filter_map(|(node_id, path)| {
					let node = nodes.remove(&node_id)?;

					// Seed lookup already applied the view, but neighbours may not match it.
					view.allows_node_type(&node.node_type).then(|| node_item(node, path))
				})
				.take(limit as usize)
				.collect();

			Ok(items)
		})
	}
}

fn node_item(node: GraphNodeRow, path: graphrag_domain::EvidencePath) -> RankedItem {
	let id = node.chunk_id.clone().unwrap_or_else(|| format!("node:{}", node.node_id));
	let source = SourceRef {
		source_id: node.source_id,
		document_type: node.document_type,
		title: node.title,
		uri: node.uri,
	};
	let mut item = RankedItem::new(id, Modality::Graph, path.score as f32, node.content, source);
	let mut metadata = match node.properties {
		Value::Object(properties) => properties,
		_ => Map::new(),
	};

	metadata.insert("node_id".to_string(), Value::String(node.node_id));
	metadata.insert("name".to_string(), Value::String(node.name));
	metadata.insert("node_type".to_string(), Value::String(node.node_type));

	item.metadata = metadata;
	item.evidence = Some(path);

	item
}

pub struct PgProfileStore {
	pub pool: PgPool,
	/// View fields a caller leaves unset fall back to these.
	pub default_max_hops: u32,
	pub default_max_results: u32,
}
impl ProfileStore for PgProfileStore {
	fn profile<'a>(&'a self, profile_id: &'a str) -> BoxFuture<'a, Result<Option<SearchProfile>>> {
		Box::pin(async move {
			Ok(profiles::get_search_profile(&self.pool, profile_id).await?.map(profile_from_row))
		})
	}

	fn caller<'a>(&'a self, caller_id: &'a str) -> BoxFuture<'a, Result<Option<CallerSettings>>> {
		Box::pin(async move {
			let row = profiles::get_caller_profile(&self.pool, caller_id).await?;

			Ok(row.map(|row| {
				caller_from_row(row, self.default_max_hops, self.default_max_results)
			}))
		})
	}
}

fn caller_from_row(
	row: CallerProfileRow,
	default_max_hops: u32,
	default_max_results: u32,
) -> CallerSettings {
	let overrides = if row.overrides.is_null() {
		ProfileOverrides::default()
	} else {
		serde_json::from_value(row.overrides).unwrap_or_else(|err| {
			tracing::warn!(
				caller_id = %row.caller_id,
				error = %err,
				"Caller overrides are malformed. Ignoring them."
			);

			ProfileOverrides::default()
		})
	};
	let has_view = row.view_node_types.is_some()
		|| row.view_edge_types.is_some()
		|| row.view_max_hops.is_some()
		|| row.view_max_results.is_some();
	let view = has_view.then(|| GraphView {
		node_types: row.view_node_types.unwrap_or_default(),
		edge_types: row.view_edge_types.unwrap_or_default(),
		max_hops: row
			.view_max_hops
			.and_then(|hops| u32::try_from(hops).ok())
			.unwrap_or(default_max_hops),
		max_results: row
			.view_max_results
			.and_then(|results| u32::try_from(results).ok())
			.unwrap_or(default_max_results),
	});

	CallerSettings { default_profile_id: row.default_profile_id, overrides, view }
}

/// Negative counts become zero so validation rejects the profile.
fn profile_from_row(row: SearchProfileRow) -> SearchProfile {
	SearchProfile {
		profile_id: row.profile_id,
		enabled: ModalityMap::new(row.vector_enabled, row.keyword_enabled, row.graph_enabled),
		top_k: u32::try_from(row.top_k).unwrap_or(0),
		similarity_threshold: row.similarity_threshold,
		context_token_budget: u32::try_from(row.context_token_budget).unwrap_or(0),
		rerank_enabled: row.rerank_enabled,
		rerank_model_id: row.rerank_model_id,
		weights: ModalityMap::new(row.vector_weight, row.keyword_weight, row.graph_weight),
	}
}

pub struct PgAuthorityStore {
	pub pool: PgPool,
}
impl AuthorityStore for PgAuthorityStore {
	fn load(&self) -> BoxFuture<'_, Result<AuthorityWeights>> {
		Box::pin(async move {
			let sources = authority::list_source_weights(&self.pool).await?;
			let document_types = authority::list_document_type_weights(&self.pool).await?;

			Ok(AuthorityWeights {
				sources: sources.into_iter().map(|row| (row.key, row.weight)).collect(),
				document_types: document_types.into_iter().map(|row| (row.key, row.weight)).collect(),
			})
		})
	}
}

/// Embedding, rerank, and entity-model calls over one shared HTTP client.
pub struct HttpProviders {
	pub client: Client,
	pub cfg: graphrag_config::Providers,
}
impl EmbeddingProvider for HttpProviders {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			Ok(graphrag_providers::embedding::embed_one(&self.client, &self.cfg.embedding, text)
				.await?)
		})
	}
}
impl RerankProvider for HttpProviders {
	fn rerank<'a>(
		&'a self,
		model: Option<&'a str>,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<RerankScore>>> {
		Box::pin(async move {
			Ok(graphrag_providers::rerank::rerank(&self.client, &self.cfg.rerank, model, query, docs)
				.await?)
		})
	}
}
impl EntityModel for HttpProviders {
	fn extract<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<Entity>>> {
		Box::pin(async move {
			let Some(cfg) = self.cfg.entity_extractor.as_ref() else {
				return Err(crate::Error::Provider {
					message: "No entity extractor is configured.".to_string(),
				});
			};

			Ok(graphrag_providers::extractor::extract_entities(&self.client, cfg, text).await?)
		})
	}
}

impl LocalReranker for LexicalCrossScorer {
	fn score(&self, query: &str, docs: &[String]) -> Result<Vec<f64>> {
		Ok(LexicalCrossScorer::score(self, query, docs)?)
	}
}

/// `None` when the local tier is disabled or its tokenizer cannot be loaded.
pub fn load_local_reranker(cfg: &Config) -> Option<Arc<dyn LocalReranker>> {
	if !cfg.rerank.local.enabled {
		return None;
	}

	let path = cfg.rerank.local.tokenizer_path.as_deref()?;

	match LexicalCrossScorer::from_file(Path::new(path)) {
		Ok(scorer) => Some(Arc::new(scorer)),
		Err(err) => {
			tracing::warn!(path, error = %err, "Local reranker is unavailable.");

			None
		},
	}
}

/// Connects Postgres and Qdrant, bootstraps the schema, and builds every default adapter.
pub async fn connect_defaults(cfg: &Config) -> Result<(Backends, Stores, Providers)> {
	let db = Db::connect(&cfg.storage.postgres).await?;

	db.ensure_schema().await?;

	let store = Arc::new(QdrantStore::new(&cfg.storage.qdrant)?);
	let http = Arc::new(HttpProviders {
		client: graphrag_providers::http_client()?,
		cfg: cfg.providers.clone(),
	});
	let backends = Backends {
		vector: Some(Arc::new(QdrantVectorBackend { store, embedding: http.clone() })),
		keyword: Some(Arc::new(PgKeywordBackend {
			pool: db.pool.clone(),
			text_search_config: cfg.search.keyword.text_search_config.clone(),
		})),
		graph: Some(Arc::new(PgGraphBackend { pool: db.pool.clone() })),
	};
	let stores = Stores {
		profiles: Some(Arc::new(PgProfileStore {
			pool: db.pool.clone(),
			default_max_hops: cfg.search.graph.default_max_hops,
			default_max_results: cfg.search.graph.default_max_results,
		})),
		authority: Some(Arc::new(PgAuthorityStore { pool: db.pool.clone() })),
	};
	let entity_model: Option<Arc<dyn EntityModel>> =
		cfg.providers.entity_extractor.is_some().then(|| http.clone() as Arc<dyn EntityModel>);
	let providers = Providers {
		rerank: Some(http),
		local_rerank: load_local_reranker(cfg),
		entity_model,
	};

	tracing::info!(
		collection = %cfg.storage.qdrant.collection,
		entity_model = providers.entity_model.is_some(),
		local_rerank = providers.local_rerank.is_some(),
		"Backends connected."
	);

	Ok((backends, stores, providers))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn profile_row() -> SearchProfileRow {
		SearchProfileRow {
			profile_id: "analyst".to_string(),
			vector_enabled: true,
			keyword_enabled: true,
			graph_enabled: false,
			top_k: 20,
			similarity_threshold: 0.5,
			context_token_budget: 6_000,
			rerank_enabled: true,
			rerank_model_id: None,
			vector_weight: 0.6,
			keyword_weight: 0.4,
			graph_weight: 0.0,
		}
	}

	#[test]
	fn negative_counts_fail_validation() {
		let profile = profile_from_row(profile_row());

		assert!(profile.validate().is_ok());

		let broken = profile_from_row(SearchProfileRow { top_k: -1, ..profile_row() });

		assert_eq!(broken.top_k, 0);
		assert!(broken.validate().is_err());
	}

	#[test]
	fn graph_nodes_without_chunks_get_node_ids() {
		let node = GraphNodeRow {
			node_id: "n1".to_string(),
			name: "Keytruda".to_string(),
			node_type: "drug".to_string(),
			chunk_id: None,
			content: "Keytruda is a PD-1 inhibitor.".to_string(),
			source_id: "kb".to_string(),
			document_type: None,
			title: None,
			uri: None,
			properties: serde_json::json!({ "approved": true }),
		};
		let path = graphrag_domain::EvidencePath::new(vec!["n1".to_string()], Vec::new());
		let item = node_item(node, path);

		assert_eq!(item.id, "node:n1");
		assert_eq!(item.score, 1.0);
		assert_eq!(item.metadata.get("approved"), Some(&Value::Bool(true)));
		assert_eq!(item.metadata.get("node_type"), Some(&Value::from("drug")));
		assert!(item.evidence.is_some());
	}

	#[test]
	fn caller_rows_fill_missing_view_fields() {
		let row = CallerProfileRow {
			caller_id: "agent".to_string(),
			default_profile_id: None,
			overrides: serde_json::json!({ "top_k": "many" }),
			view_node_types: Some(vec!["drug".to_string()]),
			view_edge_types: None,
			view_max_hops: None,
			view_max_results: Some(5),
		};
		let settings = caller_from_row(row, 2, 50);
		let view = settings.view.expect("view must be present");

		assert!(settings.overrides.is_empty());
		assert_eq!(view.max_hops, 2);
		assert_eq!(view.max_results, 5);
		assert_eq!(view.node_types, vec!["drug".to_string()]);
	}
}
