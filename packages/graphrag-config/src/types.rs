use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub search: Search,
	#[serde(default)]
	pub rerank: Rerank,
	#[serde(default)]
	pub authority: Authority,
	#[serde(default)]
	pub context: Context,
	#[serde(default)]
	pub profiles: Profiles,
	#[serde(default)]
	pub entities: Entities,
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	/// Optional. Named dense vector inside the collection; unnamed vectors are used when absent.
	pub vector_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	/// Optional. Without it the entity extractor starts at the dictionary tier.
	pub entity_extractor: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// May be empty. An empty key means the provider has no credentials and is skipped.
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	pub request_timeout_ms: u64,
	pub modality_timeout_ms: u64,
	#[serde(default = "default_rrf_k")]
	pub rrf_k: u32,
	#[serde(default = "default_max_query_chars")]
	pub max_query_chars: u32,
	#[serde(default)]
	pub keyword: SearchKeyword,
	#[serde(default)]
	pub graph: SearchGraph,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchKeyword {
	/// Postgres text search configuration passed to `websearch_to_tsquery`.
	pub text_search_config: String,
}
impl Default for SearchKeyword {
	fn default() -> Self {
		Self { text_search_config: "english".to_string() }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchGraph {
	pub default_max_hops: u32,
	pub default_max_results: u32,
	pub seeds_per_entity: u32,
}
impl Default for SearchGraph {
	fn default() -> Self {
		Self { default_max_hops: 2, default_max_results: 50, seeds_per_entity: 3 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Rerank {
	pub local: RerankLocal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankLocal {
	pub enabled: bool,
	pub tokenizer_path: Option<String>,
}
impl Default for RerankLocal {
	fn default() -> Self {
		Self { enabled: true, tokenizer_path: None }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Authority {
	pub default_source_weight: f32,
	pub default_type_weight: f32,
	pub refresh_interval_secs: u64,
}
impl Default for Authority {
	fn default() -> Self {
		Self { default_source_weight: 0.75, default_type_weight: 0.70, refresh_interval_secs: 300 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Context {
	pub chars_per_token: u32,
}
impl Default for Context {
	fn default() -> Self {
		Self { chars_per_token: 4 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Profiles {
	pub cache_ttl_secs: u64,
}
impl Default for Profiles {
	fn default() -> Self {
		Self { cache_ttl_secs: 60 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Entities {
	/// Extra dictionary terms, keyed by surface text, valued by entity type.
	pub dictionary: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
}

fn default_rrf_k() -> u32 {
	60
}

fn default_max_query_chars() -> u32 {
	4_096
}
