use serde_json::Value;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChunkHit {
	pub chunk_id: String,
	pub text: String,
	pub source_id: String,
	pub document_type: Option<String>,
	pub title: Option<String>,
	pub uri: Option<String>,
	pub metadata: Value,
	pub rank: f32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GraphNodeRow {
	pub node_id: String,
	pub name: String,
	pub node_type: String,
	pub chunk_id: Option<String>,
	pub content: String,
	pub source_id: String,
	pub document_type: Option<String>,
	pub title: Option<String>,
	pub uri: Option<String>,
	pub properties: Value,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GraphEdgeRow {
	pub edge_id: String,
	pub from_node: String,
	pub to_node: String,
	pub edge_type: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchProfileRow {
	pub profile_id: String,
	pub vector_enabled: bool,
	pub keyword_enabled: bool,
	pub graph_enabled: bool,
	pub top_k: i32,
	pub similarity_threshold: f32,
	pub context_token_budget: i32,
	pub rerank_enabled: bool,
	pub rerank_model_id: Option<String>,
	pub vector_weight: f64,
	pub keyword_weight: f64,
	pub graph_weight: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CallerProfileRow {
	pub caller_id: String,
	pub default_profile_id: Option<String>,
	pub overrides: Value,
	pub view_node_types: Option<Vec<String>>,
	pub view_edge_types: Option<Vec<String>>,
	pub view_max_hops: Option<i32>,
	pub view_max_results: Option<i32>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WeightRow {
	pub key: String,
	pub weight: f64,
}
