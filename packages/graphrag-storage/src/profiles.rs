use sqlx::PgExecutor;

use crate::{
	Result,
	models::{CallerProfileRow, SearchProfileRow},
};

pub async fn get_search_profile(
	executor: impl PgExecutor<'_>,
	profile_id: &str,
) -> Result<Option<SearchProfileRow>> {
	let row = sqlx::query_as::<_, SearchProfileRow>(
		"\
SELECT
	profile_id,
	vector_enabled,
	keyword_enabled,
	graph_enabled,
	top_k,
	similarity_threshold,
	context_token_budget,
	rerank_enabled,
	rerank_model_id,
	vector_weight,
	keyword_weight,
	graph_weight
FROM search_profiles
WHERE profile_id = $1",
	)
	.bind(profile_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn get_caller_profile(
	executor: impl PgExecutor<'_>,
	caller_id: &str,
) -> Result<Option<CallerProfileRow>> {
	let row = sqlx::query_as::<_, CallerProfileRow>(
		"\
SELECT
	caller_id,
	default_profile_id,
	overrides,
	view_node_types,
	view_edge_types,
	view_max_hops,
	view_max_results
FROM caller_profiles
WHERE caller_id = $1",
	)
	.bind(caller_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn upsert_search_profile(
	executor: impl PgExecutor<'_>,
	row: &SearchProfileRow,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO search_profiles (
	profile_id,
	vector_enabled,
	keyword_enabled,
	graph_enabled,
	top_k,
	similarity_threshold,
	context_token_budget,
	rerank_enabled,
	rerank_model_id,
	vector_weight,
	keyword_weight,
	graph_weight
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
ON CONFLICT (profile_id) DO UPDATE SET
	vector_enabled = EXCLUDED.vector_enabled,
	keyword_enabled = EXCLUDED.keyword_enabled,
	graph_enabled = EXCLUDED.graph_enabled,
	top_k = EXCLUDED.top_k,
	similarity_threshold = EXCLUDED.similarity_threshold,
	context_token_budget = EXCLUDED.context_token_budget,
	rerank_enabled = EXCLUDED.rerank_enabled,
	rerank_model_id = EXCLUDED.rerank_model_id,
	vector_weight = EXCLUDED.vector_weight,
	keyword_weight = EXCLUDED.keyword_weight,
	graph_weight = EXCLUDED.graph_weight",
	)
	.bind(&row.profile_id)
	.bind(row.vector_enabled)
	.bind(row.keyword_enabled)
	.bind(row.graph_enabled)
	.bind(row.top_k)
	.bind(row.similarity_threshold)
	.bind(row.context_token_budget)
	.bind(row.rerank_enabled)
	.bind(row.rerank_model_id.as_deref())
	.bind(row.vector_weight)
	.bind(row.keyword_weight)
	.bind(row.graph_weight)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn upsert_caller_profile(
	executor: impl PgExecutor<'_>,
	row: &CallerProfileRow,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO caller_profiles (
	caller_id,
	default_profile_id,
	overrides,
	view_node_types,
	view_edge_types,
	view_max_hops,
	view_max_results
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (caller_id) DO UPDATE SET
	default_profile_id = EXCLUDED.default_profile_id,
	overrides = EXCLUDED.overrides,
	view_node_types = EXCLUDED.view_node_types,
	view_edge_types = EXCLUDED.view_edge_types,
	view_max_hops = EXCLUDED.view_max_hops,
	view_max_results = EXCLUDED.view_max_results",
	)
	.bind(&row.caller_id)
	.bind(row.default_profile_id.as_deref())
	.bind(&row.overrides)
	.bind(row.view_node_types.as_deref())
	.bind(row.view_edge_types.as_deref())
	.bind(row.view_max_hops)
	.bind(row.view_max_results)
	.execute(executor)
	.await?;

	Ok(())
}
