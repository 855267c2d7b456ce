use serde_json::{Map, Value};
use sqlx::PgExecutor;

use crate::{Error, Result, models::ChunkHit};

pub struct KeywordQuery<'a> {
	pub text_search_config: &'a str,
	pub query: &'a str,
	pub limit: u32,
	pub min_rank: f32,
	pub filter: &'a Map<String, Value>,
}

/// Full-text search over `chunks`, best `ts_rank_cd` first. `filter` must be contained in the
/// chunk metadata.
pub async fn search_chunks(
	executor: impl PgExecutor<'_>,
	query: &KeywordQuery<'_>,
) -> Result<Vec<ChunkHit>> {
	if query.query.trim().is_empty() {
		return Err(Error::InvalidArgument("keyword query must not be empty".to_string()));
	}
	if query.limit == 0 {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, ChunkHit>(
		"\
SELECT
	c.chunk_id,
	c.text,
	c.source_id,
	c.document_type,
	c.title,
	c.uri,
	c.metadata,
	ts_rank_cd(c.tsv, q.query)::real AS rank
FROM chunks c
CROSS JOIN websearch_to_tsquery($1::regconfig, $2) AS q(query)
WHERE c.tsv @@ q.query
	AND c.metadata @> $3::jsonb
	AND ts_rank_cd(c.tsv, q.query) >= $4
ORDER BY rank DESC, c.chunk_id
LIMIT $5",
	)
	.bind(query.text_search_config)
	.bind(query.query)
	.bind(Value::Object(query.filter.clone()))
	.bind(query.min_rank)
	.bind(i64::from(query.limit))
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
