use serde_json::{Map, Value};
use sqlx::PgExecutor;

use crate::{
	Result,
	models::{GraphEdgeRow, GraphNodeRow},
};

/// Seed lookup by normalized name. `node_type` narrows to one type; `allowed_types` (empty means
/// any) applies the caller's view.
pub async fn find_node_ids(
	executor: impl PgExecutor<'_>,
	name_norm: &str,
	node_type: Option<&str>,
	allowed_types: &[String],
	limit: u32,
) -> Result<Vec<String>> {
	if limit == 0 {
		return Ok(Vec::new());
	}

	let rows: Vec<(String,)> = sqlx::query_as(
		"\
SELECT node_id
FROM graph_nodes
WHERE name_norm = $1
	AND ($2::text IS NULL OR node_type = $2)
	AND (cardinality($3::text[]) = 0 OR node_type = ANY($3::text[]))
ORDER BY node_id
LIMIT $4",
	)
	.bind(name_norm)
	.bind(node_type)
	.bind(allowed_types)
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows.into_iter().map(|(node_id,)| node_id).collect())
}

/// Edges with either endpoint in `frontier`, both endpoints within `node_types` and the edge
/// within `edge_types`. Empty type lists mean any type.
pub async fn list_edges_touching(
	executor: impl PgExecutor<'_>,
	frontier: &[String],
	edge_types: &[String],
	node_types: &[String],
	limit: u32,
) -> Result<Vec<GraphEdgeRow>> {
	if frontier.is_empty() || limit == 0 {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, GraphEdgeRow>(
		"\
SELECT
	e.edge_id,
	e.from_node,
	e.to_node,
	e.edge_type
FROM graph_edges e
JOIN graph_nodes f ON f.node_id = e.from_node
JOIN graph_nodes t ON t.node_id = e.to_node
WHERE (e.from_node = ANY($1::text[]) OR e.to_node = ANY($1::text[]))
	AND (cardinality($2::text[]) = 0 OR e.edge_type = ANY($2::text[]))
	AND (
		cardinality($3::text[]) = 0
		OR (f.node_type = ANY($3::text[]) AND t.node_type = ANY($3::text[]))
	)
ORDER BY e.edge_id
LIMIT $4",
	)
	.bind(frontier)
	.bind(edge_types)
	.bind(node_types)
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Nodes by id whose properties contain `filter`. Row order is unspecified.
pub async fn list_nodes(
	executor: impl PgExecutor<'_>,
	node_ids: &[String],
	filter: &Map<String, Value>,
) -> Result<Vec<GraphNodeRow>> {
	if node_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, GraphNodeRow>(
		"\
SELECT
	node_id,
	name,
	node_type,
	chunk_id,
	content,
	source_id,
	document_type,
	title,
	uri,
	properties
FROM graph_nodes
WHERE node_id = ANY($1::text[])
	AND properties @> $2::jsonb",
	)
	.bind(node_ids)
	.bind(Value::Object(filter.clone()))
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
