use sqlx::PgExecutor;

use crate::{Result, models::WeightRow};

pub async fn list_source_weights(executor: impl PgExecutor<'_>) -> Result<Vec<WeightRow>> {
	let rows = sqlx::query_as::<_, WeightRow>(
		"\
SELECT source_id AS key, weight
FROM source_weights
ORDER BY source_id",
	)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn list_document_type_weights(executor: impl PgExecutor<'_>) -> Result<Vec<WeightRow>> {
	let rows = sqlx::query_as::<_, WeightRow>(
		"\
SELECT document_type AS key, weight
FROM document_type_weights
ORDER BY document_type",
	)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn upsert_source_weight(
	executor: impl PgExecutor<'_>,
	source_id: &str,
	weight: f64,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO source_weights (source_id, weight)
VALUES ($1, $2)
ON CONFLICT (source_id) DO UPDATE SET weight = EXCLUDED.weight",
	)
	.bind(source_id)
	.bind(weight)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn upsert_document_type_weight(
	executor: impl PgExecutor<'_>,
	document_type: &str,
	weight: f64,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO document_type_weights (document_type, weight)
VALUES ($1, $2)
ON CONFLICT (document_type) DO UPDATE SET weight = EXCLUDED.weight",
	)
	.bind(document_type)
	.bind(weight)
	.execute(executor)
	.await?;

	Ok(())
}
