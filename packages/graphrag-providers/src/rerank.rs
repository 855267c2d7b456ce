use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use graphrag_config::ProviderConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
	pub index: usize,
	pub score: f64,
}

/// Scores `docs` against `query` with a remote reranking API. Fails without credentials, and
/// fails when the response does not score every document exactly once.
pub async fn rerank(
	client: &Client,
	cfg: &ProviderConfig,
	model_override: Option<&str>,
	query: &str,
	docs: &[String],
) -> Result<Vec<RerankScore>> {
	if cfg.api_key.is_empty() {
		return Err(Error::MissingCredentials { provider_id: cfg.provider_id.clone() });
	}
	if docs.is_empty() {
		return Ok(Vec::new());
	}

	let model = model_override.unwrap_or(cfg.model.as_str());
	let body = serde_json::json!({
		"model": model,
		"query": query,
		"documents": docs,
		"top_n": docs.len(),
	});
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json, docs.len())
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<RerankScore>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| invalid("Rerank response is missing results array."))?;
	let mut seen = vec![false; doc_count];
	let mut scores = Vec::with_capacity(results.len());

	for item in results {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.ok_or_else(|| invalid("Rerank result missing index."))? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| invalid("Rerank result missing score."))?;
		let Some(slot) = seen.get_mut(index) else {
			return Err(invalid(format!("Rerank result index {index} is out of range.")));
		};

		if *slot {
			return Err(invalid(format!("Rerank result index {index} is repeated.")));
		}
		if !score.is_finite() {
			return Err(invalid("Rerank result score must be finite."));
		}

		*slot = true;

		scores.push(RerankScore { index, score });
	}

	if seen.iter().any(|covered| !covered) {
		return Err(invalid("Rerank response does not score every document."));
	}

	Ok(scores)
}

fn invalid(message: impl Into<String>) -> Error {
	Error::InvalidResponse { message: message.into() }
}
