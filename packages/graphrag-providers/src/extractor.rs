use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};
use graphrag_config::ProviderConfig;
use graphrag_domain::{Entity, entity::MODEL_CONFIDENCE};

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
	entities: Vec<ExtractedEntity>,
}

#[derive(Debug, Deserialize)]
struct ExtractedEntity {
	text: String,
	#[serde(alias = "label")]
	r#type: String,
	start: usize,
	end: usize,
	#[serde(default)]
	score: Option<f32>,
}

/// Calls the named-entity recognition endpoint. Entities without a score get the model tier's
/// default confidence.
pub async fn extract_entities(
	client: &Client,
	cfg: &ProviderConfig,
	text: &str,
) -> Result<Vec<Entity>> {
	let body = serde_json::json!({ "model": cfg.model, "text": text });
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_extraction_response(json)
}

fn parse_extraction_response(json: Value) -> Result<Vec<Entity>> {
	let parsed: ExtractionResponse = serde_json::from_value(json)?;
	let mut out = Vec::with_capacity(parsed.entities.len());

	for entity in parsed.entities {
		if entity.end < entity.start {
			return Err(Error::InvalidResponse {
				message: format!("Entity span {}..{} is inverted.", entity.start, entity.end),
			});
		}

		let text = entity.text.trim();
		let entity_type = entity.r#type.trim();

		if text.is_empty() || entity_type.is_empty() {
			continue;
		}

		out.push(Entity {
			text: text.to_string(),
			entity_type: entity_type.to_lowercase(),
			start: entity.start,
			end: entity.end,
			confidence: entity.score.filter(|score| score.is_finite()).unwrap_or(MODEL_CONFIDENCE),
		});
	}

	Ok(out)
}
