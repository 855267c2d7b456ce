use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
	Error, GraphRagService, ModalityFilters, ModalityReport, ProfileSource, RerankTier,
	ResolvedProfile, Result,
};
use graphrag_domain::{
	CitationEntry, ContextChunk, EvidencePath, ExtractionTier, FusionWeights, Modality,
	ModalityMap, PackingOptions, authority, evidence, fusion,
};

const MAX_CALLER_ID_CHARS: usize = 128;
const QUERY_HASH_CHARS: usize = 16;

pub const NO_MODALITIES_ENABLED: &str = "no_modalities_enabled";
pub const NO_BACKENDS_RESPONDED: &str = "no_backends_responded";

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveRequest {
	pub query: String,
	pub caller_id: String,
	#[serde(default)]
	pub profile_id: Option<String>,
	#[serde(default)]
	pub filters: ModalityFilters,
	#[serde(default = "default_true")]
	pub include_citations: bool,
	#[serde(default)]
	pub include_evidence: bool,
}
impl RetrieveRequest {
	pub fn new(query: impl Into<String>, caller_id: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			caller_id: caller_id.into(),
			profile_id: None,
			filters: ModalityFilters::default(),
			include_citations: true,
			include_evidence: false,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResponse {
	pub request_id: Uuid,
	pub chunks: Vec<ContextChunk>,
	pub citations: Vec<CitationEntry>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub evidence: Option<Vec<EvidencePath>>,
	pub metadata: RetrieveMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrieveMetadata {
	pub profile_id: String,
	pub profile_source: ProfileSource,
	pub profile_degraded: bool,
	pub modalities: ModalityMap<ModalityReport>,
	pub weights: FusionWeights,
	pub fused_count: usize,
	pub rerank_applied: bool,
	pub rerank_tier: RerankTier,
	pub entity_tier: Option<ExtractionTier>,
	pub seed_count: usize,
	pub used_tokens: u32,
	pub latency_ms: u64,
	pub no_backends_responded: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub diagnostic: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub retrieved_at: OffsetDateTime,
}

impl GraphRagService {
	/// Runs one retrieval. Only malformed requests fail; backend trouble shows up in
	/// `metadata` instead.
	pub async fn retrieve(&self, mut req: RetrieveRequest) -> Result<RetrieveResponse> {
		let started = Instant::now();
		let filters = std::mem::take(&mut req.filters);
		let query = validate_request(&req, self.cfg.search.max_query_chars)?;
		let request_id = Uuid::new_v4();
		let query_hash = query_hash(query);
		let deadline = started + Duration::from_millis(self.cfg.search.request_timeout_ms);
		// Profile store lookups share one modality budget.
		let profile_deadline =
			deadline.min(started + Duration::from_millis(self.cfg.search.modality_timeout_ms));
		let resolved = match tokio::time::timeout_at(
			profile_deadline,
			self.profiles.resolve(&req.caller_id, req.profile_id.as_deref()),
		)
		.await
		{
			Ok(resolved) => resolved,
			Err(_) => {
				tracing::warn!(
					%request_id,
					caller_id = %req.caller_id,
					"Profile resolution timed out. Using the global default."
				);

				ResolvedProfile::fallback()
			},
		};
		let profile = resolved.profile;
		let mut metadata = RetrieveMetadata {
			profile_id: profile.profile_id.clone(),
			profile_source: resolved.source,
			profile_degraded: resolved.degraded,
			modalities: ModalityMap::default(),
			weights: ModalityMap::default(),
			fused_count: 0,
			rerank_applied: false,
			rerank_tier: RerankTier::None,
			entity_tier: None,
			seed_count: 0,
			used_tokens: 0,
			latency_ms: 0,
			no_backends_responded: false,
			diagnostic: None,
			retrieved_at: OffsetDateTime::now_utc(),
		};

		if profile.enabled_modalities().is_empty() {
			tracing::warn!(%request_id, profile_id = %profile.profile_id, "Profile enables no modalities.");

			metadata.diagnostic = Some(NO_MODALITIES_ENABLED.to_string());
			metadata.latency_ms = elapsed_ms(started);

			return Ok(empty_response(request_id, req.include_evidence, metadata));
		}

		let view = resolved.view.unwrap_or_else(|| self.default_view());
		let output = self
			.orchestrator
			.search(Arc::from(query), &profile, view, filters, deadline)
			.await;

		metadata.modalities = output.reports;

		if let Some(seeding) = output.seeding.as_ref() {
			metadata.entity_tier = seeding.entity_tier;
			metadata.seed_count = seeding.seeds;
		}

		let enabled = profile.enabled_modalities();

		if enabled.iter().all(|modality| metadata.modalities.get(*modality).is_degraded()) {
			tracing::warn!(%request_id, %query_hash, "No backend responded.");

			metadata.no_backends_responded = true;
			metadata.diagnostic = Some(NO_BACKENDS_RESPONDED.to_string());
			metadata.latency_ms = elapsed_ms(started);

			return Ok(empty_response(request_id, req.include_evidence, metadata));
		}

		let active = ModalityMap::from_fn(|modality| !output.items.get(modality).is_empty());
		let weights = fusion::normalize_weights(&profile.weights, &active);
		let mut fused =
			fusion::fuse(&output.items, &weights, self.cfg.search.rrf_k, profile.top_k as usize);

		authority::apply_authority(&mut fused, &self.authority.table());

		metadata.weights = weights;
		metadata.fused_count = fused.len();

		let ranked = if profile.rerank_enabled {
			let outcome = self
				.reranker
				.rerank(
					query,
					fused,
					profile.top_k as usize,
					profile.rerank_model_id.as_deref(),
					deadline,
				)
				.await;

			metadata.rerank_applied = outcome.applied();
			metadata.rerank_tier = outcome.tier();

			outcome.into_items()
		} else {
			fused
		};
		let packed = evidence::build_context(&ranked, PackingOptions {
			max_tokens: profile.context_token_budget,
			max_chunks: profile.top_k as usize,
			include_citations: req.include_citations,
			chars_per_token: self.cfg.context.chars_per_token,
		});
		let paths = req
			.include_evidence
			.then(|| evidence::collect_evidence(output.items.get(Modality::Graph)));

		metadata.used_tokens = packed.used_tokens;
		metadata.latency_ms = elapsed_ms(started);

		tracing::info!(
			%request_id,
			%query_hash,
			profile_id = %metadata.profile_id,
			vector = output.items.vector.len(),
			keyword = output.items.keyword.len(),
			graph = output.items.graph.len(),
			fused = metadata.fused_count,
			chunks = packed.chunks.len(),
			rerank_tier = ?metadata.rerank_tier,
			latency_ms = metadata.latency_ms,
			"Retrieval completed."
		);

		Ok(RetrieveResponse {
			request_id,
			chunks: packed.chunks,
			citations: packed.citations,
			evidence: paths,
			metadata,
		})
	}
}

/// Returns the trimmed query.
fn validate_request(req: &RetrieveRequest, max_query_chars: u32) -> Result<&str> {
	let query = req.query.trim();

	if query.is_empty() {
		return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
	}
	if query.chars().count() > max_query_chars as usize {
		return Err(Error::InvalidRequest {
			message: format!("query must be at most {max_query_chars} characters."),
		});
	}
	if !is_valid_caller_id(&req.caller_id) {
		return Err(Error::InvalidRequest {
			message: format!(
				"caller_id must be 1-{MAX_CALLER_ID_CHARS} characters of letters, digits, '_', '.', ':', '@', or '-'."
			),
		});
	}
	if let Some(profile_id) = req.profile_id.as_deref()
		&& profile_id.trim().is_empty()
	{
		return Err(Error::InvalidRequest {
			message: "profile_id must be non-empty when provided.".to_string(),
		});
	}

	Ok(query)
}

pub fn is_valid_caller_id(caller_id: &str) -> bool {
	let len = caller_id.chars().count();

	(1..=MAX_CALLER_ID_CHARS).contains(&len)
		&& caller_id
			.chars()
			.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | ':' | '@' | '-'))
}

fn query_hash(query: &str) -> String {
	let mut hash = blake3::hash(query.as_bytes()).to_hex().to_string();

	hash.truncate(QUERY_HASH_CHARS);

	hash
}

fn empty_response(
	request_id: Uuid,
	include_evidence: bool,
	metadata: RetrieveMetadata,
) -> RetrieveResponse {
	RetrieveResponse {
		request_id,
		chunks: Vec::new(),
		citations: Vec::new(),
		evidence: include_evidence.then(Vec::new),
		metadata,
	}
}

fn elapsed_ms(started: Instant) -> u64 {
	u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn default_true() -> bool {
	true
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn caller_ids_are_checked_at_the_boundary() {
		assert!(is_valid_caller_id("agent-7"));
		assert!(is_valid_caller_id("team.ops:bot@eu_1"));
		assert!(!is_valid_caller_id(""));
		assert!(!is_valid_caller_id("agent 7"));
		assert!(!is_valid_caller_id("agent/7"));
		assert!(!is_valid_caller_id(&"a".repeat(129)));
		assert!(is_valid_caller_id(&"a".repeat(128)));
	}

	#[test]
	fn query_is_trimmed_and_bounded() {
		let req = RetrieveRequest::new("  keytruda  ", "agent");

		assert_eq!(validate_request(&req, 10).expect("valid request"), "keytruda");
		assert!(matches!(
			validate_request(&RetrieveRequest::new("   ", "agent"), 10),
			Err(Error::InvalidRequest { .. })
		));
		assert!(matches!(
			validate_request(&RetrieveRequest::new("a".repeat(11), "agent"), 10),
			Err(Error::InvalidRequest { .. })
		));
	}

	#[test]
	fn request_defaults_include_citations_only() {
		let req: RetrieveRequest =
			serde_json::from_value(serde_json::json!({ "query": "q", "caller_id": "c" }))
				.expect("deserialize failed");

		assert!(req.include_citations);
		assert!(!req.include_evidence);
		assert!(req.profile_id.is_none());
	}

	#[test]
	fn query_hash_is_a_short_stable_prefix() {
		let hash = query_hash("keytruda melanoma");

		assert_eq!(hash.len(), QUERY_HASH_CHARS);
		assert_eq!(hash, query_hash("keytruda melanoma"));
		assert_ne!(hash, query_hash("keytruda"));
	}
}
