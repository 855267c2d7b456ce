use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{task::JoinHandle, time::Instant};

use crate::{Backends, EntityResolver, GraphSeeding, Result, SearchQuery};
use graphrag_domain::{GraphView, Modality, ModalityMap, RankedItem, SearchProfile};

type TaskResult = (Result<(Vec<RankedItem>, Option<GraphSeeding>)>, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
	Error,
	Timeout,
	Unavailable,
	Panicked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModalityStatus {
	Ok,
	/// Disabled by the profile; never dispatched.
	#[default]
	Skipped,
	/// Graph only. Entities resolved to no nodes.
	NoSeeds,
	Degraded {
		reason: DegradedReason,
	},
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModalityReport {
	#[serde(flatten)]
	pub status: ModalityStatus,
	pub count: usize,
	pub latency_ms: u64,
}
impl ModalityReport {
	pub fn skipped() -> Self {
		Self { status: ModalityStatus::Skipped, count: 0, latency_ms: 0 }
	}

	pub fn is_degraded(&self) -> bool {
		matches!(self.status, ModalityStatus::Degraded { .. })
	}
}

/// Metadata filters routed to each modality.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModalityFilters {
	pub vector: Map<String, Value>,
	pub keyword: Map<String, Value>,
	pub graph: Map<String, Value>,
}
impl ModalityFilters {
	pub fn into_map(self) -> ModalityMap<Map<String, Value>> {
		ModalityMap::new(self.vector, self.keyword, self.graph)
	}
}

#[derive(Debug, Clone, Default)]
pub struct ModalityOutput {
	pub items: ModalityMap<Vec<RankedItem>>,
	pub reports: ModalityMap<ModalityReport>,
	pub seeding: Option<GraphSeeding>,
}

/// Fans a query out to every enabled modality concurrently. One modality failing, timing out,
/// or panicking never affects the others.
pub struct Orchestrator {
	backends: Backends,
	entities: Arc<EntityResolver>,
	modality_timeout: Duration,
	seeds_per_entity: u32,
}
impl Orchestrator {
	pub fn new(
		backends: Backends,
		entities: Arc<EntityResolver>,
		modality_timeout: Duration,
		seeds_per_entity: u32,
	) -> Self {
		Self { backends, entities, modality_timeout, seeds_per_entity }
	}

	pub async fn search(
		&self,
		query: Arc<str>,
		profile: &SearchProfile,
		view: GraphView,
		filters: ModalityFilters,
		deadline: Instant,
	) -> ModalityOutput {
		let started = Instant::now();
		let deadline = deadline.min(started + self.modality_timeout);
		let mut filters = filters.into_map();
		let mut output = ModalityOutput::default();
		let mut pending = Vec::new();

		for modality in profile.enabled_modalities() {
			let modality_filters = std::mem::take(filters.get_mut(modality));

			match self.spawn(modality, query.clone(), profile, &view, modality_filters) {
				Some(handle) => pending.push((modality, handle)),
				None => {
					tracing::warn!(%modality, "No adapter is configured for modality.");

					*output.reports.get_mut(modality) =
						degraded(DegradedReason::Unavailable, 0);
				},
			}
		}

		// Every task is already running; awaiting them in order against one deadline is fine.
		for (modality, mut handle) in pending {
			let report = match tokio::time::timeout_at(deadline, &mut handle).await {
				Ok(Ok((Ok((mut items, seeding)), latency_ms))) => {
					items.truncate(profile.top_k as usize);

					for item in &mut items {
						item.modality = modality;
					}

					let status = match seeding.as_ref() {
						Some(seeding) if seeding.seeds == 0 => ModalityStatus::NoSeeds,
						_ => ModalityStatus::Ok,
					};
					let count = items.len();

					output.seeding = output.seeding.or(seeding);
					*output.items.get_mut(modality) = items;

					ModalityReport { status, count, latency_ms }
				},
				Ok(Ok((Err(err), latency_ms))) => {
					tracing::warn!(%modality, error = %err, "Modality search failed.");

					degraded(DegradedReason::Error, latency_ms)
				},
				Ok(Err(err)) => {
					let reason =
						if err.is_panic() { DegradedReason::Panicked } else { DegradedReason::Error };

					tracing::warn!(%modality, error = %err, "Modality task did not complete.");

					degraded(reason, elapsed_ms(started))
				},
				Err(_) => {
					handle.abort();

					tracing::warn!(%modality, "Modality search timed out.");

					degraded(DegradedReason::Timeout, elapsed_ms(started))
				},
			};

			*output.reports.get_mut(modality) = report;
		}

		output
	}

	fn spawn(
		&self,
		modality: Modality,
		query: Arc<str>,
		profile: &SearchProfile,
		view: &GraphView,
		filters: Map<String, Value>,
	) -> Option<JoinHandle<TaskResult>> {
		let top_k = profile.top_k;

		match modality {
			Modality::Vector | Modality::Keyword => {
				let backend = match modality {
					Modality::Vector => self.backends.vector.clone()?,
					_ => self.backends.keyword.clone()?,
				};
				// The similarity threshold only has meaning for cosine scores.
				let min_score =
					if modality == Modality::Vector { profile.similarity_threshold } else { 0.0 };

				Some(tokio::spawn(async move {
					let started = Instant::now();
					let result = backend
						.search(SearchQuery { text: &query, top_k, min_score, filters: &filters })
						.await
						.map(|items| (items, None));

					(result, elapsed_ms(started))
				}))
			},
			Modality::Graph => {
				let graph = self.backends.graph.clone()?;
				let entities = self.entities.clone();
				let view = view.clone();
				let per_entity = self.seeds_per_entity;

				Some(tokio::spawn(async move {
					let started = Instant::now();
					let (found, entity_tier) = entities.extract_entities(&query).await;
					let seeds =
						entities.resolve_seeds(graph.as_ref(), &found, &view, per_entity).await;
					let seeding = GraphSeeding {
						entity_tier: Some(entity_tier),
						entities: found.len(),
						seeds: seeds.len(),
					};

					if seeds.is_empty() {
						tracing::debug!(entities = found.len(), "No graph seeds resolved.");

						return (Ok((Vec::new(), Some(seeding))), elapsed_ms(started));
					}

					let result = graph
						.traverse(&seeds, &view, top_k, &filters)
						.await
						.map(|items| (items, Some(seeding)));

					(result, elapsed_ms(started))
				}))
			},
		}
	}
}

fn degraded(reason: DegradedReason, latency_ms: u64) -> ModalityReport {
	ModalityReport { status: ModalityStatus::Degraded { reason }, count: 0, latency_ms }
}

fn elapsed_ms(started: Instant) -> u64 {
	u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
