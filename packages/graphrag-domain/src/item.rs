use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::modality::{Modality, ModalityMap};

/// Where a piece of content came from. `source_id` and `document_type` key the authority tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
	pub source_id: String,
	pub document_type: Option<String>,
	pub title: Option<String>,
	pub uri: Option<String>,
}

/// Ordered node/edge sequence produced by graph traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePath {
	pub nodes: Vec<String>,
	pub edges: Vec<String>,
	pub score: f64,
}
impl EvidencePath {
	pub fn new(nodes: Vec<String>, edges: Vec<String>) -> Self {
		let score = path_score(edges.len());

		Self { nodes, edges, score }
	}

	pub fn hop_count(&self) -> usize {
		self.edges.len()
	}
}

/// One content unit as returned by a single modality, in backend order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
	pub id: String,
	pub score: f32,
	pub text: String,
	pub source: SourceRef,
	pub modality: Modality,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub evidence: Option<EvidencePath>,
}
impl RankedItem {
	pub fn new(
		id: impl Into<String>,
		modality: Modality,
		score: f32,
		text: impl Into<String>,
		source: SourceRef,
	) -> Self {
		Self {
			id: id.into(),
			score,
			text: text.into(),
			source,
			modality,
			metadata: Map::new(),
			evidence: None,
		}
	}
}

/// An item after cross-modality fusion. `score` is the value that orders results; the other
/// score fields record how it was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
	pub id: String,
	pub score: f64,
	pub rrf_score: f64,
	pub authority: Option<f64>,
	pub rerank_score: Option<f64>,
	pub modalities: Vec<Modality>,
	pub ranks: ModalityMap<Option<u32>>,
	pub text: String,
	pub source: SourceRef,
	pub metadata: Map<String, Value>,
	pub evidence: Option<EvidencePath>,
}
impl FusedResult {
	pub(crate) fn from_first(item: &RankedItem) -> Self {
		Self {
			id: item.id.clone(),
			score: 0.0,
			rrf_score: 0.0,
			authority: None,
			rerank_score: None,
			modalities: Vec::new(),
			ranks: ModalityMap::default(),
			text: item.text.clone(),
			source: item.source.clone(),
			metadata: item.metadata.clone(),
			evidence: item.evidence.clone(),
		}
	}
}

pub fn path_score(hop_count: usize) -> f64 {
	1.0 / (1.0 + hop_count as f64)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn path_score_decays_with_hops() {
		let seed_only = EvidencePath::new(vec!["n1".to_string()], Vec::new());
		let two_hops = EvidencePath::new(
			vec!["n1".to_string(), "n2".to_string(), "n3".to_string()],
			vec!["e1".to_string(), "e2".to_string()],
		);

		assert_eq!(seed_only.score, 1.0);
		assert_eq!(two_hops.hop_count(), 2);
		assert!((two_hops.score - 1.0 / 3.0).abs() < 1e-12);
	}
}
