use serde::{Deserialize, Serialize};

use crate::modality::{Modality, ModalityMap};

pub const GLOBAL_DEFAULT_PROFILE_ID: &str = "global_default";

/// Raw per-modality fusion weights. Normalize with [`crate::fusion::normalize_weights`] before
/// use.
pub type FusionWeights = ModalityMap<f64>;

/// The effective search configuration for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProfile {
	pub profile_id: String,
	pub enabled: ModalityMap<bool>,
	pub top_k: u32,
	pub similarity_threshold: f32,
	pub context_token_budget: u32,
	pub rerank_enabled: bool,
	pub rerank_model_id: Option<String>,
	pub weights: FusionWeights,
}
impl SearchProfile {
	/// Safe fallback used whenever nothing better resolves: vector only, ten results.
	pub fn global_default() -> Self {
		Self {
			profile_id: GLOBAL_DEFAULT_PROFILE_ID.to_string(),
			enabled: ModalityMap::new(true, false, false),
			top_k: 10,
			similarity_threshold: 0.7,
			context_token_budget: 4_000,
			rerank_enabled: false,
			rerank_model_id: None,
			weights: ModalityMap::new(1.0, 0.0, 0.0),
		}
	}

	pub fn is_enabled(&self, modality: Modality) -> bool {
		*self.enabled.get(modality)
	}

	pub fn enabled_modalities(&self) -> Vec<Modality> {
		Modality::ALL.into_iter().filter(|modality| self.is_enabled(*modality)).collect()
	}

	pub fn validate(&self) -> Result<(), InvalidProfile> {
		if self.top_k == 0 {
			return Err(InvalidProfile::new("top_k", "must be greater than zero"));
		}
		if !self.similarity_threshold.is_finite()
			|| !(0.0..=1.0).contains(&self.similarity_threshold)
		{
			return Err(InvalidProfile::new("similarity_threshold", "must be in the range 0.0-1.0"));
		}
		if self.context_token_budget == 0 {
			return Err(InvalidProfile::new("context_token_budget", "must be greater than zero"));
		}

		for (modality, weight) in self.weights.iter() {
			if !weight.is_finite() || *weight < 0.0 {
				return Err(InvalidProfile::new(
					weight_field(modality),
					"must be a finite number, zero or greater",
				));
			}
		}

		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Profile field {field} {reason}.")]
pub struct InvalidProfile {
	pub field: &'static str,
	pub reason: &'static str,
}
impl InvalidProfile {
	fn new(field: &'static str, reason: &'static str) -> Self {
		Self { field, reason }
	}
}

/// Caller-specific field overrides layered on top of a resolved base profile. Absent fields keep
/// the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
	pub vector_enabled: Option<bool>,
	pub keyword_enabled: Option<bool>,
	pub graph_enabled: Option<bool>,
	pub top_k: Option<u32>,
	pub similarity_threshold: Option<f32>,
	pub context_token_budget: Option<u32>,
	pub rerank_enabled: Option<bool>,
	pub rerank_model_id: Option<String>,
	pub vector_weight: Option<f64>,
	pub keyword_weight: Option<f64>,
	pub graph_weight: Option<f64>,
}
impl ProfileOverrides {
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}

	pub fn apply(&self, mut base: SearchProfile) -> SearchProfile {
		if let Some(value) = self.vector_enabled {
			base.enabled.vector = value;
		}
		if let Some(value) = self.keyword_enabled {
			base.enabled.keyword = value;
		}
		if let Some(value) = self.graph_enabled {
			base.enabled.graph = value;
		}
		if let Some(value) = self.top_k {
			base.top_k = value;
		}
		if let Some(value) = self.similarity_threshold {
			base.similarity_threshold = value;
		}
		if let Some(value) = self.context_token_budget {
			base.context_token_budget = value;
		}
		if let Some(value) = self.rerank_enabled {
			base.rerank_enabled = value;
		}
		if let Some(value) = self.rerank_model_id.as_ref() {
			base.rerank_model_id = Some(value.clone());
		}
		if let Some(value) = self.vector_weight {
			base.weights.vector = value;
		}
		if let Some(value) = self.keyword_weight {
			base.weights.keyword = value;
		}
		if let Some(value) = self.graph_weight {
			base.weights.graph = value;
		}

		base
	}
}

/// Constraints on the graph modality. Empty type lists mean "any type".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphView {
	#[serde(default)]
	pub node_types: Vec<String>,
	#[serde(default)]
	pub edge_types: Vec<String>,
	pub max_hops: u32,
	pub max_results: u32,
}
impl GraphView {
	pub fn unrestricted(max_hops: u32, max_results: u32) -> Self {
		Self { node_types: Vec::new(), edge_types: Vec::new(), max_hops, max_results }
	}

	pub fn allows_node_type(&self, node_type: &str) -> bool {
		self.node_types.is_empty() || self.node_types.iter().any(|allowed| allowed == node_type)
	}

	pub fn allows_edge_type(&self, edge_type: &str) -> bool {
		self.edge_types.is_empty() || self.edge_types.iter().any(|allowed| allowed == edge_type)
	}
}

fn weight_field(modality: Modality) -> &'static str {
	match modality {
		Modality::Vector => "weights.vector",
		Modality::Keyword => "weights.keyword",
		Modality::Graph => "weights.graph",
	}
}
