use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{fusion::cmp_f64_desc, item::FusedResult, item::SourceRef};

pub const DEFAULT_SOURCE_WEIGHT: f64 = 0.75;
pub const DEFAULT_TYPE_WEIGHT: f64 = 0.70;

/// Source and document-type weight lookup. Misses fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityTable {
	pub sources: HashMap<String, f64>,
	pub document_types: HashMap<String, f64>,
	pub default_source_weight: f64,
	pub default_type_weight: f64,
}
impl AuthorityTable {
	pub fn empty(default_source_weight: f64, default_type_weight: f64) -> Self {
		Self {
			sources: HashMap::new(),
			document_types: HashMap::new(),
			default_source_weight,
			default_type_weight,
		}
	}

	pub fn source_weight(&self, source_id: &str) -> f64 {
		self.sources.get(source_id).copied().unwrap_or(self.default_source_weight)
	}

	pub fn type_weight(&self, document_type: Option<&str>) -> f64 {
		document_type
			.and_then(|kind| self.document_types.get(kind).copied())
			.unwrap_or(self.default_type_weight)
	}

	pub fn authority(&self, source: &SourceRef) -> f64 {
		self.source_weight(&source.source_id) * self.type_weight(source.document_type.as_deref())
	}
}
impl Default for AuthorityTable {
	fn default() -> Self {
		Self::empty(DEFAULT_SOURCE_WEIGHT, DEFAULT_TYPE_WEIGHT)
	}
}

/// 1.0 maps to 1.5x, 0.5 is neutral, 0.0 maps to 0.5x.
pub fn authority_multiplier(authority: f64) -> f64 {
	1.0 + ((authority - 0.5) * 2.0) * 0.5
}

/// Rescales every score by its authority multiplier and re-sorts. Equal boosted scores keep
/// their fused order.
pub fn apply_authority(results: &mut [FusedResult], table: &AuthorityTable) {
	for result in results.iter_mut() {
		let authority = table.authority(&result.source);

		result.authority = Some(authority);
		result.score *= authority_multiplier(authority);
	}

	results.sort_by(|left, right| cmp_f64_desc(left.score, right.score));
}
