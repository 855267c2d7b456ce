use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use crate::{Error, LocalReranker, RerankProvider, Result};
use graphrag_domain::{FusedResult, fusion::cmp_f64_desc};
use graphrag_providers::rerank::RerankScore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankTier {
	Remote,
	Local,
	None,
}

/// Reranked results, tagged with the tier that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
	Remote(Vec<FusedResult>),
	Local(Vec<FusedResult>),
	/// Every tier failed or none was configured. Items keep their fused order.
	NoneApplied(Vec<FusedResult>),
}
impl RerankOutcome {
	pub fn tier(&self) -> RerankTier {
		match self {
			Self::Remote(_) => RerankTier::Remote,
			Self::Local(_) => RerankTier::Local,
			Self::NoneApplied(_) => RerankTier::None,
		}
	}

	pub fn applied(&self) -> bool {
		!matches!(self, Self::NoneApplied(_))
	}

	pub fn into_items(self) -> Vec<FusedResult> {
		match self {
			Self::Remote(items) | Self::Local(items) | Self::NoneApplied(items) => items,
		}
	}
}

/// Remote rerank, then the in-process scorer, then no rerank at all. Never fails.
pub struct RerankChain {
	remote: Option<Arc<dyn RerankProvider>>,
	local: Option<Arc<dyn LocalReranker>>,
}
impl RerankChain {
	pub fn new(remote: Option<Arc<dyn RerankProvider>>, local: Option<Arc<dyn LocalReranker>>) -> Self {
		Self { remote, local }
	}

	pub async fn rerank(
		&self,
		query: &str,
		items: Vec<FusedResult>,
		top_k: usize,
		model: Option<&str>,
		deadline: Instant,
	) -> RerankOutcome {
		if items.is_empty() {
			return RerankOutcome::NoneApplied(items);
		}

		let docs: Vec<String> = items.iter().map(|item| item.text.clone()).collect();

		if let Some(remote) = self.remote.as_ref() {
			let scored = match tokio::time::timeout_at(deadline, remote.rerank(model, query, &docs)).await
			{
				Ok(Ok(scores)) => dense_scores(&scores, docs.len()),
				Ok(Err(err)) => Err(err),
				Err(_) => Err(Error::Provider { message: "Rerank request timed out.".to_string() }),
			};

			match scored {
				Ok(scores) => return RerankOutcome::Remote(apply_scores(items, &scores, top_k)),
				Err(err) => {
					tracing::warn!(error = %err, "Remote rerank failed. Trying local reranker.");
				},
			}
		}
		if let Some(local) = self.local.as_ref() {
			match local.score(query, &docs).and_then(|scores| check_len(scores, docs.len())) {
				Ok(scores) => return RerankOutcome::Local(apply_scores(items, &scores, top_k)),
				Err(err) => {
					tracing::warn!(error = %err, "Local rerank failed. Keeping fused order.");
				},
			}
		}

		RerankOutcome::NoneApplied(items)
	}
}

/// One score per document, in document order. Missing, repeated, or out-of-range indices
/// reject the whole response.
fn dense_scores(scores: &[RerankScore], expected: usize) -> Result<Vec<f64>> {
	let mut dense = vec![None; expected];

	for score in scores {
		match dense.get_mut(score.index) {
			Some(slot @ None) => *slot = Some(score.score),
			Some(Some(_)) =>
				return Err(Error::Provider {
					message: format!("Rerank response repeats index {}.", score.index),
				}),
			None =>
				return Err(Error::Provider {
					message: format!("Rerank response index {} is out of range.", score.index),
				}),
		}
	}

	dense.into_iter().collect::<Option<Vec<f64>>>().ok_or_else(|| Error::Provider {
		message: "Rerank response did not score every document.".to_string(),
	})
}

fn check_len(scores: Vec<f64>, expected: usize) -> Result<Vec<f64>> {
	if scores.len() != expected {
		return Err(Error::Provider {
			message: format!("Local reranker returned {} scores for {expected} documents.", scores.len()),
		});
	}

	Ok(scores)
}

fn apply_scores(mut items: Vec<FusedResult>, scores: &[f64], top_k: usize) -> Vec<FusedResult> {
	for (item, score) in items.iter_mut().zip(scores) {
		item.rerank_score = Some(*score);
		item.score = *score;
	}

	items.sort_by(|a, b| cmp_f64_desc(a.score, b.score));
	items.truncate(top_k);

	items
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::BoxFuture;
	use graphrag_domain::{ModalityMap, SourceRef};

	struct PartialRemote;
	impl RerankProvider for PartialRemote {
		fn rerank<'a>(
			&'a self,
			_: Option<&'a str>,
			_: &'a str,
			_: &'a [String],
		) -> BoxFuture<'a, Result<Vec<RerankScore>>> {
			Box::pin(async { Ok(vec![RerankScore { index: 0, score: 0.9 }]) })
		}
	}

	struct LengthScorer;
	impl LocalReranker for LengthScorer {
		fn score(&self, _: &str, docs: &[String]) -> Result<Vec<f64>> {
			Ok(docs.iter().map(|doc| doc.len() as f64).collect())
		}
	}

	fn fused(id: &str, text: &str, score: f64) -> FusedResult {
		FusedResult {
			id: id.to_string(),
			score,
			rrf_score: score,
			authority: None,
			rerank_score: None,
			modalities: Vec::new(),
			ranks: ModalityMap::default(),
			text: text.to_string(),
			source: SourceRef::default(),
			metadata: Default::default(),
			evidence: None,
		}
	}

	fn deadline() -> Instant {
		Instant::now() + std::time::Duration::from_secs(5)
	}

	#[tokio::test]
	async fn incomplete_remote_scores_fall_through_to_local() {
		let chain = RerankChain::new(Some(Arc::new(PartialRemote)), Some(Arc::new(LengthScorer)));
		let items = vec![fused("a", "short", 0.9), fused("b", "a much longer text", 0.5)];
		let outcome = chain.rerank("q", items, 10, None, deadline()).await;

		assert_eq!(outcome.tier(), RerankTier::Local);

		let items = outcome.into_items();

		assert_eq!(items[0].id, "b");
		assert_eq!(items[0].rerank_score, Some(18.0));
	}

	#[test]
	fn repeated_or_out_of_range_indices_are_rejected() {
		let repeated = [RerankScore { index: 0, score: 0.9 }, RerankScore { index: 0, score: 0.1 }];
		let out_of_range = [RerankScore { index: 0, score: 0.9 }, RerankScore { index: 2, score: 0.1 }];
		let complete = [RerankScore { index: 1, score: 0.2 }, RerankScore { index: 0, score: 0.8 }];

		assert!(dense_scores(&repeated, 2).is_err());
		assert!(dense_scores(&out_of_range, 2).is_err());
		assert_eq!(dense_scores(&complete, 2).expect("Complete scores must pass."), vec![0.8, 0.2]);
	}

	#[tokio::test]
	async fn without_tiers_order_is_unchanged() {
		let chain = RerankChain::new(None, None);
		let items = vec![fused("a", "x", 0.9), fused("b", "y", 0.5)];
		let outcome = chain.rerank("q", items.clone(), 1, None, deadline()).await;

		assert!(!outcome.applied());
		assert_eq!(outcome.into_items(), items);
	}
}
