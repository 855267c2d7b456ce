use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
};

use crate::{
	item::{FusedResult, RankedItem},
	modality::{Modality, ModalityMap},
	profile::FusionWeights,
};

pub const DEFAULT_RRF_K: u32 = 60;

/// Scales the weights of `active` modalities so they sum to one. Inactive modalities get zero.
/// When every active weight is zero the active modalities share weight equally.
pub fn normalize_weights(weights: &FusionWeights, active: &ModalityMap<bool>) -> FusionWeights {
	let usable = |modality: Modality| {
		let weight = *weights.get(modality);

		if *active.get(modality) && weight.is_finite() && weight > 0.0 { weight } else { 0.0 }
	};
	let total: f64 = Modality::ALL.into_iter().map(usable).sum();

	if total > 0.0 {
		return ModalityMap::from_fn(|modality| usable(modality) / total);
	}

	let active_count = active.iter().filter(|(_, on)| **on).count();

	if active_count == 0 {
		return ModalityMap::default();
	}

	let share = 1.0 / active_count as f64;

	ModalityMap::from_fn(|modality| if *active.get(modality) { share } else { 0.0 })
}

/// Reciprocal Rank Fusion. Accumulates `weight / (k + rank)` per id across modalities in
/// [`Modality::ALL`] order, then sorts by score with ties left in first-seen order.
pub fn fuse(
	lists: &ModalityMap<Vec<RankedItem>>,
	weights: &FusionWeights,
	k: u32,
	top_k: usize,
) -> Vec<FusedResult> {
	let mut fused: Vec<FusedResult> = Vec::new();
	let mut index_by_id: HashMap<&str, usize> = HashMap::new();

	for (modality, items) in lists.iter() {
		let weight = *weights.get(modality);
		let mut seen_in_list = HashSet::new();

		for (position, item) in items.iter().enumerate() {
			if !seen_in_list.insert(item.id.as_str()) {
				continue;
			}

			let rank = position as u32 + 1;
			let contribution = rrf_term(weight, k, rank);
			let idx = *index_by_id.entry(item.id.as_str()).or_insert_with(|| {
				fused.push(FusedResult::from_first(item));

				fused.len() - 1
			});
			let entry = &mut fused[idx];

			entry.rrf_score += contribution;
			*entry.ranks.get_mut(modality) = Some(rank);

			entry.modalities.push(modality);

			if entry.evidence.is_none() && item.evidence.is_some() {
				entry.evidence = item.evidence.clone();
			}
		}
	}

	for entry in &mut fused {
		entry.score = entry.rrf_score;
	}

	// `sort_by` is stable, so equal scores keep first-seen order.
	fused.sort_by(|left, right| cmp_f64_desc(left.score, right.score));
	fused.truncate(top_k);

	fused
}

pub fn rrf_term(weight: f64, k: u32, rank: u32) -> f64 {
	weight / (k as f64 + rank as f64)
}

/// Descending order with NaN sorted last.
pub fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::item::SourceRef;

	fn item(id: &str, modality: Modality) -> RankedItem {
		RankedItem::new(id, modality, 0.5, format!("text for {id}"), SourceRef {
			source_id: "src".to_string(),
			..Default::default()
		})
	}

	fn list(ids: &[&str], modality: Modality) -> Vec<RankedItem> {
		ids.iter().map(|id| item(id, modality)).collect()
	}

	#[test]
	fn normalized_weights_sum_to_one() {
		let cases = [
			(ModalityMap::new(0.6, 0.4, 0.0), ModalityMap::new(true, true, false)),
			(ModalityMap::new(3.0, 1.0, 7.5), ModalityMap::new(true, true, true)),
			(ModalityMap::new(0.2, 5.0, 0.1), ModalityMap::new(false, true, true)),
			(ModalityMap::new(0.0, 0.0, 0.0), ModalityMap::new(true, false, true)),
		];

		for (weights, active) in cases {
			let normalized = normalize_weights(&weights, &active);
			let sum: f64 = normalized.iter().map(|(_, w)| *w).sum();

			assert!((sum - 1.0).abs() < 1e-6, "Sum was {sum} for {weights:?}.");

			for (modality, weight) in normalized.iter() {
				if !*active.get(modality) {
					assert_eq!(*weight, 0.0);
				}
			}
		}
	}

	#[test]
	fn all_zero_active_weights_split_equally() {
		let normalized = normalize_weights(
			&ModalityMap::new(0.0, 0.0, 0.9),
			&ModalityMap::new(true, true, false),
		);

		assert_eq!(normalized, ModalityMap::new(0.5, 0.5, 0.0));
	}

	#[test]
	fn weighted_two_modality_example() {
		let lists = ModalityMap::new(
			list(&["A", "B"], Modality::Vector),
			list(&["B", "C"], Modality::Keyword),
			Vec::new(),
		);
		let weights = ModalityMap::new(0.6, 0.4, 0.0);
		let fused = fuse(&lists, &weights, DEFAULT_RRF_K, 10);
		let ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();

		assert_eq!(ids, vec!["B", "A", "C"]);
		assert!((fused[0].score - 0.01624).abs() < 1e-5);
		assert!((fused[1].score - 0.00984).abs() < 1e-5);
		assert!((fused[2].score - 0.00645).abs() < 1e-5);
		assert_eq!(fused[0].modalities, vec![Modality::Vector, Modality::Keyword]);
		assert_eq!(fused[0].ranks, ModalityMap::new(Some(2), Some(1), None));
	}

	#[test]
	fn appearing_twice_beats_single_top_rank() {
		for k in [1, 10, 60, 1_000] {
			let lists = ModalityMap::new(
				list(&["X", "Y"], Modality::Vector),
				list(&["Y"], Modality::Keyword),
				Vec::new(),
			);
			let weights = ModalityMap::new(0.5, 0.5, 0.0);
			let fused = fuse(&lists, &weights, k, 10);
			let y = fused.iter().find(|r| r.id == "Y").expect("Y must be fused.");
			let x = fused.iter().find(|r| r.id == "X").expect("X must be fused.");

			assert!(y.score >= x.score, "k={k}");
		}
	}

	#[test]
	fn ids_are_unique_across_all_modalities() {
		let lists = ModalityMap::new(
			list(&["A", "B", "A"], Modality::Vector),
			list(&["B", "A"], Modality::Keyword),
			list(&["A", "C"], Modality::Graph),
		);
		let weights = ModalityMap::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
		let fused = fuse(&lists, &weights, DEFAULT_RRF_K, 10);
		let mut ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();

		ids.sort_unstable();
		ids.dedup();

		assert_eq!(ids.len(), fused.len());
		assert_eq!(fused.len(), 3);

		let a = fused.iter().find(|r| r.id == "A").expect("A must be fused.");

		assert_eq!(a.ranks.vector, Some(1));
	}

	#[test]
	fn ties_keep_first_seen_order_and_output_is_deterministic() {
		let lists = ModalityMap::new(
			list(&["V1"], Modality::Vector),
			list(&["K1"], Modality::Keyword),
			list(&["G1"], Modality::Graph),
		);
		let weights = ModalityMap::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
		let first = fuse(&lists, &weights, DEFAULT_RRF_K, 10);

		assert_eq!(
			first.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
			vec!["V1", "K1", "G1"]
		);

		for _ in 0..20 {
			assert_eq!(fuse(&lists, &weights, DEFAULT_RRF_K, 10), first);
		}
	}

	#[test]
	fn truncates_to_top_k() {
		let lists = ModalityMap::new(
			list(&["A", "B", "C", "D"], Modality::Vector),
			Vec::new(),
			Vec::new(),
		);
		let fused = fuse(&lists, &ModalityMap::new(1.0, 0.0, 0.0), DEFAULT_RRF_K, 2);

		assert_eq!(fused.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
	}

	#[test]
	fn nan_sorts_last() {
		let mut values = vec![0.2, f64::NAN, 0.9];

		values.sort_by(|a, b| cmp_f64_desc(*a, *b));

		assert_eq!(values[0], 0.9);
		assert!(values[2].is_nan());
	}
}
