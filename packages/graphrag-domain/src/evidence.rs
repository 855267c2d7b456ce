use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::{
	item::{EvidencePath, FusedResult, RankedItem, SourceRef},
	modality::Modality,
};

pub const DEFAULT_CHARS_PER_TOKEN: u32 = 4;

/// A packed unit of the final context. `text` is what the caller sees, marker included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
	pub id: String,
	pub text: String,
	pub score: f64,
	pub source: SourceRef,
	pub modalities: Vec<Modality>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub citation: Option<String>,
	pub estimated_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationEntry {
	pub marker: String,
	pub number: u32,
	pub chunk_id: String,
	pub source: SourceRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackedContext {
	pub chunks: Vec<ContextChunk>,
	pub citations: Vec<CitationEntry>,
	pub used_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackingOptions {
	pub max_tokens: u32,
	pub max_chunks: usize,
	pub include_citations: bool,
	pub chars_per_token: u32,
}

pub fn estimate_tokens(text: &str, chars_per_token: u32) -> u32 {
	let graphemes = text.graphemes(true).count() as u64;
	let per_token = u64::from(chars_per_token.max(1));

	graphemes.div_ceil(per_token).min(u64::from(u32::MAX)) as u32
}

pub fn citation_marker(number: u32) -> String {
	format!("[{number}]")
}

/// Packs `items` in order until the next one would overflow `max_tokens` or `max_chunks` is
/// reached. An item that does not fit ends packing; it is never truncated or skipped over.
pub fn build_context(items: &[FusedResult], options: PackingOptions) -> PackedContext {
	let mut packed = PackedContext::default();

	for item in items {
		if packed.chunks.len() >= options.max_chunks {
			break;
		}

		let number = packed.citations.len() as u32 + 1;
		let marker = options.include_citations.then(|| citation_marker(number));
		let text = match marker.as_deref() {
			Some(marker) if item.text.is_empty() => marker.to_string(),
			Some(marker) => format!("{} {marker}", item.text),
			None => item.text.clone(),
		};
		let cost = estimate_tokens(&text, options.chars_per_token);

		if packed.used_tokens.saturating_add(cost) > options.max_tokens {
			break;
		}

		packed.used_tokens += cost;

		if let Some(marker) = marker.as_ref() {
			packed.citations.push(CitationEntry {
				marker: marker.clone(),
				number,
				chunk_id: item.id.clone(),
				source: item.source.clone(),
			});
		}

		packed.chunks.push(ContextChunk {
			id: item.id.clone(),
			text,
			score: item.score,
			source: item.source.clone(),
			modalities: item.modalities.clone(),
			citation: marker,
			estimated_tokens: cost,
		});
	}

	packed
}

/// Evidence paths carried by graph results, in backend order.
pub fn collect_evidence(graph_items: &[RankedItem]) -> Vec<EvidencePath> {
	graph_items.iter().filter_map(|item| item.evidence.clone()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::modality::ModalityMap;

	fn result(id: &str, text: &str, score: f64) -> FusedResult {
		let item = RankedItem::new(id, Modality::Keyword, 0.0, text, SourceRef {
			source_id: format!("src-{id}"),
			..Default::default()
		});
		let mut fused = FusedResult::from_first(&item);

		fused.score = score;
		fused.modalities.push(Modality::Keyword);
		fused.ranks = ModalityMap::new(None, Some(1), None);

		fused
	}

	fn options(max_tokens: u32, include_citations: bool) -> PackingOptions {
		PackingOptions {
			max_tokens,
			max_chunks: 10,
			include_citations,
			chars_per_token: DEFAULT_CHARS_PER_TOKEN,
		}
	}

	#[test]
	fn estimates_round_up() {
		assert_eq!(estimate_tokens("", 4), 0);
		assert_eq!(estimate_tokens("abcd", 4), 1);
		assert_eq!(estimate_tokens("abcde", 4), 2);
		assert_eq!(estimate_tokens("e\u{301}e\u{301}", 1), 2);
	}

	#[test]
	fn overflowing_item_is_dropped_and_packing_stops() {
		// "aaaaaaaaaaaa [1]" is 16 graphemes, 4 tokens each.
		let items = vec![
			result("a", "aaaaaaaaaaaa", 0.9),
			result("b", "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", 0.8),
			result("c", "cccc", 0.7),
		];
		let packed = build_context(&items, options(10, true));

		assert_eq!(packed.chunks.len(), 1);
		assert_eq!(packed.chunks[0].text, "aaaaaaaaaaaa [1]");
		assert_eq!(packed.used_tokens, 4);
		assert!(packed.used_tokens <= 10);
	}

	#[test]
	fn markers_are_sequential_without_gaps() {
		let items: Vec<FusedResult> =
			(0..5).map(|i| result(&format!("id{i}"), "short text", 1.0 - i as f64 / 10.0)).collect();
		let packed = build_context(&items, options(1_000, true));
		let numbers: Vec<u32> = packed.citations.iter().map(|c| c.number).collect();

		assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

		for (chunk, citation) in packed.chunks.iter().zip(&packed.citations) {
			assert!(chunk.text.ends_with(&citation.marker));
			assert_eq!(chunk.citation.as_deref(), Some(citation.marker.as_str()));
			assert_eq!(
				packed.chunks.iter().filter(|c| c.text.contains(&citation.marker)).count(),
				1
			);
		}
	}

	#[test]
	fn same_source_gets_distinct_markers() {
		let mut first = result("a", "alpha", 0.9);
		let mut second = result("b", "beta", 0.8);

		first.source.source_id = "shared".to_string();
		second.source.source_id = "shared".to_string();

		let packed = build_context(&[first, second], options(1_000, true));

		assert_eq!(packed.citations[0].marker, "[1]");
		assert_eq!(packed.citations[1].marker, "[2]");
	}

	#[test]
	fn without_citations_text_is_untouched() {
		let packed = build_context(&[result("a", "alpha", 0.9)], options(1_000, false));

		assert!(packed.citations.is_empty());
		assert_eq!(packed.chunks[0].text, "alpha");
		assert!(packed.chunks[0].citation.is_none());
	}

	#[test]
	fn chunk_count_respects_limit() {
		let items: Vec<FusedResult> =
			(0..5).map(|i| result(&format!("id{i}"), "x", 0.5)).collect();
		let packed = build_context(&items, PackingOptions { max_chunks: 3, ..options(1_000, true) });

		assert_eq!(packed.chunks.len(), 3);
		assert_eq!(packed.citations.len(), 3);
	}

	#[test]
	fn collects_graph_paths_in_order() {
		let mut first = RankedItem::new("n2", Modality::Graph, 0.5, "", SourceRef::default());
		let plain = RankedItem::new("n9", Modality::Graph, 0.4, "", SourceRef::default());
		let mut second = RankedItem::new("n3", Modality::Graph, 0.3, "", SourceRef::default());

		first.evidence = Some(EvidencePath::new(
			vec!["n1".to_string(), "n2".to_string()],
			vec!["e1".to_string()],
		));
		second.evidence = Some(EvidencePath::new(vec!["n3".to_string()], Vec::new()));

		let paths = collect_evidence(&[first, plain, second]);

		assert_eq!(paths.len(), 2);
		assert_eq!(paths[0].nodes, vec!["n1", "n2"]);
		assert_eq!(paths[1].score, 1.0);
	}
}
