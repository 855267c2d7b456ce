use std::{collections::HashMap, fmt};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

pub const MODEL_CONFIDENCE: f32 = 0.9;
pub const DICTIONARY_CONFIDENCE: f32 = 0.7;

/// Curated fallback terms. Configuration may add to or retype these.
const BUILTIN_TERMS: &[(&str, &str)] = &[
	("pembrolizumab", "drug"),
	("keytruda", "drug"),
	("nivolumab", "drug"),
	("opdivo", "drug"),
	("adalimumab", "drug"),
	("humira", "drug"),
	("trastuzumab", "drug"),
	("herceptin", "drug"),
	("semaglutide", "drug"),
	("ozempic", "drug"),
	("metformin", "drug"),
	("atorvastatin", "drug"),
	("imatinib", "drug"),
	("warfarin", "drug"),
	("aspirin", "drug"),
	("insulin", "drug"),
	("cancer", "disease"),
	("breast cancer", "disease"),
	("lung cancer", "disease"),
	("non-small cell lung cancer", "disease"),
	("melanoma", "disease"),
	("diabetes", "disease"),
	("type 2 diabetes", "disease"),
	("hypertension", "disease"),
	("asthma", "disease"),
	("rheumatoid arthritis", "disease"),
	("alzheimer's disease", "disease"),
	("covid-19", "disease"),
	("pd-1", "gene"),
	("pd-l1", "gene"),
	("her2", "gene"),
	("egfr", "gene"),
	("brca1", "gene"),
	("brca2", "gene"),
	("kras", "gene"),
	("vegf", "gene"),
	("tnf", "gene"),
	("il-6", "gene"),
	("fda", "organization"),
	("ema", "organization"),
	("pfizer", "organization"),
	("merck", "organization"),
	("novartis", "organization"),
	("roche", "organization"),
	("astrazeneca", "organization"),
	("clinical trial", "clinical_concept"),
	("phase 1", "clinical_concept"),
	("phase 2", "clinical_concept"),
	("phase 3", "clinical_concept"),
	("adverse event", "clinical_concept"),
	("biomarker", "clinical_concept"),
	("placebo", "clinical_concept"),
];

/// A domain entity found in query text. `start`/`end` are byte offsets into the text the
/// extractor was given (NFKC-normalized for the dictionary tier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
	pub text: String,
	pub entity_type: String,
	pub start: usize,
	pub end: usize,
	pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTier {
	Model,
	Dictionary,
}
impl ExtractionTier {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Model => "model",
			Self::Dictionary => "dictionary",
		}
	}
}
impl fmt::Display for ExtractionTier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Keyword-to-type matcher. Case-insensitive, word-bounded, longest term first, never
/// overlapping.
#[derive(Debug, Clone)]
pub struct DictionaryExtractor {
	types_by_term: HashMap<String, String>,
	pattern: Option<Regex>,
}
impl DictionaryExtractor {
	pub fn builtin() -> Result<Self, regex::Error> {
		Self::with_terms(std::iter::empty::<(String, String)>())
	}

	pub fn with_terms<I, K, V>(extra: I) -> Result<Self, regex::Error>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let mut types_by_term: HashMap<String, String> = BUILTIN_TERMS
			.iter()
			.map(|(term, kind)| (fold_term(term), (*kind).to_string()))
			.collect();

		for (term, kind) in extra {
			let term = fold_term(term.as_ref());
			let kind = kind.as_ref().trim().to_lowercase();

			if term.is_empty() || kind.is_empty() {
				continue;
			}

			types_by_term.insert(term, kind);
		}

		let mut terms: Vec<&String> = types_by_term.keys().collect();

		// Alternation is leftmost-first, so longer terms must come first to win.
		terms.sort_by(|left, right| right.len().cmp(&left.len()).then_with(|| left.cmp(right)));

		let pattern = if terms.is_empty() {
			None
		} else {
			let alternation =
				terms.iter().map(|term| term_pattern(term)).collect::<Vec<_>>().join("|");

			Some(
				RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
					.case_insensitive(true)
					.build()?,
			)
		};

		Ok(Self { types_by_term, pattern })
	}

	pub fn len(&self) -> usize {
		self.types_by_term.len()
	}

	pub fn is_empty(&self) -> bool {
		self.types_by_term.is_empty()
	}

	pub fn extract(&self, text: &str) -> Vec<Entity> {
		let Some(pattern) = self.pattern.as_ref() else {
			return Vec::new();
		};
		let normalized: String = text.nfkc().collect();
		let mut out = Vec::new();

		for found in pattern.find_iter(&normalized) {
			let Some(kind) = self.types_by_term.get(&fold_term(found.as_str())) else {
				continue;
			};

			out.push(Entity {
				text: found.as_str().to_string(),
				entity_type: kind.clone(),
				start: found.start(),
				end: found.end(),
				confidence: DICTIONARY_CONFIDENCE,
			});
		}

		out
	}
}

/// Lookup key for entity and node names: NFKC, lowercase, single spaces.
pub fn normalize_name(name: &str) -> String {
	let folded: String = name.nfkc().collect::<String>().to_lowercase();

	folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_term(term: &str) -> String {
	normalize_name(term)
}

/// Words of a folded term joined by `\s+`, so any whitespace run in the query matches.
fn term_pattern(term: &str) -> String {
	term.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+")
}
