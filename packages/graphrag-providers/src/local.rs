use std::{collections::HashSet, path::Path};

use tokenizers::Tokenizer;

use crate::{Error, Result};

const UNKNOWN_TOKENS: [&str; 3] = ["[UNK]", "<unk>", "<UNK>"];
const UNIGRAM_WEIGHT: f64 = 0.7;
const BIGRAM_WEIGHT: f64 = 0.3;

/// Local reranker that scores `(query, document)` pairs by how much of the query's token
/// sequence the document covers. Scores fall in `[0, 1]`.
#[derive(Clone)]
pub struct LexicalCrossScorer {
	tokenizer: Tokenizer,
}
impl LexicalCrossScorer {
	pub fn new(tokenizer: Tokenizer) -> Self {
		Self { tokenizer }
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let tokenizer = Tokenizer::from_file(path).map_err(|err| Error::Tokenizer {
			message: format!("Failed to load tokenizer from {}: {err}", path.display()),
		})?;

		Ok(Self::new(tokenizer))
	}

	pub fn score(&self, query: &str, docs: &[String]) -> Result<Vec<f64>> {
		let query_tokens = self.tokens(query)?;

		if query_tokens.is_empty() {
			return Ok(vec![0.0; docs.len()]);
		}

		let query_bigrams = bigrams(&query_tokens);
		let query_unique: Vec<&String> = {
			let mut seen = HashSet::new();

			query_tokens.iter().filter(|token| seen.insert(token.as_str())).collect()
		};
		let total_weight: f64 = query_unique.iter().map(|token| token_weight(token)).sum();
		let mut out = Vec::with_capacity(docs.len());

		for doc in docs {
			let doc_tokens = self.tokens(doc)?;
			let doc_set: HashSet<&str> = doc_tokens.iter().map(String::as_str).collect();
			let covered: f64 = query_unique
				.iter()
				.filter(|token| doc_set.contains(token.as_str()))
				.map(|token| token_weight(token))
				.sum();
			let unigram = if total_weight > 0.0 { covered / total_weight } else { 0.0 };
			let bigram = if query_bigrams.is_empty() {
				unigram
			} else {
				let doc_bigrams = bigrams(&doc_tokens);
				let hits = query_bigrams.iter().filter(|pair| doc_bigrams.contains(*pair)).count();

				hits as f64 / query_bigrams.len() as f64
			};

			out.push((UNIGRAM_WEIGHT * unigram + BIGRAM_WEIGHT * bigram).clamp(0.0, 1.0));
		}

		Ok(out)
	}

	fn tokens(&self, text: &str) -> Result<Vec<String>> {
		let encoding = self
			.tokenizer
			.encode(text, false)
			.map_err(|err| Error::Tokenizer { message: format!("Failed to tokenize text: {err}") })?;

		Ok(encoding
			.get_tokens()
			.iter()
			.filter(|token| !UNKNOWN_TOKENS.contains(&token.as_str()))
			.map(|token| token.trim_start_matches("##").to_lowercase())
			.filter(|token| token.chars().any(char::is_alphanumeric))
			.collect())
	}
}

fn token_weight(token: &str) -> f64 {
	token.chars().count().max(1) as f64
}

fn bigrams(tokens: &[String]) -> HashSet<(String, String)> {
	tokens.windows(2).map(|pair| (pair[0].clone(), pair[1].clone())).collect()
}
