use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the independent search mechanisms a query fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
	Vector,
	Keyword,
	Graph,
}
impl Modality {
	/// Fixed accumulation order. Fusion tie-breaks depend on it.
	pub const ALL: [Self; 3] = [Self::Vector, Self::Keyword, Self::Graph];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Keyword => "keyword",
			Self::Graph => "graph",
		}
	}
}
impl fmt::Display for Modality {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A value per modality, addressed through [`Modality`] rather than by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalityMap<T> {
	pub vector: T,
	pub keyword: T,
	pub graph: T,
}
impl<T> ModalityMap<T> {
	pub fn new(vector: T, keyword: T, graph: T) -> Self {
		Self { vector, keyword, graph }
	}

	pub fn from_fn(mut f: impl FnMut(Modality) -> T) -> Self {
		Self { vector: f(Modality::Vector), keyword: f(Modality::Keyword), graph: f(Modality::Graph) }
	}

	pub fn get(&self, modality: Modality) -> &T {
		match modality {
			Modality::Vector => &self.vector,
			Modality::Keyword => &self.keyword,
			Modality::Graph => &self.graph,
		}
	}

	pub fn get_mut(&mut self, modality: Modality) -> &mut T {
		match modality {
			Modality::Vector => &mut self.vector,
			Modality::Keyword => &mut self.keyword,
			Modality::Graph => &mut self.graph,
		}
	}

	pub fn map<U>(self, mut f: impl FnMut(Modality, T) -> U) -> ModalityMap<U> {
		ModalityMap {
			vector: f(Modality::Vector, self.vector),
			keyword: f(Modality::Keyword, self.keyword),
			graph: f(Modality::Graph, self.graph),
		}
	}

	/// Iterates in [`Modality::ALL`] order.
	pub fn iter(&self) -> impl Iterator<Item = (Modality, &T)> {
		Modality::ALL.into_iter().map(move |modality| (modality, self.get(modality)))
	}
}
