use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::item::EvidencePath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
	pub edge_id: String,
	pub from: String,
	pub to: String,
	pub edge_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
	pub node_id: String,
	pub hops: u32,
	parent: Option<(usize, String)>,
}

/// Breadth-first bookkeeping over an edge list fetched hop by hop. Edges are walked in either
/// direction; the first edge that reaches a node fixes its path.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
	visits: Vec<Visit>,
	index: HashMap<String, usize>,
	frontier: Vec<usize>,
	depth: u32,
}
impl Traversal {
	pub fn new<I, S>(seeds: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut traversal = Self::default();

		for seed in seeds {
			let seed = seed.into();

			if traversal.index.contains_key(&seed) {
				continue;
			}

			let idx = traversal.push(seed, 0, None);

			traversal.frontier.push(idx);
		}

		traversal
	}

	pub fn depth(&self) -> u32 {
		self.depth
	}

	pub fn len(&self) -> usize {
		self.visits.len()
	}

	pub fn is_empty(&self) -> bool {
		self.visits.is_empty()
	}

	pub fn is_exhausted(&self) -> bool {
		self.frontier.is_empty()
	}

	pub fn frontier(&self) -> Vec<String> {
		self.frontier.iter().map(|idx| self.visits[*idx].node_id.clone()).collect()
	}

	pub fn visits(&self) -> &[Visit] {
		&self.visits
	}

	/// Expands the frontier by one hop using `edges`, stopping once `limit` nodes are known.
	/// Returns how many nodes were discovered.
	pub fn advance(&mut self, edges: &[GraphEdge], limit: usize) -> usize {
		let frontier: HashSet<usize> = self.frontier.iter().copied().collect();
		let depth = self.depth + 1;
		let mut next = Vec::new();

		for edge in edges {
			if self.visits.len() >= limit {
				break;
			}

			for (origin, target) in [(&edge.from, &edge.to), (&edge.to, &edge.from)] {
				let Some(&origin_idx) = self.index.get(origin.as_str()) else {
					continue;
				};

				if !frontier.contains(&origin_idx) || self.index.contains_key(target.as_str()) {
					continue;
				}

				let idx = self.push(target.clone(), depth, Some((origin_idx, edge.edge_id.clone())));

				next.push(idx);

				break;
			}
		}

		self.depth = depth;
		self.frontier = next;

		self.frontier.len()
	}

	pub fn path(&self, idx: usize) -> EvidencePath {
		let mut nodes = Vec::new();
		let mut edges = Vec::new();
		let mut cursor = Some(idx);

		while let Some(current) = cursor {
			let visit = &self.visits[current];

			nodes.push(visit.node_id.clone());

			cursor = visit.parent.as_ref().map(|(parent, edge_id)| {
				edges.push(edge_id.clone());

				*parent
			});
		}

		nodes.reverse();
		edges.reverse();

		EvidencePath::new(nodes, edges)
	}

	/// Every known node with the path that reached it, in discovery order.
	pub fn paths(&self) -> Vec<(String, EvidencePath)> {
		(0..self.visits.len()).map(|idx| (self.visits[idx].node_id.clone(), self.path(idx))).collect()
	}

	fn push(&mut self, node_id: String, hops: u32, parent: Option<(usize, String)>) -> usize {
		let idx = self.visits.len();

		self.index.insert(node_id.clone(), idx);
		self.visits.push(Visit { node_id, hops, parent });

		idx
	}
}
