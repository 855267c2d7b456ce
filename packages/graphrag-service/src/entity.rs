use std::{collections::HashSet, sync::Arc};

use serde::Serialize;

use crate::{EntityModel, GraphBackend};
use graphrag_domain::{
	DictionaryExtractor, Entity, ExtractionTier, GraphView, entity::normalize_name,
};

/// What the graph modality found before traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSeeding {
	pub entity_tier: Option<ExtractionTier>,
	pub entities: usize,
	pub seeds: usize,
}

/// Entity extraction with a model tier and a dictionary fallback, plus seed lookup.
pub struct EntityResolver {
	model: Option<Arc<dyn EntityModel>>,
	dictionary: DictionaryExtractor,
}
impl EntityResolver {
	pub fn new(model: Option<Arc<dyn EntityModel>>, dictionary: DictionaryExtractor) -> Self {
		Self { model, dictionary }
	}

	pub async fn extract_entities(&self, query: &str) -> (Vec<Entity>, ExtractionTier) {
		if let Some(model) = self.model.as_ref() {
			match model.extract(query).await {
				Ok(entities) => return (entities, ExtractionTier::Model),
				Err(err) => {
					tracing::warn!(error = %err, "Entity model failed. Falling back to dictionary.");
				},
			}
		}

		(self.dictionary.extract(query), ExtractionTier::Dictionary)
	}

	/// Maps entities to graph node ids. Typed lookup first, then any type. Entities that match
	/// nothing, or whose lookup fails, are dropped.
	pub async fn resolve_seeds(
		&self,
		graph: &dyn GraphBackend,
		entities: &[Entity],
		view: &GraphView,
		per_entity: u32,
	) -> Vec<String> {
		let mut seen = HashSet::new();
		let mut seeds = Vec::new();

		for entity in entities {
			let name = normalize_name(&entity.text);

			if name.is_empty() {
				continue;
			}

			let typed = graph.find_nodes(&name, Some(entity.entity_type.as_str()), view, per_entity).await;
			let found = match typed {
				Ok(ids) if !ids.is_empty() => Ok(ids),
				Ok(_) => graph.find_nodes(&name, None, view, per_entity).await,
				Err(err) => Err(err),
			};

			match found {
				Ok(ids) =>
					for id in ids.into_iter().take(per_entity as usize) {
						if seen.insert(id.clone()) {
							seeds.push(id);
						}
					},
				Err(err) => {
					tracing::warn!(
						entity_type = %entity.entity_type,
						error = %err,
						"Seed lookup failed. Dropping entity."
					);
				},
			}
		}

		seeds
	}
}
