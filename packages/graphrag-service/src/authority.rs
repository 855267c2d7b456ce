use std::{collections::HashMap, sync::Arc};

use serde::Serialize;

use crate::{AuthorityStore, Error, Result, snapshot::Snapshot};
use graphrag_domain::AuthorityTable;

/// Bulk contents of the authority weight store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorityWeights {
	pub sources: HashMap<String, f64>,
	pub document_types: HashMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthorityRefresh {
	pub sources: usize,
	pub document_types: usize,
}

/// Read-mostly authority table. Lookups never wait on the store; a refresh builds a new table
/// and swaps it in whole.
pub struct AuthorityCache {
	store: Option<Arc<dyn AuthorityStore>>,
	table: Snapshot<AuthorityTable>,
	default_source_weight: f64,
	default_type_weight: f64,
}
impl AuthorityCache {
	pub fn new(store: Option<Arc<dyn AuthorityStore>>, initial: AuthorityTable) -> Self {
		let default_source_weight = initial.default_source_weight;
		let default_type_weight = initial.default_type_weight;

		Self { store, table: Snapshot::new(initial), default_source_weight, default_type_weight }
	}

	pub fn table(&self) -> Arc<AuthorityTable> {
		self.table.load()
	}

	pub async fn refresh(&self) -> Result<AuthorityRefresh> {
		let Some(store) = self.store.as_ref() else {
			return Err(Error::Backend {
				message: "No authority store is configured.".to_string(),
			});
		};
		let table = self
			.table
			.refresh_with(|| async {
				let weights = store.load().await?;

				Ok::<_, Error>(self.build(weights))
			})
			.await?;
		let refresh = AuthorityRefresh {
			sources: table.sources.len(),
			document_types: table.document_types.len(),
		};

		tracing::info!(
			sources = refresh.sources,
			document_types = refresh.document_types,
			"Authority weights refreshed."
		);

		Ok(refresh)
	}

	fn build(&self, weights: AuthorityWeights) -> AuthorityTable {
		let mut table = AuthorityTable::empty(self.default_source_weight, self.default_type_weight);

		table.sources = clamp_weights(weights.sources, "source");
		table.document_types = clamp_weights(weights.document_types, "document_type");

		table
	}
}

fn clamp_weights(weights: HashMap<String, f64>, kind: &'static str) -> HashMap<String, f64> {
	weights
		.into_iter()
		.filter_map(|(key, weight)| {
			if !weight.is_finite() {
				tracing::warn!(kind, key = %key, "Skipping non-finite authority weight.");

				return None;
			}

			Some((key, weight.clamp(0.0, 1.0)))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::BoxFuture;

	struct FixedStore(AuthorityWeights);
	impl AuthorityStore for FixedStore {
		fn load(&self) -> BoxFuture<'_, Result<AuthorityWeights>> {
			let weights = self.0.clone();

			Box::pin(async move { Ok(weights) })
		}
	}

	struct DownStore;
	impl AuthorityStore for DownStore {
		fn load(&self) -> BoxFuture<'_, Result<AuthorityWeights>> {
			Box::pin(async { Err(Error::Storage { message: "connection refused".to_string() }) })
		}
	}

	#[tokio::test]
	async fn refresh_swaps_in_store_weights() {
		let mut weights = AuthorityWeights::default();

		weights.sources.insert("fda".to_string(), 1.0);
		weights.sources.insert("bad".to_string(), f64::NAN);
		weights.document_types.insert("label".to_string(), 1.4);

		let cache = AuthorityCache::new(Some(Arc::new(FixedStore(weights))), AuthorityTable::default());
		let before = cache.table();
		let refresh = cache.refresh().await.expect("Refresh must succeed.");
		let table = cache.table();

		assert_eq!(refresh, AuthorityRefresh { sources: 1, document_types: 1 });
		assert!(before.sources.is_empty());
		assert_eq!(table.sources.get("fda"), Some(&1.0));
		assert_eq!(table.document_types.get("label"), Some(&1.0));
	}

	#[tokio::test]
	async fn failed_refresh_keeps_previous_table() {
		let mut initial = AuthorityTable::default();

		initial.sources.insert("kept".to_string(), 0.9);

		let cache = AuthorityCache::new(Some(Arc::new(DownStore)), initial);

		assert!(cache.refresh().await.is_err());
		assert_eq!(cache.table().sources.get("kept"), Some(&0.9));
	}
}
