use std::{
	collections::HashMap,
	sync::Arc,
	time::{Duration, Instant},
};

use serde::Serialize;

use crate::{ProfileStore, snapshot::Snapshot};
use graphrag_domain::{GraphView, ProfileOverrides, SearchProfile};

const MAX_CACHED_PROFILES: usize = 10_000;

/// Stored per-caller settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallerSettings {
	pub default_profile_id: Option<String>,
	pub overrides: ProfileOverrides,
	pub view: Option<GraphView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
	Override,
	CallerDefault,
	GlobalDefault,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
	pub profile: SearchProfile,
	pub view: Option<GraphView>,
	pub source: ProfileSource,
	/// Set when the store failed and the global default stood in.
	pub degraded: bool,
}
impl ResolvedProfile {
	/// Global default standing in for a failed or timed-out store. Never cached.
	pub fn fallback() -> Self {
		Self {
			profile: SearchProfile::global_default(),
			view: None,
			source: ProfileSource::GlobalDefault,
			degraded: true,
		}
	}
}

type CacheKey = (String, Option<String>);

#[derive(Clone)]
struct CachedProfile {
	resolved: ResolvedProfile,
	expires_at: Instant,
}

/// Resolves the effective profile for a caller: explicit override, then the caller's stored
/// default, then the global default, with the caller's field overrides layered on top.
/// Resolution never fails; store errors degrade to the global default.
pub struct ProfileResolver {
	store: Option<Arc<dyn ProfileStore>>,
	cache: Snapshot<HashMap<CacheKey, CachedProfile>>,
	ttl: Duration,
}
impl ProfileResolver {
	pub fn new(store: Option<Arc<dyn ProfileStore>>, ttl: Duration) -> Self {
		Self { store, cache: Snapshot::new(HashMap::new()), ttl }
	}

	pub async fn resolve_profile(&self, caller_id: &str, override_id: Option<&str>) -> SearchProfile {
		self.resolve(caller_id, override_id).await.profile
	}

	pub async fn resolve_view(&self, caller_id: &str) -> Option<GraphView> {
		self.resolve(caller_id, None).await.view
	}

	pub async fn resolve(&self, caller_id: &str, override_id: Option<&str>) -> ResolvedProfile {
		let key: CacheKey = (caller_id.to_string(), override_id.map(str::to_string));
		let now = Instant::now();

		if let Some(hit) = self.cache.load().get(&key)
			&& hit.expires_at > now
		{
			return hit.resolved.clone();
		}

		let Some(resolved) = self.resolve_uncached(caller_id, override_id).await else {
			return ResolvedProfile::fallback();
		};
		let entry = CachedProfile { resolved: resolved.clone(), expires_at: now + self.ttl };

		self.cache
			.update(|current| {
				let mut next: HashMap<CacheKey, CachedProfile> = current
					.iter()
					.filter(|(_, cached)| cached.expires_at > now)
					.map(|(key, cached)| (key.clone(), cached.clone()))
					.collect();

				if next.len() >= MAX_CACHED_PROFILES {
					next.clear();
				}

				next.insert(key, entry);

				next
			})
			.await;

		resolved
	}

	/// Drops every cached resolution. Returns how many entries were dropped.
	pub async fn invalidate(&self) -> usize {
		let dropped = self.cache.load().len();

		self.cache.replace(HashMap::new()).await;

		dropped
	}

	/// `None` means the store failed and the caller should fall back without caching.
	async fn resolve_uncached(
		&self,
		caller_id: &str,
		override_id: Option<&str>,
	) -> Option<ResolvedProfile> {
		let Some(store) = self.store.as_ref() else {
			return Some(ResolvedProfile {
				profile: SearchProfile::global_default(),
				view: None,
				source: ProfileSource::GlobalDefault,
				degraded: false,
			});
		};
		let caller = match store.caller(caller_id).await {
			Ok(caller) => caller.unwrap_or_default(),
			Err(err) => {
				tracing::warn!(caller_id, error = %err, "Caller settings lookup failed.");

				return None;
			},
		};
		let candidates = [
			(override_id, ProfileSource::Override),
			(caller.default_profile_id.as_deref(), ProfileSource::CallerDefault),
		];
		let mut base = None;

		for (profile_id, source) in candidates {
			let Some(profile_id) = profile_id else {
				continue;
			};

			match store.profile(profile_id).await {
				Ok(Some(profile)) => match profile.validate() {
					Ok(()) => {
						base = Some((profile, source));

						break;
					},
					Err(err) => {
						tracing::warn!(profile_id, error = %err, "Stored profile is invalid.");
					},
				},
				Ok(None) => {
					tracing::debug!(profile_id, "Profile not found.");
				},
				Err(err) => {
					tracing::warn!(profile_id, error = %err, "Profile lookup failed.");

					return None;
				},
			}
		}

		let (base, source) =
			base.unwrap_or_else(|| (SearchProfile::global_default(), ProfileSource::GlobalDefault));
		let profile = apply_overrides(caller_id, &caller.overrides, base);

		Some(ResolvedProfile { profile, view: caller.view, source, degraded: false })
	}
}

fn apply_overrides(
	caller_id: &str,
	overrides: &ProfileOverrides,
	base: SearchProfile,
) -> SearchProfile {
	if overrides.is_empty() {
		return base;
	}

	let applied = overrides.apply(base.clone());

	match applied.validate() {
		Ok(()) => applied,
		Err(err) => {
			tracing::warn!(caller_id, error = %err, "Caller overrides are invalid. Ignoring them.");

			base
		},
	}
}
