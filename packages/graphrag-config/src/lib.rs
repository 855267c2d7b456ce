mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Authority, Config, Context, EmbeddingProviderConfig, Entities, Postgres, Profiles,
	ProviderConfig, Providers, Qdrant, Rerank, RerankLocal, Search, SearchGraph, SearchKeyword,
	Security, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.admin_bind", &cfg.service.admin_bind),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
		("storage.qdrant.url", &cfg.storage.qdrant.url),
		("storage.qdrant.collection", &cfg.storage.qdrant.collection),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	for (label, timeout_ms) in [
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.rerank.timeout_ms", cfg.providers.rerank.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if let Some(extractor) = cfg.providers.entity_extractor.as_ref()
		&& extractor.timeout_ms == 0
	{
		return Err(Error::Validation {
			message: "providers.entity_extractor.timeout_ms must be greater than zero.".to_string(),
		});
	}

	validate_search(cfg)?;
	validate_authority(cfg)?;

	if cfg.context.chars_per_token == 0 {
		return Err(Error::Validation {
			message: "context.chars_per_token must be greater than zero.".to_string(),
		});
	}

	for (term, entity_type) in &cfg.entities.dictionary {
		if term.trim().is_empty() || entity_type.trim().is_empty() {
			return Err(Error::Validation {
				message: "entities.dictionary terms and types must be non-empty.".to_string(),
			});
		}
	}

	Ok(())
}

fn validate_search(cfg: &Config) -> Result<()> {
	let search = &cfg.search;

	if search.request_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.request_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if search.modality_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.modality_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if search.modality_timeout_ms > search.request_timeout_ms {
		return Err(Error::Validation {
			message: "search.modality_timeout_ms must not exceed search.request_timeout_ms."
				.to_string(),
		});
	}
	if search.rrf_k == 0 {
		return Err(Error::Validation {
			message: "search.rrf_k must be greater than zero.".to_string(),
		});
	}
	if search.max_query_chars == 0 {
		return Err(Error::Validation {
			message: "search.max_query_chars must be greater than zero.".to_string(),
		});
	}
	if search.keyword.text_search_config.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.keyword.text_search_config must be non-empty.".to_string(),
		});
	}
	if search.graph.default_max_hops == 0 {
		return Err(Error::Validation {
			message: "search.graph.default_max_hops must be greater than zero.".to_string(),
		});
	}
	if search.graph.default_max_results == 0 {
		return Err(Error::Validation {
			message: "search.graph.default_max_results must be greater than zero.".to_string(),
		});
	}
	if search.graph.seeds_per_entity == 0 {
		return Err(Error::Validation {
			message: "search.graph.seeds_per_entity must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_authority(cfg: &Config) -> Result<()> {
	for (label, weight) in [
		("authority.default_source_weight", cfg.authority.default_source_weight),
		("authority.default_type_weight", cfg.authority.default_type_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&weight) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.authority.refresh_interval_secs == 0 {
		return Err(Error::Validation {
			message: "authority.refresh_interval_secs must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.providers.rerank.api_key = cfg.providers.rerank.api_key.trim().to_string();

	if cfg
		.providers
		.entity_extractor
		.as_ref()
		.map(|extractor| extractor.api_base.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.entity_extractor = None;
	}
	if let Some(extractor) = cfg.providers.entity_extractor.as_mut() {
		extractor.api_key = extractor.api_key.trim().to_string();
	}
	if cfg.rerank.local.tokenizer_path.as_deref().map(|path| path.trim().is_empty()).unwrap_or(false)
	{
		cfg.rerank.local.tokenizer_path = None;
	}
	if cfg.storage.qdrant.vector_name.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false)
	{
		cfg.storage.qdrant.vector_name = None;
	}

	cfg.entities.dictionary = std::mem::take(&mut cfg.entities.dictionary)
		.into_iter()
		.map(|(term, entity_type)| (term.trim().to_string(), entity_type.trim().to_string()))
		.collect();
}
