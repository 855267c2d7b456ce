use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Filter, PointId, Query, QueryPointsBuilder, ScoredPoint, Value as QdrantValue,
	point_id::PointIdOptions, value::Kind,
};
use serde_json::{Map, Number, Value};

use crate::{Error, Result};
use graphrag_config::Qdrant;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
	pub vector_name: Option<String>,
}
impl QdrantStore {
	pub fn new(cfg: &Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_dim: cfg.vector_dim,
			vector_name: cfg.vector_name.clone(),
		})
	}

	/// Nearest-neighbour query. Points scoring below `min_score` are dropped by Qdrant.
	pub async fn nearest(
		&self,
		vector: Vec<f32>,
		limit: u32,
		min_score: f32,
		filter: &Map<String, Value>,
	) -> Result<Vec<ScoredPoint>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"query vector has {} dimensions, collection expects {}",
				vector.len(),
				self.vector_dim
			)));
		}
		if limit == 0 {
			return Ok(Vec::new());
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.with_payload(true)
			.score_threshold(min_score)
			.limit(u64::from(limit));

		if let Some(name) = self.vector_name.as_ref() {
			search = search.using(name.clone());
		}
		if let Some(filter) = payload_filter(filter)? {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;

		Ok(response.result)
	}
}

/// Exact-match payload filter. Values must be strings, integers, booleans, or arrays of strings.
pub fn payload_filter(filter: &Map<String, Value>) -> Result<Option<Filter>> {
	if filter.is_empty() {
		return Ok(None);
	}

	let mut must = Vec::with_capacity(filter.len());

	for (key, value) in filter {
		let condition = match value {
			Value::String(text) => Condition::matches(key.clone(), text.clone()),
			Value::Bool(flag) => Condition::matches(key.clone(), *flag),
			Value::Number(number) => match number.as_i64() {
				Some(integer) => Condition::matches(key.clone(), integer),
				None =>
					return Err(Error::InvalidArgument(format!(
						"filter {key} must be an integer, not a float"
					))),
			},
			Value::Array(items) => {
				let mut keywords = Vec::with_capacity(items.len());

				for item in items {
					let Some(text) = item.as_str() else {
						return Err(Error::InvalidArgument(format!(
							"filter {key} arrays must contain only strings"
						)));
					};

					keywords.push(text.to_string());
				}

				Condition::matches(key.clone(), keywords)
			},
			_ =>
				return Err(Error::InvalidArgument(format!(
					"filter {key} has an unsupported value type"
				))),
		};

		must.push(condition);
	}

	Ok(Some(Filter::must(must)))
}

pub fn point_id_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(num)) => Some(num.to_string()),
		None => None,
	}
}

pub fn payload_string(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

/// Converts a whole payload into JSON, skipping `exclude` keys.
pub fn payload_json(payload: &HashMap<String, QdrantValue>, exclude: &[&str]) -> Map<String, Value> {
	let mut keys: Vec<&String> =
		payload.keys().filter(|key| !exclude.contains(&key.as_str())).collect();

	keys.sort();

	keys.into_iter().map(|key| (key.clone(), value_json(&payload[key]))).collect()
}

fn value_json(value: &QdrantValue) -> Value {
	match &value.kind {
		Some(Kind::StringValue(text)) => Value::String(text.clone()),
		Some(Kind::BoolValue(flag)) => Value::Bool(*flag),
		Some(Kind::IntegerValue(integer)) => Value::from(*integer),
		Some(Kind::DoubleValue(double)) =>
			Number::from_f64(*double).map(Value::Number).unwrap_or(Value::Null),
		Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(value_json).collect()),
		Some(Kind::StructValue(object)) => Value::Object(
			object.fields.iter().map(|(key, value)| (key.clone(), value_json(value))).collect(),
		),
		Some(Kind::NullValue(_)) | None => Value::Null,
	}
}
