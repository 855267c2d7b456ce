//! RFC 3339 timestamps for response metadata.

use serde::Serializer;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	#[derive(serde::Serialize)]
	struct Stamp {
		#[serde(with = "super")]
		at: time::OffsetDateTime,
	}

	#[test]
	fn formats_rfc3339() {
		let json = serde_json::to_value(Stamp { at: datetime!(2026-03-01 08:30:00 UTC) })
			.expect("serialize failed");

		assert_eq!(json["at"], "2026-03-01T08:30:00Z");
	}
}
