use serde::Serialize;

const RANGE_SEPARATOR: &str = "..";
const MAX_KEY_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DynamicFieldFilter {
	Exact { key: String, value: String },
	Range { key: String, min: Option<f64>, max: Option<f64> },
}
impl DynamicFieldFilter {
	/// `"3..5"`, `"3.."` and `"..5"` are inclusive numeric ranges; anything else is exact.
	pub fn parse(key: &str, raw: &str) -> Result<Self, String> {
		let key = key.trim();

		if !is_valid_key(key) {
			return Err(format!(
				"dynamic field key '{key}' must be 1-{MAX_KEY_BYTES} ASCII letters, digits, '_' or '-'."
			));
		}

		let value = raw.trim();
		let Some((lower, upper)) = value.split_once(RANGE_SEPARATOR) else {
			return Ok(Self::Exact { key: key.to_string(), value: value.to_string() });
		};
		let min = parse_bound(key, lower)?;
		let max = parse_bound(key, upper)?;

		if min.is_none() && max.is_none() {
			return Err(format!("dynamic field '{key}' range needs at least one bound."));
		}
		if let (Some(min), Some(max)) = (min, max)
			&& min > max
		{
			return Err(format!("dynamic field '{key}' range minimum exceeds maximum."));
		}

		Ok(Self::Range { key: key.to_string(), min, max })
	}

	pub fn key(&self) -> &str {
		match self {
			Self::Exact { key, .. } | Self::Range { key, .. } => key,
		}
	}

	pub fn matches(&self, stored: Option<&str>) -> bool {
		let Some(stored) = stored else {
			return false;
		};

		match self {
			Self::Exact { value, .. } => stored.trim() == value,
			Self::Range { min, max, .. } => match parse_number(stored) {
				Some(number) => numeric_in_range(number, *min, *max),
				None => false,
			},
		}
	}
}

pub fn numeric_in_range(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
	min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}

/// Stored field values are free text; only finite decimal numbers take part in range tests.
pub fn parse_number(raw: &str) -> Option<f64> {
	raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_bound(key: &str, raw: &str) -> Result<Option<f64>, String> {
	let raw = raw.trim();

	if raw.is_empty() {
		return Ok(None);
	}

	parse_number(raw)
		.map(Some)
		.ok_or_else(|| format!("dynamic field '{key}' range bound '{raw}' is not a number."))
}

fn is_valid_key(key: &str) -> bool {
	!key.is_empty()
		&& key.len() <= MAX_KEY_BYTES
		&& key.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn two_dot_value_is_inclusive_range() {
		let filter = DynamicFieldFilter::parse("bedrooms", "3..5").expect("Valid range.");

		assert_eq!(
			filter,
			DynamicFieldFilter::Range { key: "bedrooms".to_string(), min: Some(3.0), max: Some(5.0) }
		);
		assert!(filter.matches(Some("3")));
		assert!(filter.matches(Some(" 5 ")));
		assert!(!filter.matches(Some("6")));
		assert!(!filter.matches(Some("three")));
		assert!(!filter.matches(None));
	}

	#[test]
	fn open_ended_ranges_are_supported() {
		let at_least = DynamicFieldFilter::parse("floor", "2..").expect("Valid range.");
		let at_most = DynamicFieldFilter::parse("floor", "..2").expect("Valid range.");

		assert!(at_least.matches(Some("10")));
		assert!(!at_least.matches(Some("1")));
		assert!(at_most.matches(Some("-1")));
		assert!(!at_most.matches(Some("2.5")));
	}

	#[test]
	fn plain_value_is_exact_match() {
		let filter = DynamicFieldFilter::parse("view", "sea").expect("Valid exact filter.");

		assert!(filter.matches(Some("sea")));
		assert!(!filter.matches(Some("Sea view")));
	}

	#[test]
	fn malformed_ranges_are_rejected() {
		assert!(DynamicFieldFilter::parse("bedrooms", "..").is_err());
		assert!(DynamicFieldFilter::parse("bedrooms", "a..5").is_err());
		assert!(DynamicFieldFilter::parse("bedrooms", "5..3").is_err());
		assert!(DynamicFieldFilter::parse("bed rooms", "3").is_err());
		assert!(DynamicFieldFilter::parse("bed.rooms", "3").is_err());
	}
}
