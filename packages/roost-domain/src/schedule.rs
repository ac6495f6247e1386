use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::currency::Currency;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
	Available,
	Booked,
	Blocked,
	Maintenance,
	/// Any status string the booking workflows introduce later. Never bookable.
	Other(String),
}
impl ScheduleStatus {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Available => "available",
			Self::Booked => "booked",
			Self::Blocked => "blocked",
			Self::Maintenance => "maintenance",
			Self::Other(raw) => raw.as_str(),
		}
	}

	pub fn parse(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"available" => Self::Available,
			"booked" => Self::Booked,
			"blocked" => Self::Blocked,
			"maintenance" => Self::Maintenance,
			other => Self::Other(other.to_string()),
		}
	}

	pub fn is_available(&self) -> bool {
		matches!(self, Self::Available)
	}
}

/// One calendar day of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
	pub unit_id: Uuid,
	#[serde(with = "crate::date_serde")]
	pub date: Date,
	pub status: ScheduleStatus,
	pub amount: f64,
	pub currency: Currency,
	pub price_type: String,
}

/// Half-open stay `[check_in, check_out)`; the check-out day itself is not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
	#[serde(with = "crate::date_serde")]
	pub check_in: Date,
	#[serde(with = "crate::date_serde")]
	pub check_out: Date,
}
impl Stay {
	pub fn new(check_in: Date, check_out: Date) -> Option<Self> {
		(check_in < check_out).then_some(Self { check_in, check_out })
	}

	pub fn nights(&self) -> i64 {
		(self.check_out - self.check_in).whole_days()
	}

	pub fn contains(&self, date: Date) -> bool {
		self.check_in <= date && date < self.check_out
	}
}
