use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Currencies a unit can be priced in. Search accepts at most one range per currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
	Yer,
	Usd,
	Eur,
	Sar,
	Gbp,
}
impl Currency {
	pub const ALL: [Self; 5] = [Self::Yer, Self::Usd, Self::Eur, Self::Sar, Self::Gbp];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Yer => "YER",
			Self::Usd => "USD",
			Self::Eur => "EUR",
			Self::Sar => "SAR",
			Self::Gbp => "GBP",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		let raw = raw.trim();

		Self::ALL.into_iter().find(|currency| currency.as_str().eq_ignore_ascii_case(raw))
	}
}
impl Display for Currency {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
