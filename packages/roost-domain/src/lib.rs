pub mod currency;
pub mod date_serde;
pub mod dynamic_field;
pub mod filter;
pub mod geo;
pub mod schedule;
pub mod search;
pub mod text;
pub mod unit;

pub use currency::Currency;
pub use dynamic_field::DynamicFieldFilter;
pub use geo::{GeoFilter, GeoPoint};
pub use schedule::{ScheduleEntry, ScheduleStatus, Stay};
pub use search::{
	FilterError, PriceRange, SearchFilters, SearchItem, SearchMeta, SearchQuery, SearchRequest,
	SearchResult, SortKey,
};
pub use unit::UnitDocument;
