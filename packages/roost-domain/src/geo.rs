use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lon: f64,
}
impl GeoPoint {
	pub fn is_valid(&self) -> bool {
		self.lat.is_finite()
			&& self.lon.is_finite()
			&& (-90.0..=90.0).contains(&self.lat)
			&& (-180.0..=180.0).contains(&self.lon)
	}

	pub fn distance_km(&self, other: &GeoPoint) -> f64 {
		distance_km(self.lat, self.lon, other.lat, other.lon)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
	pub center: GeoPoint,
	pub radius_km: f64,
}
impl GeoFilter {
	/// Distance from the center when `point` lies inside the radius.
	pub fn distance_within(&self, point: &GeoPoint) -> Option<f64> {
		let distance = self.center.distance_km(point);

		(distance <= self.radius_km).then_some(distance)
	}
}

/// Great-circle (haversine) distance in kilometres.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
	let d_lat = (lat2 - lat1).to_radians() / 2.0;
	let d_lon = (lon2 - lon1).to_radians() / 2.0;
	let a = d_lat.sin().powi(2) + lat1.to_radians().cos() * lat2.to_radians().cos() * d_lon.sin().powi(2);

	2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}
