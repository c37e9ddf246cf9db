//! Geographic coordinates in degrees.
//!
//! `GeoCoord` is the user-facing form of a point on the globe: what gets shown
//! in coordinate lists and what is sent to the backend. Conversion from ECEF goes
//! through the WGS84 cartographic conversion in [`super::geodesy`] followed by
//! radians-to-degrees scaling; height is dropped.

use serde::{Deserialize, Serialize};

use super::{Ecef, Geodetic, Vec2, ecef_to_geodetic, geodetic_to_ecef};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn from_ecef(point: Ecef) -> Self {
        let geo = ecef_to_geodetic(point);
        Self::new(geo.lat_deg(), geo.lon_deg())
    }

    /// Point on the ellipsoid surface (or `alt_m` above it).
    pub fn to_ecef(self, alt_m: f64) -> Ecef {
        geodetic_to_ecef(Geodetic::from_degrees(self.lat, self.lon, alt_m))
    }

    /// Planar `(x = lon, y = lat)` projection in degrees.
    pub fn as_lon_lat(self) -> Vec2 {
        Vec2::new(self.lon, self.lat)
    }

    /// `[lat, lon]` pair, the order the farms API expects.
    pub fn as_lat_lon_pair(self) -> [f64; 2] {
        [self.lat, self.lon]
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180].
    ///
    /// Conversions never clamp; callers that care check this explicitly.
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Arithmetic mean of a set of coordinates. `None` for an empty slice.
pub fn mean_coord(coords: &[GeoCoord]) -> Option<GeoCoord> {
    if coords.is_empty() {
        return None;
    }
    let n = coords.len() as f64;
    let lat = coords.iter().map(|c| c.lat).sum::<f64>() / n;
    let lon = coords.iter().map(|c| c.lon).sum::<f64>() / n;
    Some(GeoCoord::new(lat, lon))
}
