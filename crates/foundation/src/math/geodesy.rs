//! WGS84 ellipsoid conversions between geodetic and earth-centered coordinates.

use super::Ecef;

/// Equatorial radius (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// Polar radius (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - FLATTENING);

const FLATTENING: f64 = 1.0 / 298.257_223_563;
const E2: f64 = FLATTENING * (2.0 - FLATTENING);
const EP2: f64 = E2 / (1.0 - E2);

/// Below this distance from the spin axis the point is treated as polar.
const POLAR_AXIS_EPS_M: f64 = 1e-3;

/// Latitude and longitude in radians, height above the ellipsoid in meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Geodetic {
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub alt_m: f64,
}

impl Geodetic {
    pub fn new(lat_rad: f64, lon_rad: f64, alt_m: f64) -> Self {
        Self { lat_rad, lon_rad, alt_m }
    }

    pub fn from_degrees(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self::new(lat_deg.to_radians(), lon_deg.to_radians(), alt_m)
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat_rad.to_degrees()
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon_rad.to_degrees()
    }
}

/// Prime vertical radius of curvature at latitude `sin_lat`.
fn prime_vertical_radius(sin_lat: f64) -> f64 {
    WGS84_A / (1.0 - E2 * sin_lat * sin_lat).sqrt()
}

pub fn geodetic_to_ecef(geo: Geodetic) -> Ecef {
    let (sin_lat, cos_lat) = geo.lat_rad.sin_cos();
    let (sin_lon, cos_lon) = geo.lon_rad.sin_cos();
    let n = prime_vertical_radius(sin_lat);
    let horizontal = (n + geo.alt_m) * cos_lat;

    Ecef::new(
        horizontal * cos_lon,
        horizontal * sin_lon,
        (n * (1.0 - E2) + geo.alt_m) * sin_lat,
    )
}

/// Closed-form inverse (Bowring). Sub-millimeter for anything near the surface.
pub fn ecef_to_geodetic(ecef: Ecef) -> Geodetic {
    let p = ecef.x.hypot(ecef.y);
    if p < POLAR_AXIS_EPS_M {
        let lat = std::f64::consts::FRAC_PI_2.copysign(ecef.z);
        return Geodetic::new(lat, 0.0, ecef.z.abs() - WGS84_B);
    }

    let lon = ecef.y.atan2(ecef.x);
    let (sin_t, cos_t) = (ecef.z * WGS84_A).atan2(p * WGS84_B).sin_cos();
    let lat = (ecef.z + EP2 * WGS84_B * sin_t.powi(3)).atan2(p - E2 * WGS84_A * cos_t.powi(3));
    let alt = p / lat.cos() - prime_vertical_radius(lat.sin());

    Geodetic::new(lat, lon, alt)
}
