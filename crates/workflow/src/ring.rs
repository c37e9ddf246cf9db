//! Ordering of captured boundary points into a ring.
//!
//! [`AngularSort`] sorts points by their angle around the centroid in planar
//! `(lon, lat)` degrees. The result is star-shaped around the centroid: always
//! simple for convex boundaries, but a concave boundary whose notch contains
//! the centroid loses the notch (see the `u_shape` test). [`ClickOrder`] keeps
//! the order the user clicked in.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use foundation::math::{Ecef, GeoCoord, Vec2, stable_total_cmp_f64};

pub trait RingOrdering: Send + Sync + fmt::Debug {
    /// Returns a permutation of `points`.
    fn order(&self, points: &[Ecef]) -> Vec<Ecef>;
}

#[derive(Debug, Default, Copy, Clone)]
pub struct AngularSort;

impl RingOrdering for AngularSort {
    fn order(&self, points: &[Ecef]) -> Vec<Ecef> {
        if points.len() <= 3 {
            return points.to_vec();
        }

        let projected: Vec<Vec2> = points
            .iter()
            .map(|p| GeoCoord::from_ecef(*p).as_lon_lat())
            .collect();
        let n = projected.len() as f64;
        let centroid = Vec2::new(
            projected.iter().map(|p| p.x).sum::<f64>() / n,
            projected.iter().map(|p| p.y).sum::<f64>() / n,
        );

        let mut keyed: Vec<(f64, Ecef)> = projected
            .iter()
            .zip(points)
            .map(|(p, original)| ((*p - centroid).angle(), *original))
            .collect();
        // Stable: points at equal angles keep their click order.
        keyed.sort_by(|a, b| stable_total_cmp_f64(a.0, b.0));
        keyed.into_iter().map(|(_, p)| p).collect()
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct ClickOrder;

impl RingOrdering for ClickOrder {
    fn order(&self, points: &[Ecef]) -> Vec<Ecef> {
        points.to_vec()
    }
}

/// Configured ring strategy.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum RingOrder {
    #[default]
    Angular,
    Click,
}

impl RingOrder {
    pub fn strategy(self) -> Arc<dyn RingOrdering> {
        match self {
            RingOrder::Angular => Arc::new(AngularSort),
            RingOrder::Click => Arc::new(ClickOrder),
        }
    }
}

impl FromStr for RingOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "angular" => Ok(RingOrder::Angular),
            "click" => Ok(RingOrder::Click),
            other => Err(format!("unknown ring order '{other}' (expected angular|click)")),
        }
    }
}
