use foundation::math::{Ecef, Vec3, WGS84_A, WGS84_B};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir.scale(t)
    }
}

/// Axis-aligned ellipsoid centered at the ECEF origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ellipsoid {
    /// Equatorial radius (x and y axes), meters.
    pub equatorial_m: f64,
    /// Polar radius (z axis), meters.
    pub polar_m: f64,
}

pub const WGS84_ELLIPSOID: Ellipsoid = Ellipsoid {
    equatorial_m: WGS84_A,
    polar_m: WGS84_B,
};

impl Ellipsoid {
    /// Distance along the (normalized) ray to the nearest surface hit in front
    /// of the origin.
    ///
    /// A ray starting inside the ellipsoid returns its exit point. Returns
    /// `None` when the ray misses or the surface is entirely behind the origin.
    pub fn intersect(&self, ray: Ray) -> Option<f64> {
        let dir = ray.dir.normalized()?;

        // Scale space so the ellipsoid becomes the unit sphere.
        let inv = Vec3::new(
            1.0 / self.equatorial_m,
            1.0 / self.equatorial_m,
            1.0 / self.polar_m,
        );
        let o = Vec3::new(ray.origin.x * inv.x, ray.origin.y * inv.y, ray.origin.z * inv.z);
        let d = Vec3::new(dir.x * inv.x, dir.y * inv.y, dir.z * inv.z);

        let a = d.dot(d);
        let b = 2.0 * o.dot(d);
        let c = o.dot(o) - 1.0;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 || a <= 0.0 {
            return None;
        }

        let sqrt_disc = disc.sqrt();
        let t0 = (-b - sqrt_disc) / (2.0 * a);
        let t1 = (-b + sqrt_disc) / (2.0 * a);
        if t1 < 0.0 {
            return None;
        }
        Some(if t0 >= 0.0 { t0 } else { t1 })
    }

    /// Surface point hit by `ray`, if any.
    pub fn pick(&self, ray: Ray) -> Option<Ecef> {
        let t = self.intersect(ray)?;
        let dir = ray.dir.normalized()?;
        Some(Ecef::from(ray.origin + dir.scale(t)))
    }
}

#[cfg(test)]
mod tests {
    use super::{Ray, WGS84_ELLIPSOID};
    use foundation::math::{GeoCoord, Vec3, WGS84_A, WGS84_B};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn ray_toward_center_hits_equator() {
        let ray = Ray::new(Vec3::new(3.0 * WGS84_A, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let hit = WGS84_ELLIPSOID.pick(ray).expect("hit");
        assert_close(hit.x, WGS84_A, 1e-6);
        assert_close(hit.y, 0.0, 1e-6);
    }

    #[test]
    fn ray_toward_pole_hits_polar_radius() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 2.0 * WGS84_B), Vec3::new(0.0, 0.0, -5.0));
        let t = WGS84_ELLIPSOID.intersect(ray).expect("hit");
        assert_close(t, WGS84_B, 1e-6);
    }

    #[test]
    fn ray_pointing_away_misses() {
        let ray = Ray::new(Vec3::new(3.0 * WGS84_A, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(WGS84_ELLIPSOID.pick(ray).is_none());
    }

    #[test]
    fn ray_passing_beside_globe_misses() {
        let ray = Ray::new(
            Vec3::new(3.0 * WGS84_A, 2.0 * WGS84_A, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
        );
        assert!(WGS84_ELLIPSOID.pick(ray).is_none());
    }

    #[test]
    fn picked_point_converts_to_expected_coordinate() {
        let target = GeoCoord::new(10.0, 20.0);
        let surface = target.to_ecef(0.0).as_vec3();
        let above = target.to_ecef(1_000_000.0).as_vec3();
        let ray = Ray::new(above, surface - above);
        let hit = WGS84_ELLIPSOID.pick(ray).expect("hit");
        let coord = GeoCoord::from_ecef(hit);
        assert_close(coord.lat, 10.0, 1e-6);
        assert_close(coord.lon, 20.0, 1e-6);
    }
}
