use super::{Geodetic, Vec3};

/// Unit East, North and Up axes at `origin`, expressed in ECEF.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EnuBasis {
    pub east: Vec3,
    pub north: Vec3,
    pub up: Vec3,
}

/// Local tangent frame at `origin`. Only latitude and longitude matter.
pub fn enu_basis(origin: Geodetic) -> EnuBasis {
    let sin_lat = origin.lat_rad.sin();
    let cos_lat = origin.lat_rad.cos();
    let sin_lon = origin.lon_rad.sin();
    let cos_lon = origin.lon_rad.cos();

    EnuBasis {
        east: Vec3::new(-sin_lon, cos_lon, 0.0),
        north: Vec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
        up: Vec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat),
    }
}

#[cfg(test)]
mod tests {
    use super::enu_basis;
    use crate::math::Geodetic;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn basis_is_right_handed_at_equator() {
        let b = enu_basis(Geodetic::new(0.0, 0.0, 0.0));
        assert_close(b.east.y, 1.0, 1e-12);
        assert_close(b.north.z, 1.0, 1e-12);
        assert_close(b.up.x, 1.0, 1e-12);
        let up = b.east.cross(b.north);
        assert_close(up.dot(b.up), 1.0, 1e-12);
    }

    #[test]
    fn basis_is_orthonormal_off_axis() {
        let b = enu_basis(Geodetic::from_degrees(-33.9, 151.2, 40.0));
        for axis in [b.east, b.north, b.up] {
            assert_close(axis.dot(axis), 1.0, 1e-12);
        }
        assert_close(b.east.dot(b.north), 0.0, 1e-12);
        assert_close(b.north.dot(b.up), 0.0, 1e-12);
        assert_close(b.up.dot(b.east), 0.0, 1e-12);
        assert!(b.up.z < 0.0);
    }
}
