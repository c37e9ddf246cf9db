//! Globe camera: a perspective eye positioned above the ellipsoid.
//!
//! The camera is placed at a geodetic position and oriented in the local
//! East-North-Up frame at that position:
//! - `heading` rotates clockwise from north toward east
//! - `pitch` is the elevation of the view direction (`-90°` looks straight down)
//!
//! Screen rays follow the usual pinhole model: pixel `(0, 0)` is the top-left
//! corner and the vertical field of view spans the viewport height.

use foundation::math::{Ecef, Geodetic, GeoCoord, Vec3, enu_basis, geodetic_to_ecef};

use crate::ellipsoid::Ray;

/// Vertical field of view used by the viewer (radians).
pub const DEFAULT_FOV_Y_RAD: f64 = std::f64::consts::FRAC_PI_3;

/// Wide view of the whole globe used as the "zoomed out" pose.
pub const DEFAULT_VIEW: CameraView = CameraView {
    lat_deg: 20.0,
    lon_deg: 0.0,
    height_m: 20_000_000.0,
    heading_rad: 0.0,
    pitch_rad: -std::f64::consts::FRAC_PI_2,
};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.width * 0.5, self.height * 0.5)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Camera pose: where the eye is and where it looks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraView {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub height_m: f64,
    pub heading_rad: f64,
    pub pitch_rad: f64,
}

impl CameraView {
    /// Looking straight down at `target` from `height_m`.
    pub fn looking_down_at(target: GeoCoord, height_m: f64) -> Self {
        Self {
            lat_deg: target.lat,
            lon_deg: target.lon,
            height_m,
            heading_rad: 0.0,
            pitch_rad: -std::f64::consts::FRAC_PI_2,
        }
    }

    pub fn target(&self) -> GeoCoord {
        GeoCoord::new(self.lat_deg, self.lon_deg)
    }

    /// Pose a fraction `t` (0..=1) of the way from `self` to `to`.
    ///
    /// Longitude and heading take the short way around.
    pub fn lerp(&self, to: &CameraView, t: f64) -> CameraView {
        let t = t.clamp(0.0, 1.0);
        CameraView {
            lat_deg: lerp(self.lat_deg, to.lat_deg, t),
            lon_deg: wrap_degrees(self.lon_deg + shortest_delta_deg(self.lon_deg, to.lon_deg) * t),
            height_m: lerp(self.height_m, to.height_m, t),
            heading_rad: wrap_radians(
                self.heading_rad + shortest_delta_rad(self.heading_rad, to.heading_rad) * t,
            ),
            pitch_rad: lerp(self.pitch_rad, to.pitch_rad, t),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    view: CameraView,
    viewport: Viewport,
    fov_y_rad: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(DEFAULT_VIEW, Viewport::default())
    }
}

impl Camera {
    pub fn new(view: CameraView, viewport: Viewport) -> Self {
        Self {
            view,
            viewport,
            fov_y_rad: DEFAULT_FOV_Y_RAD,
        }
    }

    pub fn view(&self) -> CameraView {
        self.view
    }

    pub fn set_view(&mut self, view: CameraView) {
        self.view = view;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Rotates the camera about its own vertical axis.
    pub fn rotate_heading(&mut self, delta_rad: f64) {
        self.view.heading_rad = wrap_radians(self.view.heading_rad + delta_rad);
    }

    pub fn eye(&self) -> Ecef {
        geodetic_to_ecef(self.geodetic())
    }

    /// Orthonormal `(forward, right, up)` camera axes in ECEF.
    pub fn axes(&self) -> (Vec3, Vec3, Vec3) {
        let basis = enu_basis(self.geodetic());
        let (sin_h, cos_h) = self.view.heading_rad.sin_cos();
        let (sin_p, cos_p) = self.view.pitch_rad.sin_cos();

        let horizontal = basis.north.scale(cos_h) + basis.east.scale(sin_h);
        let forward = horizontal.scale(cos_p) + basis.up.scale(sin_p);
        let right = basis.east.scale(cos_h) - basis.north.scale(sin_h);
        let up = right.cross(forward);
        (forward, right, up)
    }

    /// Ray from the eye through the given pixel.
    pub fn screen_ray(&self, screen: ScreenPoint) -> Option<Ray> {
        if !screen.x.is_finite() || !screen.y.is_finite() {
            return None;
        }
        let (forward, right, up) = self.axes();
        let tan_half = (self.fov_y_rad * 0.5).tan();
        let ndc_x = 2.0 * screen.x / self.viewport.width - 1.0;
        let ndc_y = 1.0 - 2.0 * screen.y / self.viewport.height;

        let dir = forward
            + right.scale(ndc_x * tan_half * self.viewport.aspect())
            + up.scale(ndc_y * tan_half);
        Some(Ray::new(self.eye().as_vec3(), dir.normalized()?))
    }

    /// Pixel a world point projects to, or `None` when it is behind the eye.
    pub fn project(&self, point: Ecef) -> Option<ScreenPoint> {
        let (forward, right, up) = self.axes();
        let v = point.as_vec3() - self.eye().as_vec3();
        let depth = v.dot(forward);
        if depth <= 0.0 {
            return None;
        }
        let tan_half = (self.fov_y_rad * 0.5).tan();
        let ndc_x = v.dot(right) / (depth * tan_half * self.viewport.aspect());
        let ndc_y = v.dot(up) / (depth * tan_half);
        Some(ScreenPoint::new(
            (ndc_x + 1.0) * 0.5 * self.viewport.width,
            (1.0 - ndc_y) * 0.5 * self.viewport.height,
        ))
    }

    fn geodetic(&self) -> Geodetic {
        Geodetic::from_degrees(self.view.lat_deg, self.view.lon_deg, self.view.height_m)
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && deg > 0.0 { 180.0 } else { wrapped }
}

fn shortest_delta_deg(from: f64, to: f64) -> f64 {
    (to - from + 180.0).rem_euclid(360.0) - 180.0
}

fn wrap_radians(rad: f64) -> f64 {
    rad.rem_euclid(std::f64::consts::TAU)
}

fn shortest_delta_rad(from: f64, to: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    (to - from + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::{Camera, CameraView, ScreenPoint, Viewport};
    use crate::ellipsoid::WGS84_ELLIPSOID;
    use foundation::math::GeoCoord;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn camera_over(lat: f64, lon: f64, height_m: f64) -> Camera {
        Camera::new(
            CameraView::looking_down_at(GeoCoord::new(lat, lon), height_m),
            Viewport::new(800.0, 600.0),
        )
    }

    #[test]
    fn center_pixel_picks_point_below_camera() {
        let camera = camera_over(45.0, 7.0, 5_000.0);
        let ray = camera.screen_ray(camera.viewport().center()).expect("ray");
        let hit = WGS84_ELLIPSOID.pick(ray).expect("hit");
        let coord = GeoCoord::from_ecef(hit);
        assert_close(coord.lat, 45.0, 1e-6);
        assert_close(coord.lon, 7.0, 1e-6);
    }

    #[test]
    fn top_of_screen_is_north_when_looking_down() {
        let camera = camera_over(0.0, 0.0, 10_000.0);
        let top = camera.screen_ray(ScreenPoint::new(400.0, 0.0)).expect("ray");
        let hit = GeoCoord::from_ecef(WGS84_ELLIPSOID.pick(top).expect("hit"));
        assert!(hit.lat > 0.0);
        assert_close(hit.lon, 0.0, 1e-9);
    }

    #[test]
    fn project_inverts_screen_ray() {
        let camera = camera_over(10.0, 20.0, 50_000.0);
        let target = GeoCoord::new(10.05, 20.1).to_ecef(0.0);
        let px = camera.project(target).expect("in front");
        let ray = camera.screen_ray(px).expect("ray");
        let hit = WGS84_ELLIPSOID.pick(ray).expect("hit");
        assert!(hit.distance(target) < 1e-3);
    }

    #[test]
    fn sky_pixel_misses_from_far_away() {
        let camera = camera_over(0.0, 0.0, 20_000_000.0);
        let corner = camera.screen_ray(ScreenPoint::new(0.0, 0.0)).expect("ray");
        assert!(WGS84_ELLIPSOID.pick(corner).is_none());
    }

    #[test]
    fn lerp_takes_short_way_across_antimeridian() {
        let a = CameraView::looking_down_at(GeoCoord::new(0.0, 170.0), 1000.0);
        let b = CameraView::looking_down_at(GeoCoord::new(0.0, -170.0), 1000.0);
        let mid = a.lerp(&b, 0.5);
        assert_close(mid.lon_deg.abs(), 180.0, 1e-9);
        assert_eq!(a.lerp(&b, 1.0).lon_deg, -170.0);
    }

    #[test]
    fn heading_rotation_wraps() {
        let mut camera = Camera::default();
        camera.rotate_heading(std::f64::consts::TAU + 0.25);
        assert_close(camera.view().heading_rad, 0.25, 1e-12);
    }
}
