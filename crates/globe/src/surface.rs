//! Seams between the globe and the workflows that drive it.
//!
//! [`GlobeSurface`] is the synchronous picking/entity API used by the drawing
//! workflow. [`CameraRig`] is the asynchronous camera API used by scripted
//! camera sequences: a flight resolves when the viewer reports it finished.

use std::time::Duration;

use futures_util::future::BoxFuture;
use foundation::math::Ecef;

use crate::camera::{CameraView, ScreenPoint};
use crate::entity::EntityId;

pub trait GlobeSurface {
    /// Ray-casts `screen` against the ellipsoid. `None` when the pixel misses the globe.
    fn pick_ground(&self, screen: ScreenPoint) -> Option<Ecef>;

    fn add_marker(&mut self, position: Ecef) -> EntityId;

    /// Adds a filled region bounded by `ring` (implicitly closed).
    fn add_polygon(&mut self, ring: &[Ecef]) -> EntityId;

    /// Returns `false` if the entity was already gone.
    fn remove_entity(&mut self, id: EntityId) -> bool;

    fn remove_all_entities(&mut self);

    /// Installs the click listener, replacing any previous one.
    fn install_click_listener(&mut self);

    fn uninstall_click_listener(&mut self);

    fn has_click_listener(&self) -> bool;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlightOutcome {
    Completed,
    /// Superseded by another flight, or the viewer went away mid-flight.
    Interrupted,
}

pub type FlightFuture = BoxFuture<'static, FlightOutcome>;

pub trait CameraRig: Send + Sync {
    /// `false` until the viewer has finished initializing, and after release.
    fn is_ready(&self) -> bool;

    fn current_view(&self) -> Option<CameraView>;

    /// Starts a flight. The future resolves from the viewer's flight-complete callback.
    fn fly_to(&self, view: CameraView, duration: Duration) -> FlightFuture;

    /// Freezes the camera where it is. A pending flight resolves as interrupted.
    fn stop_flight(&self);

    fn rotate_heading(&self, delta_rad: f64);
}
