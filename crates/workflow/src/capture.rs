//! Polygon capture state machine.
//!
//! ```text
//!  Idle ──start──▶ Drawing ──complete──▶ AwaitingConfirmation
//!   ▲               │  ▲ │                  │          │
//!   │               │  └─┘ click/point      │ confirm  │ reject
//!   └────cancel─────┘                       ▼          ▼
//!                                          Idle       Idle
//! ```
//!
//! The capture never touches the network. Every globe side effect goes through
//! the [`GlobeSurface`] passed in by the caller, which holds the viewer lock for
//! the duration of the call.

use std::sync::Arc;

use foundation::math::{Ecef, GeoCoord};
use globe::{EntityId, GlobeSurface, ScreenPoint};
use thiserror::Error;
use tracing::{debug, info};

use crate::ring::{AngularSort, RingOrdering};

pub const MIN_RING_POINTS: usize = 3;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Drawing,
    AwaitingConfirmation,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Please select at least 3 points to complete a polygon (have {have})")]
    TooFewPoints { have: usize },
    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: CaptureState,
    },
}

/// A confirmed boundary and its overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedPolygon {
    pub ring: Vec<Ecef>,
    pub coords: Vec<GeoCoord>,
    pub overlay: EntityId,
}

#[derive(Debug)]
pub struct PolygonCapture {
    ordering: Arc<dyn RingOrdering>,
    state: CaptureState,
    points: Vec<Ecef>,
    markers: Vec<EntityId>,
    pending: Option<CompletedPolygon>,
    completed: Vec<CompletedPolygon>,
}

impl Default for PolygonCapture {
    fn default() -> Self {
        Self::new(Arc::new(AngularSort))
    }
}

impl PolygonCapture {
    pub fn new(ordering: Arc<dyn RingOrdering>) -> Self {
        Self {
            ordering,
            state: CaptureState::Idle,
            points: Vec::new(),
            markers: Vec::new(),
            pending: None,
            completed: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn points(&self) -> &[Ecef] {
        &self.points
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Coordinates of the ring awaiting confirmation.
    pub fn pending_coords(&self) -> Option<&[GeoCoord]> {
        self.pending.as_ref().map(|p| p.coords.as_slice())
    }

    pub fn completed(&self) -> &[CompletedPolygon] {
        &self.completed
    }

    /// Begins a new drawing pass, discarding any points of the current one.
    pub fn start_drawing(&mut self, surface: &mut dyn GlobeSurface) -> Result<(), CaptureError> {
        if self.state == CaptureState::AwaitingConfirmation {
            return Err(self.invalid("start drawing"));
        }
        self.discard_session(surface);
        surface.install_click_listener();
        self.state = CaptureState::Drawing;
        info!("polygon drawing started");
        Ok(())
    }

    /// Handles a click on the globe. Returns the picked coordinate, or `None`
    /// when not drawing or when the click missed the ellipsoid.
    pub fn click(&mut self, surface: &mut dyn GlobeSurface, screen: ScreenPoint) -> Option<GeoCoord> {
        if self.state != CaptureState::Drawing {
            return None;
        }
        let Some(point) = surface.pick_ground(screen) else {
            debug!(x = screen.x, y = screen.y, "click missed the globe");
            return None;
        };
        self.point_picked(surface, point).ok()
    }

    /// Appends an already-resolved ground point and marks it on the globe.
    pub fn point_picked(
        &mut self,
        surface: &mut dyn GlobeSurface,
        point: Ecef,
    ) -> Result<GeoCoord, CaptureError> {
        if self.state != CaptureState::Drawing {
            return Err(self.invalid("add a point"));
        }
        self.markers.push(surface.add_marker(point));
        self.points.push(point);
        let coord = GeoCoord::from_ecef(point);
        debug!(lat = coord.lat, lon = coord.lon, count = self.points.len(), "point added");
        Ok(coord)
    }

    /// Closes the ring and renders it filled.
    ///
    /// With fewer than three points this fails and leaves the session as it was.
    pub fn complete(&mut self, surface: &mut dyn GlobeSurface) -> Result<Vec<GeoCoord>, CaptureError> {
        if self.state != CaptureState::Drawing {
            return Err(self.invalid("complete"));
        }
        if self.points.len() < MIN_RING_POINTS {
            return Err(CaptureError::TooFewPoints {
                have: self.points.len(),
            });
        }

        let ring = self.ordering.order(&self.points);
        let overlay = surface.add_polygon(&ring);
        let coords: Vec<GeoCoord> = ring.iter().map(|p| GeoCoord::from_ecef(*p)).collect();

        self.discard_session(surface);
        surface.uninstall_click_listener();
        self.pending = Some(CompletedPolygon {
            ring,
            coords: coords.clone(),
            overlay,
        });
        self.state = CaptureState::AwaitingConfirmation;
        info!(points = coords.len(), "polygon completed");
        Ok(coords)
    }

    /// Abandons the drawing pass.
    pub fn cancel(&mut self, surface: &mut dyn GlobeSurface) {
        if self.state != CaptureState::Drawing {
            return;
        }
        self.discard_session(surface);
        surface.uninstall_click_listener();
        self.state = CaptureState::Idle;
        info!("polygon drawing cancelled");
    }

    /// Accepts the pending ring; its coordinates go on to farm submission.
    pub fn confirm(&mut self) -> Result<Vec<GeoCoord>, CaptureError> {
        let Some(polygon) = self.pending.take() else {
            return Err(self.invalid("confirm"));
        };
        let coords = polygon.coords.clone();
        self.completed.push(polygon);
        self.state = CaptureState::Idle;
        Ok(coords)
    }

    /// Drops the pending ring and its overlay.
    pub fn reject(&mut self, surface: &mut dyn GlobeSurface) -> Result<(), CaptureError> {
        let Some(polygon) = self.pending.take() else {
            return Err(self.invalid("reject"));
        };
        surface.remove_entity(polygon.overlay);
        self.state = CaptureState::Idle;
        debug!("pending polygon rejected");
        Ok(())
    }

    /// Removes every overlay and marker and returns to idle from any state.
    pub fn clear_all(&mut self, surface: &mut dyn GlobeSurface) {
        surface.uninstall_click_listener();
        surface.remove_all_entities();
        self.points.clear();
        self.markers.clear();
        self.pending = None;
        self.completed.clear();
        self.state = CaptureState::Idle;
        info!("all polygons cleared");
    }

    fn discard_session(&mut self, surface: &mut dyn GlobeSurface) {
        for marker in self.markers.drain(..) {
            surface.remove_entity(marker);
        }
        self.points.clear();
    }

    fn invalid(&self, action: &'static str) -> CaptureError {
        CaptureError::InvalidState {
            action,
            state: self.state,
        }
    }
}
