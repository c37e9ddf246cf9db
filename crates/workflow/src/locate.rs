//! Zoom to the user's current location.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use foundation::math::GeoCoord;
use futures_util::future::BoxFuture;
use globe::{CameraRig, CameraView};
use runtime::CancelToken;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

pub const LOCATE_ALTITUDE_M: f64 = 1_000.0;
pub const LOCATE_FLIGHT: Duration = Duration::from_secs(2);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GeolocationOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix that is still acceptable.
    pub maximum_age: Duration,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(15),
            maximum_age: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Position {
    pub coord: GeoCoord,
    pub accuracy_m: Option<f64>,
    pub captured_at: Instant,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("Geolocation is not supported on this device")]
    Unsupported,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for a position")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
}

pub trait Geolocator: Send + Sync {
    fn current_position(&self, options: GeolocationOptions) -> BoxFuture<'_, Result<Position, LocateError>>;
}

/// Reports a configured position, or `Unsupported` when none is set.
#[derive(Debug, Clone, Default)]
pub struct FixedGeolocator {
    position: Option<GeoCoord>,
}

impl FixedGeolocator {
    pub fn new(position: Option<GeoCoord>) -> Self {
        Self { position }
    }
}

impl Geolocator for FixedGeolocator {
    fn current_position(&self, _options: GeolocationOptions) -> BoxFuture<'_, Result<Position, LocateError>> {
        let position = self.position;
        Box::pin(async move {
            let coord = position.ok_or(LocateError::Unsupported)?;
            if !coord.is_valid() {
                return Err(LocateError::Unavailable(format!(
                    "invalid coordinate {}, {}",
                    coord.lat, coord.lon
                )));
            }
            Ok(Position {
                coord,
                accuracy_m: None,
                captured_at: Instant::now(),
            })
        })
    }
}

/// Resets the locating flag on every exit path.
struct LocatingGuard<'a>(&'a AtomicBool);

impl Drop for LocatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct LocateFlow {
    rig: Arc<dyn CameraRig>,
    geolocator: Arc<dyn Geolocator>,
    options: GeolocationOptions,
    locating: AtomicBool,
}

impl LocateFlow {
    pub fn new(rig: Arc<dyn CameraRig>, geolocator: Arc<dyn Geolocator>) -> Self {
        Self {
            rig,
            geolocator,
            options: GeolocationOptions::default(),
            locating: AtomicBool::new(false),
        }
    }

    pub fn with_options(mut self, options: GeolocationOptions) -> Self {
        self.options = options;
        self
    }

    /// `true` while a lookup is in progress; the locate control is disabled meanwhile.
    pub fn is_locating(&self) -> bool {
        self.locating.load(Ordering::SeqCst)
    }

    /// Looks up the current position and flies the camera there.
    pub async fn locate_and_fly(&self, cancel: &CancelToken) -> Result<GeoCoord, LocateError> {
        if self.locating.swap(true, Ordering::SeqCst) {
            return Err(LocateError::Unavailable("already locating".into()));
        }
        let _guard = LocatingGuard(&self.locating);

        let lookup = tokio::time::timeout(
            self.options.timeout,
            self.geolocator.current_position(self.options),
        );
        let position = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LocateError::Cancelled),
            result = lookup => match result {
                Ok(position) => position,
                Err(_) => Err(LocateError::Timeout),
            },
        }
        .inspect_err(|err| warn!(error = %err, "unable to get location"))?;

        if position.captured_at.elapsed() > self.options.maximum_age {
            warn!("cached position is too old");
            return Err(LocateError::Unavailable("cached position is too old".into()));
        }

        let coord = position.coord;
        info!(lat = coord.lat, lon = coord.lon, "located");
        if cancel.is_cancelled() {
            return Err(LocateError::Cancelled);
        }
        if self.rig.is_ready() {
            let view = CameraView::looking_down_at(coord, LOCATE_ALTITUDE_M);
            self.rig.fly_to(view, LOCATE_FLIGHT).await;
        } else {
            warn!("camera not ready; not flying to location");
        }
        Ok(coord)
    }
}
