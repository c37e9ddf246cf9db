//! Headless globe viewer.
//!
//! The viewer is the single owner of the camera, the entity collection and the
//! click listener. It is shared through [`SharedViewer`] (one mutex, so flows
//! that draw, confirm and clear never interleave their edits) and its lifetime
//! is bounded by a [`ViewerLease`]: dropping the lease tears everything down.

use std::sync::Arc;
use std::time::Duration;

use foundation::math::Ecef;
use foundation::time::{Time, TimeSpan};
use parking_lot::{Mutex, MutexGuard};
use runtime::{CancelToken, FrameTicker};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::camera::{Camera, CameraView, DEFAULT_VIEW, ScreenPoint, Viewport};
use crate::ellipsoid::WGS84_ELLIPSOID;
use crate::entities::{Entity, EntityCollection, MarkerStyle, PolygonStyle};
use crate::entity::EntityId;
use crate::surface::{CameraRig, FlightFuture, FlightOutcome, GlobeSurface};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewerOptions {
    pub viewport: Viewport,
    pub initial_view: CameraView,
    pub marker_style: MarkerStyle,
    pub polygon_style: PolygonStyle,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            initial_view: DEFAULT_VIEW,
            marker_style: MarkerStyle::default(),
            polygon_style: PolygonStyle::default(),
        }
    }
}

#[derive(Debug)]
struct Flight {
    from: CameraView,
    to: CameraView,
    span: TimeSpan,
    done: Option<oneshot::Sender<FlightOutcome>>,
}

impl Flight {
    fn finish(mut self, outcome: FlightOutcome) {
        if let Some(done) = self.done.take() {
            // The awaiting side may have given up; nothing to do then.
            let _ = done.send(outcome);
        }
    }
}

#[derive(Debug)]
pub struct Viewer {
    camera: Camera,
    entities: EntityCollection,
    click_listener: bool,
    ready: bool,
    clock: Time,
    flight: Option<Flight>,
    marker_style: MarkerStyle,
    polygon_style: PolygonStyle,
}

impl Viewer {
    pub fn new(options: ViewerOptions) -> Self {
        Self {
            camera: Camera::new(options.initial_view, options.viewport),
            entities: EntityCollection::new(),
            click_listener: false,
            ready: true,
            clock: Time::ZERO,
            flight: None,
            marker_style: options.marker_style,
            polygon_style: options.polygon_style,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn entities(&self) -> &EntityCollection {
        &self.entities
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_flying(&self) -> bool {
        self.flight.is_some()
    }

    /// Starts a camera flight, interrupting any flight in progress.
    ///
    /// The receiver resolves when [`Viewer::advance`] carries the flight to its
    /// end. A zero duration jumps immediately.
    pub fn fly_to(
        &mut self,
        view: CameraView,
        duration: Duration,
    ) -> oneshot::Receiver<FlightOutcome> {
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self.flight.take() {
            debug!("camera flight interrupted by a new flight");
            previous.finish(FlightOutcome::Interrupted);
        }

        if duration.is_zero() {
            self.camera.set_view(view);
            let _ = tx.send(FlightOutcome::Completed);
            return rx;
        }

        debug!(
            lat = view.lat_deg,
            lon = view.lon_deg,
            height_m = view.height_m,
            secs = duration.as_secs_f64(),
            "camera flight started"
        );
        self.flight = Some(Flight {
            from: self.camera.view(),
            to: view,
            span: TimeSpan::starting_at(self.clock, duration.as_secs_f64()),
            done: Some(tx),
        });
        rx
    }

    /// Ends the flight in progress, leaving the camera at its current
    /// interpolated view. Returns `false` when nothing was flying.
    pub fn stop_flight(&mut self) -> bool {
        let Some(flight) = self.flight.take() else {
            return false;
        };
        debug!("camera flight stopped");
        flight.finish(FlightOutcome::Interrupted);
        true
    }

    /// Advances animation time by one frame.
    pub fn advance(&mut self, dt_s: f64) {
        self.clock = self.clock.advanced(dt_s.max(0.0));
        let Some(flight) = self.flight.as_ref() else {
            return;
        };

        let t = flight.span.progress(self.clock);
        if flight.span.is_finished(self.clock) {
            let to = flight.to;
            self.camera.set_view(to);
            if let Some(flight) = self.flight.take() {
                flight.finish(FlightOutcome::Completed);
            }
            debug!("camera flight completed");
            return;
        }
        let view = flight.from.lerp(&flight.to, smoothstep(t));
        self.camera.set_view(view);
    }

    /// Removes every entity and listener and interrupts any flight.
    fn teardown(&mut self) {
        self.click_listener = false;
        self.entities.remove_all();
        if let Some(flight) = self.flight.take() {
            flight.finish(FlightOutcome::Interrupted);
        }
        self.ready = false;
    }
}

impl GlobeSurface for Viewer {
    fn pick_ground(&self, screen: ScreenPoint) -> Option<Ecef> {
        let ray = self.camera.screen_ray(screen)?;
        WGS84_ELLIPSOID.pick(ray)
    }

    fn add_marker(&mut self, position: Ecef) -> EntityId {
        self.entities.add(Entity::Marker {
            position,
            style: self.marker_style,
        })
    }

    fn add_polygon(&mut self, ring: &[Ecef]) -> EntityId {
        self.entities.add(Entity::Polygon {
            ring: ring.to_vec(),
            style: self.polygon_style,
        })
    }

    fn remove_entity(&mut self, id: EntityId) -> bool {
        self.entities.remove(id)
    }

    fn remove_all_entities(&mut self) {
        self.entities.remove_all();
    }

    fn install_click_listener(&mut self) {
        if self.click_listener {
            debug!("replacing existing click listener");
        }
        self.click_listener = true;
    }

    fn uninstall_click_listener(&mut self) {
        self.click_listener = false;
    }

    fn has_click_listener(&self) -> bool {
        self.click_listener
    }
}

/// Handle to the one viewer instance. Clones share the same viewer.
#[derive(Debug, Clone)]
pub struct SharedViewer(Arc<Mutex<Viewer>>);

impl SharedViewer {
    pub fn lock(&self) -> MutexGuard<'_, Viewer> {
        self.0.lock()
    }
}

impl CameraRig for SharedViewer {
    fn is_ready(&self) -> bool {
        self.lock().is_ready()
    }

    fn current_view(&self) -> Option<CameraView> {
        let viewer = self.lock();
        viewer.is_ready().then(|| viewer.camera().view())
    }

    fn fly_to(&self, view: CameraView, duration: Duration) -> FlightFuture {
        let rx = self.lock().fly_to(view, duration);
        Box::pin(async move { rx.await.unwrap_or(FlightOutcome::Interrupted) })
    }

    fn stop_flight(&self) {
        self.lock().stop_flight();
    }

    fn rotate_heading(&self, delta_rad: f64) {
        self.lock().camera_mut().rotate_heading(delta_rad);
    }
}

/// Scoped ownership of the viewer.
///
/// Exactly one entity collection and at most one click listener exist per
/// lease. Dropping (or [`ViewerLease::release`]-ing) the lease stops the render
/// loop, uninstalls the listener, removes all entities and interrupts any
/// pending flight, so stale callbacks observe a released viewer instead of
/// mutating freed state.
#[derive(Debug)]
pub struct ViewerLease {
    viewer: SharedViewer,
    render_loop: Option<(CancelToken, JoinHandle<()>)>,
}

impl ViewerLease {
    pub fn acquire(options: ViewerOptions) -> Self {
        info!(
            width = options.viewport.width,
            height = options.viewport.height,
            "globe viewer acquired"
        );
        Self {
            viewer: SharedViewer(Arc::new(Mutex::new(Viewer::new(options)))),
            render_loop: None,
        }
    }

    pub fn viewer(&self) -> SharedViewer {
        self.viewer.clone()
    }

    /// Drives [`Viewer::advance`] once per animation frame until release.
    ///
    /// Must be called from within a tokio runtime. Calling it again is a no-op.
    pub fn start_render_loop(&mut self, frames_per_second: u32) {
        if self.render_loop.is_some() {
            return;
        }
        let cancel = CancelToken::new();
        let handle = tokio::spawn(render_loop(
            self.viewer.clone(),
            frames_per_second,
            cancel.clone(),
        ));
        self.render_loop = Some((cancel, handle));
    }

    pub fn release(self) {}
}

impl Drop for ViewerLease {
    fn drop(&mut self) {
        if let Some((cancel, _handle)) = self.render_loop.take() {
            cancel.cancel();
        }
        self.viewer.lock().teardown();
        info!("globe viewer released");
    }
}

async fn render_loop(viewer: SharedViewer, frames_per_second: u32, cancel: CancelToken) {
    let mut ticker = FrameTicker::new(frames_per_second);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = ticker.tick() => viewer.lock().advance(frame.dt_s),
        }
    }
    debug!("render loop stopped");
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::{SharedViewer, Viewer, ViewerLease, ViewerOptions};
    use crate::camera::{CameraView, ScreenPoint};
    use crate::surface::{CameraRig, FlightOutcome, GlobeSurface};
    use foundation::math::GeoCoord;
    use std::time::Duration;

    fn view_over(lat: f64, lon: f64) -> CameraView {
        CameraView::looking_down_at(GeoCoord::new(lat, lon), 2_000.0)
    }

    #[test]
    fn pick_ground_hits_and_misses() {
        let viewer = Viewer::new(ViewerOptions {
            initial_view: view_over(5.0, 5.0),
            ..ViewerOptions::default()
        });
        let center = viewer.camera().viewport().center();
        assert!(viewer.pick_ground(center).is_some());

        let far = Viewer::new(ViewerOptions::default());
        assert!(far.pick_ground(ScreenPoint::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn flight_completes_after_duration() {
        let mut viewer = Viewer::new(ViewerOptions::default());
        let mut rx = viewer.fly_to(view_over(1.0, 2.0), Duration::from_secs(1));
        viewer.advance(0.5);
        assert!(viewer.is_flying());
        assert!(rx.try_recv().is_err());
        viewer.advance(0.5);
        assert!(!viewer.is_flying());
        assert_eq!(rx.try_recv(), Ok(FlightOutcome::Completed));
        assert_eq!(viewer.camera().view(), view_over(1.0, 2.0));
    }

    #[test]
    fn new_flight_interrupts_previous() {
        let mut viewer = Viewer::new(ViewerOptions::default());
        let mut first = viewer.fly_to(view_over(1.0, 2.0), Duration::from_secs(1));
        let _second = viewer.fly_to(view_over(3.0, 4.0), Duration::from_secs(1));
        assert_eq!(first.try_recv(), Ok(FlightOutcome::Interrupted));
    }

    #[test]
    fn stopped_flight_holds_camera() {
        let mut viewer = Viewer::new(ViewerOptions::default());
        let mut rx = viewer.fly_to(view_over(1.0, 2.0), Duration::from_secs(2));
        viewer.advance(0.5);
        let midway = viewer.camera().view();

        assert!(viewer.stop_flight());
        assert_eq!(rx.try_recv(), Ok(FlightOutcome::Interrupted));
        viewer.advance(5.0);
        assert_eq!(viewer.camera().view(), midway);
        assert!(!viewer.stop_flight());
    }

    #[test]
    fn zero_duration_flight_jumps() {
        let mut viewer = Viewer::new(ViewerOptions::default());
        let mut rx = viewer.fly_to(view_over(1.0, 2.0), Duration::ZERO);
        assert_eq!(rx.try_recv(), Ok(FlightOutcome::Completed));
        assert!(!viewer.is_flying());
    }

    #[test]
    fn dropping_lease_tears_down_viewer() {
        let lease = ViewerLease::acquire(ViewerOptions::default());
        let shared: SharedViewer = lease.viewer();
        {
            let mut viewer = shared.lock();
            viewer.install_click_listener();
            let p = GeoCoord::new(0.0, 0.0).to_ecef(0.0);
            viewer.add_marker(p);
            viewer.add_polygon(&[p, p, p]);
        }
        let mut pending = shared.lock().fly_to(view_over(1.0, 1.0), Duration::from_secs(5));

        lease.release();

        let viewer = shared.lock();
        assert!(viewer.entities().is_empty());
        assert!(!viewer.has_click_listener());
        assert!(!viewer.is_ready());
        assert_eq!(pending.try_recv(), Ok(FlightOutcome::Interrupted));
    }

    #[tokio::test(start_paused = true)]
    async fn render_loop_resolves_rig_flights() {
        let mut lease = ViewerLease::acquire(ViewerOptions::default());
        lease.start_render_loop(60);
        let rig = lease.viewer();
        let outcome = rig.fly_to(view_over(10.0, 10.0), Duration::from_millis(500)).await;
        assert_eq!(outcome, FlightOutcome::Completed);
        assert_eq!(rig.current_view(), Some(view_over(10.0, 10.0)));
    }
}
