//! Post-creation analysis sequence.
//!
//! Four stages run strictly one after another:
//! 1. zoom out to the home view (resolves on the flight-complete callback)
//! 2. spin the camera heading once per animation frame while "analyzing"
//! 3. fly to the farm centroid at a fixed altitude
//! 4. hand back an [`AnalyzeAction`] that navigates to the results view
//!
//! The [`CancelToken`] is checked before every stage and before every camera
//! side effect. Cancelling during a flight stops it where it is, so a
//! cancelled sequence never moves the camera again. A stage
//! whose camera is not ready resolves immediately as [`StageOutcome::Skipped`].
//!
//! With [`AnalyzeTiming::Eager`] the analysis request starts with the sequence
//! and the spin lasts until it finishes: never shorter than `spin_duration`,
//! never longer than `spin_max`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use api::{Analysis, ApiClient, ApiError, Farm, RecordId};
use foundation::math::{GeoCoord, mean_coord};
use futures_util::future::BoxFuture;
use globe::{CameraRig, CameraView, DEFAULT_VIEW, FlightOutcome};
use parking_lot::Mutex;
use runtime::{CancelToken, EventBus, FrameTicker};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to run analysis";

pub type AnalysisFuture = BoxFuture<'static, Result<Analysis, ApiError>>;
pub type AnalysisTask = JoinHandle<Result<Analysis, ApiError>>;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum AnalyzeTiming {
    /// Spin for a fixed time; analysis waits for the user to trigger it.
    #[default]
    Deferred,
    /// Start the analysis with the sequence and spin until it finishes.
    Eager,
}

impl FromStr for AnalyzeTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" => Ok(AnalyzeTiming::Deferred),
            "eager" => Ok(AnalyzeTiming::Eager),
            other => Err(format!("unknown analyze timing '{other}' (expected deferred|eager)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub home_view: CameraView,
    pub zoom_out_duration: Duration,
    pub spin_duration: Duration,
    pub spin_max: Duration,
    /// Heading increment applied once per animation frame (radians).
    pub heading_step_rad: f64,
    pub frames_per_second: u32,
    pub farm_altitude_m: f64,
    pub zoom_in_duration: Duration,
    pub timing: AnalyzeTiming,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            home_view: DEFAULT_VIEW,
            zoom_out_duration: Duration::from_secs(2),
            spin_duration: Duration::from_secs(8),
            spin_max: Duration::from_secs(30),
            heading_step_rad: 0.005,
            frames_per_second: 60,
            farm_altitude_m: 1_500.0,
            zoom_in_duration: Duration::from_secs(3),
            timing: AnalyzeTiming::Deferred,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    ZoomOut,
    Spin,
    ZoomToFarm,
    RevealAnalyze,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::ZoomOut => "zoom-out",
            Stage::Spin => "spin",
            Stage::ZoomToFarm => "zoom-to-farm",
            Stage::RevealAnalyze => "reveal-analyze",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// The camera was not ready; nothing happened.
    Skipped,
    /// The flight was superseded or the viewer went away mid-flight.
    Interrupted,
}

impl StageOutcome {
    pub fn name(self) -> &'static str {
        match self {
            StageOutcome::Completed => "completed",
            StageOutcome::Skipped => "skipped",
            StageOutcome::Interrupted => "interrupted",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Offset of the stage start from the start of the sequence.
    pub started_at: Duration,
    pub elapsed: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("analysis sequence cancelled before {0}")]
    Cancelled(Stage),
}

/// Analysis started during the sequence.
#[derive(Debug)]
pub enum PrefetchedAnalysis {
    Ready(Analysis),
    /// User-facing failure message.
    Failed(String),
    /// Still in flight when the spin hit its cap.
    Running(AnalysisTask),
}

/// Context handed to the results view for immediate display. The view never
/// depends on it: everything is re-resolvable from the farm id.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    pub farm_id: RecordId,
    pub farm_name: String,
    pub coordinates: Vec<GeoCoord>,
}

#[derive(Debug)]
pub struct ResultsRoute {
    pub farm_id: RecordId,
    pub state: Option<NavigationState>,
    pub prefetched: Option<PrefetchedAnalysis>,
}

impl ResultsRoute {
    /// Direct link: no navigation state.
    pub fn by_id(farm_id: RecordId) -> Self {
        Self {
            farm_id,
            state: None,
            prefetched: None,
        }
    }

    pub fn path(&self) -> String {
        format!("/analysis/{}", self.farm_id)
    }
}

/// The control revealed at the end of the sequence.
#[derive(Debug)]
pub struct AnalyzeAction {
    farm: Farm,
    coords: Vec<GeoCoord>,
    prefetched: Option<PrefetchedAnalysis>,
}

impl AnalyzeAction {
    pub fn farm(&self) -> &Farm {
        &self.farm
    }

    pub fn prefetched(&self) -> Option<&PrefetchedAnalysis> {
        self.prefetched.as_ref()
    }

    pub fn label(&self) -> &'static str {
        match self.prefetched {
            Some(PrefetchedAnalysis::Ready(_)) => "View Analysis",
            _ => "Analyze Farm",
        }
    }

    pub fn trigger(self) -> ResultsRoute {
        info!(farm_id = %self.farm.id, "navigating to analysis results");
        ResultsRoute {
            farm_id: self.farm.id.clone(),
            state: Some(NavigationState {
                farm_id: self.farm.id,
                farm_name: self.farm.name,
                coordinates: self.coords,
            }),
            prefetched: self.prefetched,
        }
    }
}

#[derive(Debug)]
pub struct OrchestrationReport {
    pub stages: Vec<StageReport>,
    pub action: AnalyzeAction,
}

impl OrchestrationReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

/// Aborts an analysis task that was not handed off.
struct TaskGuard(Option<AnalysisTask>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if let Some(task) = self.0.take() {
            task.abort();
        }
    }
}

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    rig: Arc<dyn CameraRig>,
    config: OrchestratorConfig,
    cancel: CancelToken,
    trace: Arc<Mutex<EventBus>>,
}

impl AnalysisOrchestrator {
    pub fn new(rig: Arc<dyn CameraRig>, config: OrchestratorConfig) -> Self {
        Self {
            rig,
            config,
            cancel: CancelToken::new(),
            trace: Arc::new(Mutex::new(EventBus::new())),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// `(kind, message)` of every traced event, in emission order.
    pub fn trace(&self) -> Vec<(&'static str, String)> {
        self.trace
            .lock()
            .events()
            .iter()
            .map(|e| (e.kind, e.message.clone()))
            .collect()
    }

    pub fn trace_position(&self, kind: &str, message: &str) -> Option<u64> {
        self.trace.lock().position(kind, message)
    }

    /// Runs the sequence for `farm`, starting the analysis up front when the
    /// configured timing is eager.
    pub async fn start(
        &self,
        client: &ApiClient,
        farm: Farm,
        coords: Vec<GeoCoord>,
    ) -> Result<OrchestrationReport, OrchestratorError> {
        match self.config.timing {
            AnalyzeTiming::Deferred => self.run(farm, coords).await,
            AnalyzeTiming::Eager => {
                let client = client.clone();
                let id = farm.id.clone();
                let request: AnalysisFuture = Box::pin(async move { client.analyze_farm(&id).await });
                self.run_eager(farm, coords, request).await
            }
        }
    }

    pub async fn run(
        &self,
        farm: Farm,
        coords: Vec<GeoCoord>,
    ) -> Result<OrchestrationReport, OrchestratorError> {
        self.run_inner(farm, coords, TaskGuard(None)).await
    }

    /// Like [`AnalysisOrchestrator::run`], with the spin tied to `request`.
    pub async fn run_eager(
        &self,
        farm: Farm,
        coords: Vec<GeoCoord>,
        request: AnalysisFuture,
    ) -> Result<OrchestrationReport, OrchestratorError> {
        self.check(Stage::ZoomOut)?;
        let task = TaskGuard(Some(tokio::spawn(request)));
        self.run_inner(farm, coords, task).await
    }

    async fn run_inner(
        &self,
        farm: Farm,
        coords: Vec<GeoCoord>,
        mut task: TaskGuard,
    ) -> Result<OrchestrationReport, OrchestratorError> {
        let run_start = Instant::now();
        let mut stages = Vec::with_capacity(4);
        info!(farm_id = %farm.id, "analysis sequence started");

        // 1. zoom out
        let stage_start = self.begin(Stage::ZoomOut)?;
        let outcome = self
            .fly(Stage::ZoomOut, self.config.home_view, self.config.zoom_out_duration)
            .await?;
        stages.push(self.end(Stage::ZoomOut, outcome, run_start, stage_start));

        // 2. spin
        let stage_start = self.begin(Stage::Spin)?;
        let (outcome, prefetched) = self.spin(&mut task).await?;
        stages.push(self.end(Stage::Spin, outcome, run_start, stage_start));

        // 3. zoom to farm
        let stage_start = self.begin(Stage::ZoomToFarm)?;
        let target = farm.centroid.or_else(|| mean_coord(&coords));
        let outcome = match target.filter(|c| c.is_valid()) {
            Some(target) => {
                let view = CameraView::looking_down_at(target, self.config.farm_altitude_m);
                self.fly(Stage::ZoomToFarm, view, self.config.zoom_in_duration)
                    .await?
            }
            None => {
                warn!(farm_id = %farm.id, "farm has no usable centroid; not zooming");
                StageOutcome::Skipped
            }
        };
        stages.push(self.end(Stage::ZoomToFarm, outcome, run_start, stage_start));

        // 4. reveal
        let stage_start = self.begin(Stage::RevealAnalyze)?;
        let action = AnalyzeAction {
            farm,
            coords,
            prefetched,
        };
        stages.push(self.end(
            Stage::RevealAnalyze,
            StageOutcome::Completed,
            run_start,
            stage_start,
        ));
        info!(elapsed_ms = run_start.elapsed().as_millis() as u64, "analysis sequence finished");
        Ok(OrchestrationReport { stages, action })
    }

    async fn fly(
        &self,
        stage: Stage,
        view: CameraView,
        duration: Duration,
    ) -> Result<StageOutcome, OrchestratorError> {
        if !self.rig.is_ready() {
            warn!(%stage, "camera not ready; skipping stage");
            return Ok(StageOutcome::Skipped);
        }
        self.check(stage)?;
        let flight = self.rig.fly_to(view, duration);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.rig.stop_flight();
                Err(OrchestratorError::Cancelled(stage))
            }
            outcome = flight => Ok(match outcome {
                FlightOutcome::Completed => StageOutcome::Completed,
                FlightOutcome::Interrupted => StageOutcome::Interrupted,
            }),
        }
    }

    async fn spin(
        &self,
        task: &mut TaskGuard,
    ) -> Result<(StageOutcome, Option<PrefetchedAnalysis>), OrchestratorError> {
        if !self.rig.is_ready() {
            warn!(stage = %Stage::Spin, "camera not ready; skipping stage");
            return Ok((StageOutcome::Skipped, task.0.take().map(PrefetchedAnalysis::Running)));
        }

        let min = self.config.spin_duration;
        let max = self.config.spin_max.max(min);
        let started = Instant::now();
        let mut ticker = FrameTicker::new(self.config.frames_per_second);
        let mut finished = None;
        let mut frames = 0u64;

        loop {
            let elapsed = started.elapsed();
            if elapsed >= max || (elapsed >= min && task.0.is_none()) {
                break;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(OrchestratorError::Cancelled(Stage::Spin)),
                joined = join_pending(&mut task.0), if task.0.is_some() => {
                    task.0 = None;
                    debug!(after_ms = started.elapsed().as_millis() as u64, "analysis finished during spin");
                    finished = Some(prefetched_from(joined));
                }
                _ = ticker.tick() => {
                    if self.cancel.is_cancelled() {
                        return Err(OrchestratorError::Cancelled(Stage::Spin));
                    }
                    self.rig.rotate_heading(self.config.heading_step_rad);
                    frames += 1;
                }
            }
        }

        if task.0.is_some() {
            warn!(cap_s = max.as_secs_f64(), "analysis still running at spin cap");
        }
        debug!(frames, "spin finished");
        let prefetched = finished.or_else(|| task.0.take().map(PrefetchedAnalysis::Running));
        Ok((StageOutcome::Completed, prefetched))
    }

    fn check(&self, stage: Stage) -> Result<(), OrchestratorError> {
        if self.cancel.is_cancelled() {
            info!(%stage, "analysis sequence cancelled");
            self.trace.lock().emit("cancelled", stage.name());
            return Err(OrchestratorError::Cancelled(stage));
        }
        Ok(())
    }

    fn begin(&self, stage: Stage) -> Result<Instant, OrchestratorError> {
        self.check(stage)?;
        self.trace.lock().emit("stage-start", stage.name());
        debug!(%stage, "stage started");
        Ok(Instant::now())
    }

    fn end(
        &self,
        stage: Stage,
        outcome: StageOutcome,
        run_start: Instant,
        stage_start: Instant,
    ) -> StageReport {
        self.trace
            .lock()
            .emit("stage-end", format!("{}:{}", stage.name(), outcome.name()));
        let report = StageReport {
            stage,
            outcome,
            started_at: stage_start.duration_since(run_start),
            elapsed: stage_start.elapsed(),
        };
        debug!(%stage, outcome = outcome.name(), elapsed_ms = report.elapsed.as_millis() as u64, "stage finished");
        report
    }
}

async fn join_pending(
    task: &mut Option<AnalysisTask>,
) -> Result<Result<Analysis, ApiError>, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

pub(crate) fn prefetched_from(
    joined: Result<Result<Analysis, ApiError>, JoinError>,
) -> PrefetchedAnalysis {
    match joined {
        Ok(Ok(analysis)) => PrefetchedAnalysis::Ready(analysis),
        Ok(Err(err)) => {
            warn!(error = %err, "analysis request failed");
            PrefetchedAnalysis::Failed(err.user_message(ANALYSIS_FAILED_MESSAGE))
        }
        Err(err) => {
            warn!(error = %err, "analysis task did not finish");
            PrefetchedAnalysis::Failed(ANALYSIS_FAILED_MESSAGE.to_string())
        }
    }
}
