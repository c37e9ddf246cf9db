//! Analysis results view.
//!
//! The view is always resolvable from the farm id alone. Navigation state from
//! the map only stands in for the farm while the backend is unreachable, and
//! marks that the user came straight from creating it, in which case the first
//! analysis starts automatically.

use api::{Analysis, AnalysisStatus, ApiClient, ApiError, Farm, RecordId};
use tracing::{info, warn};

use crate::orchestrator::{
    ANALYSIS_FAILED_MESSAGE, NavigationState, PrefetchedAnalysis, ResultsRoute, prefetched_from,
};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load farm analysis data";

/// Most recent analysis by `created_at`, compared as instants regardless of
/// offset or fractional digits. The first of equal timestamps wins.
pub fn latest_analysis(analyses: &[Analysis]) -> Option<&Analysis> {
    analyses.iter().fold(None, |latest: Option<&Analysis>, current| match latest {
        Some(l) if current.created_at <= l.created_at => Some(l),
        _ => Some(current),
    })
}

/// What the "latest analysis" panel shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatestPanel<'a> {
    NoAnalysis,
    Completed(&'a serde_json::Value),
    InProgress,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    farm: Farm,
    analyses: Vec<Analysis>,
    latest: Option<Analysis>,
    error: Option<String>,
    placeholder: bool,
}

impl ResultsView {
    /// Loads the farm and its analysis history in parallel.
    pub async fn load(client: &ApiClient, farm_id: &RecordId) -> Result<Self, ApiError> {
        let (farm, analyses) =
            tokio::try_join!(client.get_farm(farm_id), client.analyses(farm_id))?;
        let latest = latest_analysis(&analyses).cloned();
        info!(%farm_id, analyses = analyses.len(), "results loaded");
        Ok(Self {
            farm,
            analyses,
            latest,
            error: None,
            placeholder: false,
        })
    }

    pub async fn open(client: &ApiClient, route: ResultsRoute) -> Result<Self, ApiError> {
        let ResultsRoute {
            farm_id,
            state,
            prefetched,
        } = route;

        let mut view = match Self::load(client, &farm_id).await {
            Ok(view) => view,
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized),
            Err(err) => match &state {
                Some(state) => {
                    warn!(%farm_id, error = %err, "showing farm from navigation state");
                    let mut view = Self::placeholder(state);
                    view.error = Some(LOAD_FAILED_MESSAGE.to_string());
                    view
                }
                None => return Err(err),
            },
        };

        match prefetched {
            Some(PrefetchedAnalysis::Running(task)) => {
                info!(%farm_id, "waiting for analysis started on the map");
                view.apply(prefetched_from(task.await));
            }
            Some(done) => view.apply(done),
            None if state.is_some() => {
                // Failure is recorded on the view.
                let _ = view.run_analysis(client).await;
            }
            None => {}
        }
        Ok(view)
    }

    fn placeholder(state: &NavigationState) -> Self {
        let name = if state.farm_name.trim().is_empty() {
            "New Farm".to_string()
        } else {
            state.farm_name.clone()
        };
        Self {
            farm: Farm {
                id: state.farm_id.clone(),
                name,
                centroid: state.coordinates.first().copied(),
                area_m2: None,
                created_at: None,
                coords: None,
            },
            analyses: Vec::new(),
            latest: None,
            error: None,
            placeholder: true,
        }
    }

    /// Runs a new analysis and puts it at the head of the history.
    pub async fn run_analysis(&mut self, client: &ApiClient) -> Result<&Analysis, ApiError> {
        info!(farm_id = %self.farm.id, "running analysis");
        match client.analyze_farm(&self.farm.id).await {
            Ok(analysis) => {
                self.error = None;
                Ok(self.insert(analysis))
            }
            Err(err) => {
                warn!(farm_id = %self.farm.id, error = %err, "analysis failed");
                self.error = Some(ANALYSIS_FAILED_MESSAGE.to_string());
                Err(err)
            }
        }
    }

    fn apply(&mut self, prefetched: PrefetchedAnalysis) {
        match prefetched {
            PrefetchedAnalysis::Ready(analysis) => {
                self.insert(analysis);
            }
            PrefetchedAnalysis::Failed(message) => self.error = Some(message),
            // Only reachable through `open`, which resolves it first.
            PrefetchedAnalysis::Running(task) => task.abort(),
        }
    }

    fn insert(&mut self, analysis: Analysis) -> &Analysis {
        self.analyses.retain(|a| a.id != analysis.id);
        self.analyses.insert(0, analysis.clone());
        self.latest.insert(analysis)
    }

    pub fn farm(&self) -> &Farm {
        &self.farm
    }

    pub fn analyses(&self) -> &[Analysis] {
        &self.analyses
    }

    pub fn latest(&self) -> Option<&Analysis> {
        self.latest.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `true` when the farm came from navigation state rather than the backend.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn badge(&self) -> Option<AnalysisStatus> {
        self.latest.as_ref().map(Analysis::effective_status)
    }

    pub fn latest_panel(&self) -> LatestPanel<'_> {
        let Some(latest) = &self.latest else {
            return LatestPanel::NoAnalysis;
        };
        match latest.effective_status() {
            AnalysisStatus::Completed if !latest.raw_llm_response.is_null() => {
                LatestPanel::Completed(&latest.raw_llm_response)
            }
            AnalysisStatus::Pending => LatestPanel::InProgress,
            _ => LatestPanel::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LOAD_FAILED_MESSAGE, LatestPanel, ResultsView, latest_analysis};
    use crate::orchestrator::{NavigationState, PrefetchedAnalysis, ResultsRoute};
    use api::mock::MockTransport;
    use api::{Analysis, AnalysisStatus, ApiClient, MemoryTokenStore, Method, RecordId, Tokens};
    use foundation::math::GeoCoord;
    use serde_json::json;
    use std::sync::Arc;

    fn client() -> (ApiClient, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Tokens {
            access: "a".into(),
            refresh: None,
        }));
        (ApiClient::new(transport.clone(), tokens), transport)
    }

    fn analysis_json(id: u32, created_at: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "farm": "f1",
            "status": status,
            "results": {"n": id},
            "created_at": created_at,
        })
    }

    fn farm_json() -> serde_json::Value {
        json!({"id": "f1", "name": "North Field", "centroid": {"lat": 1.0, "lon": 2.0}})
    }

    fn state() -> NavigationState {
        NavigationState {
            farm_id: RecordId::new("f1"),
            farm_name: "North Field".into(),
            coordinates: vec![GeoCoord::new(1.0, 2.0)],
        }
    }

    #[test]
    fn latest_is_max_created_at() {
        let analyses: Vec<Analysis> = serde_json::from_value(json!([
            analysis_json(1, "2024-05-01T00:00:00Z", "completed"),
            analysis_json(2, "2024-05-03T00:00:00Z", "failed"),
            analysis_json(3, "2024-05-02T00:00:00Z", "completed"),
            analysis_json(4, "2024-05-03T00:00:00Z", "completed"),
        ]))
        .expect("analyses");
        assert_eq!(latest_analysis(&analyses).map(|a| a.id.as_str()), Some("2"));
        assert!(latest_analysis(&[]).is_none());
    }

    #[test]
    fn latest_compares_instants_not_text() {
        let fractional: Vec<Analysis> = serde_json::from_value(json!([
            analysis_json(1, "2024-05-01T12:00:00.500000Z", "completed"),
            analysis_json(2, "2024-05-01T12:00:00Z", "completed"),
        ]))
        .expect("analyses");
        assert_eq!(latest_analysis(&fractional).map(|a| a.id.as_str()), Some("1"));

        // 13:00+02:00 is 11:00Z, an hour before the other one.
        let offsets: Vec<Analysis> = serde_json::from_value(json!([
            analysis_json(1, "2024-05-01T12:00:00Z", "completed"),
            analysis_json(2, "2024-05-01T13:00:00+02:00", "completed"),
        ]))
        .expect("analyses");
        assert_eq!(latest_analysis(&offsets).map(|a| a.id.as_str()), Some("1"));
    }

    #[tokio::test]
    async fn direct_link_loads_by_id() {
        let (client, transport) = client();
        transport.respond(Method::Get, "/farms/f1/", 200, farm_json());
        transport.respond(
            Method::Get,
            "/farms/f1/analyses/",
            200,
            json!([
                analysis_json(1, "2024-05-01T00:00:00Z", "completed"),
                analysis_json(2, "2024-05-02T00:00:00Z", "pending"),
            ]),
        );

        let view = ResultsView::open(&client, ResultsRoute::by_id(RecordId::new("f1")))
            .await
            .expect("view");
        assert_eq!(view.farm().name, "North Field");
        assert_eq!(view.analyses().len(), 2);
        assert_eq!(view.badge(), Some(AnalysisStatus::Pending));
        assert_eq!(view.latest_panel(), LatestPanel::InProgress);
        assert_eq!(transport.calls_to(Method::Post, "/farms/f1/analyze/"), 0);
    }

    #[tokio::test]
    async fn arriving_from_map_runs_first_analysis() {
        let (client, transport) = client();
        transport.respond(Method::Get, "/farms/f1/", 200, farm_json());
        transport.respond(Method::Get, "/farms/f1/analyses/", 200, json!([]));
        transport.respond(
            Method::Post,
            "/farms/f1/analyze/",
            201,
            analysis_json(9, "2024-05-04T00:00:00Z", "completed"),
        );

        let route = ResultsRoute {
            farm_id: RecordId::new("f1"),
            state: Some(state()),
            prefetched: None,
        };
        let view = ResultsView::open(&client, route).await.expect("view");
        assert_eq!(view.analyses().len(), 1);
        assert_eq!(view.latest_panel(), LatestPanel::Completed(&json!({"n": 9})));
        assert_eq!(view.error(), None);
    }

    #[tokio::test]
    async fn unreachable_backend_falls_back_to_navigation_state() {
        let (client, transport) = client();
        transport.fail(Method::Get, "/farms/f1/", "connection refused");
        transport.fail(Method::Get, "/farms/f1/analyses/", "connection refused");
        transport.fail(Method::Post, "/farms/f1/analyze/", "connection refused");

        let route = ResultsRoute {
            farm_id: RecordId::new("f1"),
            state: Some(state()),
            prefetched: None,
        };
        let view = ResultsView::open(&client, route).await.expect("view");
        assert!(view.is_placeholder());
        assert_eq!(view.farm().centroid, Some(GeoCoord::new(1.0, 2.0)));
        assert_eq!(view.latest_panel(), LatestPanel::NoAnalysis);
        // The failed auto-analysis replaces the load error.
        assert_eq!(view.error(), Some("Failed to run analysis"));
        assert_ne!(view.error(), Some(LOAD_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn direct_link_failure_is_an_error() {
        let (client, transport) = client();
        transport.fail(Method::Get, "/farms/f1/", "connection refused");
        let result = ResultsView::open(&client, ResultsRoute::by_id(RecordId::new("f1"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn prefetched_analysis_is_prepended_once() {
        let (client, transport) = client();
        transport.respond(Method::Get, "/farms/f1/", 200, farm_json());
        transport.respond(
            Method::Get,
            "/farms/f1/analyses/",
            200,
            json!([
                analysis_json(9, "2024-05-04T00:00:00Z", "completed"),
                analysis_json(1, "2024-05-01T00:00:00Z", "completed"),
            ]),
        );
        let ready: Analysis =
            serde_json::from_value(analysis_json(9, "2024-05-04T00:00:00Z", "completed")).expect("a");

        let route = ResultsRoute {
            farm_id: RecordId::new("f1"),
            state: Some(state()),
            prefetched: Some(PrefetchedAnalysis::Ready(ready)),
        };
        let view = ResultsView::open(&client, route).await.expect("view");
        let ids: Vec<&str> = view.analyses().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["9", "1"]);
        assert_eq!(transport.calls_to(Method::Post, "/farms/f1/analyze/"), 0);
    }

    #[tokio::test]
    async fn run_new_analysis_prepends_and_reports_failure() {
        let (client, transport) = client();
        transport.respond(Method::Get, "/farms/f1/", 200, farm_json());
        transport.respond(
            Method::Get,
            "/farms/f1/analyses/",
            200,
            json!([analysis_json(1, "2024-05-01T00:00:00Z", "completed")]),
        );
        transport
            .respond(
                Method::Post,
                "/farms/f1/analyze/",
                201,
                analysis_json(2, "2024-05-02T00:00:00Z", "completed"),
            )
            .respond(Method::Post, "/farms/f1/analyze/", 500, json!({}));

        let mut view = ResultsView::load(&client, &RecordId::new("f1")).await.expect("view");
        let new_id = view.run_analysis(&client).await.expect("analysis").id.clone();
        assert_eq!(new_id, RecordId::new("2"));
        assert_eq!(view.analyses()[0].id, new_id);
        assert_eq!(view.latest().map(|a| a.id.clone()), Some(new_id));

        assert!(view.run_analysis(&client).await.is_err());
        assert_eq!(view.error(), Some("Failed to run analysis"));
        assert_eq!(view.analyses().len(), 2);
    }
}
