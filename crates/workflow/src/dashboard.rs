use api::{ApiClient, ApiError, Farm};
use tracing::info;

pub const NO_FARMS_HINT: &str = "No farms found. Please create your first farm to get started!";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub farms: Vec<Farm>,
}

impl DashboardSummary {
    pub async fn load(client: &ApiClient) -> Result<Self, ApiError> {
        let farms = client.list_farms().await?;
        info!(count = farms.len(), "farms loaded");
        Ok(Self { farms })
    }

    pub fn farm_count(&self) -> usize {
        self.farms.len()
    }

    /// Shown instead of the list when the user has no farms yet.
    pub fn hint(&self) -> Option<&'static str> {
        self.farms.is_empty().then_some(NO_FARMS_HINT)
    }
}
