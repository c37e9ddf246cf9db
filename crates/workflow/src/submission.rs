//! Farm submission: validates the form locally, then creates the farm.

use api::{ApiClient, ApiError, CreateFarmRequest, Farm};
use foundation::math::GeoCoord;
use thiserror::Error;
use tracing::{info, warn};

use crate::capture::MIN_RING_POINTS;

pub const CREATE_FAILED_MESSAGE: &str = "Failed to create farm";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Farm name is required")]
    FarmNameRequired,
    #[error("At least 3 coordinates are required to create a farm")]
    InsufficientCoordinates { have: usize },
    /// The request was sent and failed. `message` is what the user sees.
    #[error("{message}")]
    Request {
        message: String,
        #[source]
        source: ApiError,
    },
}

impl SubmissionError {
    pub fn is_validation(&self) -> bool {
        !matches!(self, SubmissionError::Request { .. })
    }
}

/// Fields of the create-farm form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FarmForm {
    pub name: String,
    /// Free-form notes. Kept on the form only; the backend does not take it.
    pub description: String,
}

impl FarmForm {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.description.clear();
    }
}

#[derive(Clone)]
pub struct FarmSubmission {
    client: ApiClient,
}

impl FarmSubmission {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Creates a farm from a confirmed ring.
    ///
    /// Validation failures return before any request is made. On success the
    /// form is cleared; on failure it is left as typed so the user can retry.
    pub async fn submit(
        &self,
        form: &mut FarmForm,
        coords: &[GeoCoord],
    ) -> Result<Farm, SubmissionError> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(SubmissionError::FarmNameRequired);
        }
        if coords.len() < MIN_RING_POINTS {
            return Err(SubmissionError::InsufficientCoordinates { have: coords.len() });
        }

        let request = CreateFarmRequest::from_coords(name, coords);
        info!(name = %request.name, points = request.coords.len(), "creating farm");
        match self.client.create_farm(&request).await {
            Ok(farm) => {
                info!(farm_id = %farm.id, "farm created");
                form.clear();
                Ok(farm)
            }
            Err(source) => {
                let message = source
                    .server_message()
                    .unwrap_or(CREATE_FAILED_MESSAGE)
                    .to_string();
                warn!(error = %source, %message, "farm creation failed");
                Err(SubmissionError::Request { message, source })
            }
        }
    }
}
