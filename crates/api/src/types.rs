//! Wire types of the farms backend.
//!
//! Field names follow the backend's JSON exactly. Identifiers are carried as
//! strings; the backend has served both numeric and string ids, so
//! [`RecordId`] accepts either on input.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use foundation::math::GeoCoord;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RegistrationError;

/// RFC 3339 timestamp as the backend sends it. Keeps the original offset;
/// comparisons are by instant.
pub type Timestamp = DateTime<FixedOffset>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => RecordId(s),
            Raw::Number(n) => RecordId(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub centroid: Option<GeoCoord>,
    #[serde(default)]
    pub area_m2: Option<f64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Boundary as `[lat, lon]` pairs, when the backend echoes it back.
    #[serde(default, alias = "coordinates", skip_serializing_if = "Option::is_none")]
    pub coords: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFarmRequest {
    pub name: String,
    /// `[lat, lon]` pairs, latitude first.
    pub coords: Vec<[f64; 2]>,
}

impl CreateFarmRequest {
    pub fn from_coords(name: impl Into<String>, coords: &[GeoCoord]) -> Self {
        Self {
            name: name.into(),
            coords: coords.iter().map(|c| c.as_lat_lon_pair()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateFarmRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coords: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Completed,
    Pending,
    Failed,
}

impl AnalysisStatus {
    pub fn label(self) -> &'static str {
        match self {
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: RecordId,
    pub farm: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AnalysisStatus>,
    /// Model output. Older backends send this as `results`.
    #[serde(default, alias = "results")]
    pub raw_llm_response: serde_json::Value,
    pub created_at: Timestamp,
}

impl Analysis {
    /// Status shown on the results badge.
    ///
    /// Records without an explicit status count as completed once they carry a
    /// response and as pending otherwise.
    pub fn effective_status(&self) -> AnalysisStatus {
        match self.status {
            Some(status) => status,
            None if self.raw_llm_response.is_null() => AnalysisStatus::Pending,
            None => AnalysisStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl RegisterRequest {
    pub const MIN_PASSWORD_LEN: usize = 6;

    /// Checks the form in the order the fields are presented.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(RegistrationError::MissingCredentials);
        }
        if self.email.trim().is_empty() {
            return Err(RegistrationError::MissingEmail);
        }
        if self.password != self.password_confirm {
            return Err(RegistrationError::PasswordMismatch);
        }
        if self.password.chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(RegistrationError::PasswordTooShort);
        }
        Ok(())
    }
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_id: Option<RecordId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub assistant: String,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub conversation_id: String,
    pub messages: Vec<ChatMessage>,
}

#[cfg(test)]
mod tests {
    use super::{Analysis, AnalysisStatus, CreateFarmRequest, Farm, RecordId, RegisterRequest};
    use crate::error::RegistrationError;
    use foundation::math::GeoCoord;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn farm_accepts_numeric_id_and_legacy_coordinates() {
        let farm: Farm = serde_json::from_value(json!({
            "id": 42,
            "name": "North Field",
            "coordinates": [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        }))
        .expect("farm");
        assert_eq!(farm.id, RecordId::new("42"));
        assert_eq!(farm.centroid, None);
        assert_eq!(farm.coords.map(|c| c.len()), Some(3));
    }

    #[test]
    fn farm_reads_centroid() {
        let farm: Farm = serde_json::from_value(json!({
            "id": "f-1",
            "name": "A",
            "centroid": {"lat": 10.5, "lon": -3.25},
            "area_m2": 1200.0,
            "created_at": "2024-05-01T00:00:00Z",
        }))
        .expect("farm");
        assert_eq!(farm.centroid, Some(GeoCoord::new(10.5, -3.25)));
        assert_eq!(farm.area_m2, Some(1200.0));
    }

    #[test]
    fn create_request_is_latitude_first() {
        let req = CreateFarmRequest::from_coords(
            "North Field",
            &[GeoCoord::new(1.0, 2.0), GeoCoord::new(3.0, 4.0)],
        );
        assert_eq!(
            serde_json::to_value(&req).expect("json"),
            json!({"name": "North Field", "coords": [[1.0, 2.0], [3.0, 4.0]]})
        );
    }

    #[test]
    fn analysis_accepts_legacy_results_field() {
        let legacy: Analysis = serde_json::from_value(json!({
            "id": 7,
            "farm": 42,
            "status": "pending",
            "results": null,
            "created_at": "2024-05-01T00:00:00Z",
        }))
        .expect("legacy");
        assert_eq!(legacy.effective_status(), AnalysisStatus::Pending);

        let canonical: Analysis = serde_json::from_value(json!({
            "id": "a-1",
            "farm": "f-1",
            "raw_llm_response": {"summary": "ok"},
            "created_at": "2024-05-02T00:00:00Z",
        }))
        .expect("canonical");
        assert_eq!(canonical.status, None);
        assert_eq!(canonical.effective_status(), AnalysisStatus::Completed);
        assert_eq!(canonical.raw_llm_response, json!({"summary": "ok"}));
    }

    #[test]
    fn registration_is_checked_locally() {
        let form = RegisterRequest {
            username: "amina".into(),
            email: "amina@example.com".into(),
            password: "secret1".into(),
            password_confirm: "secret1".into(),
            phone: String::new(),
            language: "en".into(),
        };
        assert_eq!(form.validate(), Ok(()));

        let missing = RegisterRequest { username: " ".into(), ..form.clone() };
        assert_eq!(missing.validate(), Err(RegistrationError::MissingCredentials));

        let no_email = RegisterRequest { email: String::new(), ..form.clone() };
        assert_eq!(no_email.validate(), Err(RegistrationError::MissingEmail));

        let mismatch = RegisterRequest { password_confirm: "secret2".into(), ..form.clone() };
        assert_eq!(mismatch.validate(), Err(RegistrationError::PasswordMismatch));

        let short = RegisterRequest {
            password: "abc".into(),
            password_confirm: "abc".into(),
            ..form
        };
        assert_eq!(short.validate(), Err(RegistrationError::PasswordTooShort));
    }
}
