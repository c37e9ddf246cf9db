use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http client setup failed: {0}")]
    Setup(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend unreachable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("token file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

/// Registration form problems caught before any request is sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Username and password are required")]
    MissingCredentials,
    #[error("Email is required")]
    MissingEmail,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
}

/// Error body fields the backend uses to explain a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerMessage {
    pub message: Option<String>,
    pub detail: Option<String>,
}

impl ServerMessage {
    pub fn from_body(body: &[u8]) -> Self {
        let Ok(serde_json::Value::Object(map)) = serde_json::from_slice(body) else {
            return Self::default();
        };
        let field = |name: &str| map.get(name).and_then(|v| v.as_str()).map(str::to_string);
        Self {
            message: field("message"),
            detail: field("detail"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable credentials: the access token was rejected and could not be refreshed.
    /// Stored tokens have been cleared; the caller should send the user to sign in.
    #[error("not authenticated")]
    Unauthorized,
    #[error("server returned {status}")]
    Server { status: u16, body: ServerMessage },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

impl ApiError {
    /// The backend's `message` field, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Server { body, .. } => body.message.as_deref(),
            _ => None,
        }
    }

    /// `detail`, then `message`, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Server { body, .. } => body
                .detail
                .clone()
                .or_else(|| body.message.clone())
                .unwrap_or_else(|| fallback.to_string()),
            _ => fallback.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, ServerMessage, TransportError};

    #[test]
    fn server_message_reads_known_fields() {
        let body = br#"{"message": "Name taken", "detail": "Invalid"}"#;
        let parsed = ServerMessage::from_body(body);
        assert_eq!(parsed.message.as_deref(), Some("Name taken"));
        assert_eq!(parsed.detail.as_deref(), Some("Invalid"));
        assert_eq!(ServerMessage::from_body(b"<html>"), ServerMessage::default());
    }

    #[test]
    fn user_message_prefers_detail_then_fallback() {
        let err = ApiError::Server {
            status: 400,
            body: ServerMessage {
                message: Some("m".into()),
                detail: None,
            },
        };
        assert_eq!(err.server_message(), Some("m"));
        assert_eq!(err.user_message("fallback"), "m");

        let err = ApiError::Transport(TransportError::Unavailable("down".into()));
        assert_eq!(err.server_message(), None);
        assert_eq!(err.user_message("fallback"), "fallback");
    }
}
