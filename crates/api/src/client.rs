//! Authenticated client for the farms backend.
//!
//! Every protected call carries `Authorization: Bearer <access>`. A 401 triggers
//! exactly one refresh through `/auth/token/refresh/` followed by one retry. If
//! there is no refresh token or the refresh itself fails, stored tokens are
//! cleared and the call fails with [`ApiError::Unauthorized`].

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::{ApiError, ServerMessage};
use crate::tokens::{TokenStore, Tokens};
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};
use crate::types::{
    Analysis, AuthResponse, ChatRequest, ChatResponse, ConversationHistory, CreateFarmRequest,
    Farm, LoginRequest, ProfileUpdate, RecordId, RefreshResponse, RegisterRequest,
    UpdateFarmRequest, User,
};

const UNAUTHORIZED: u16 = 401;

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { transport, tokens }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.tokens.load(), Ok(Some(_)))
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.tokens.clear()?;
        info!("signed out");
        Ok(())
    }

    // ---- auth ----

    /// Signs in and stores the returned token pair.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let auth: AuthResponse = self
            .public_call(Method::Post, "/auth/login/", Some(to_json(credentials)?))
            .await?;
        self.tokens.save(&Tokens {
            access: auth.access.clone(),
            refresh: Some(auth.refresh.clone()),
        })?;
        info!(username = %auth.user.username, "signed in");
        Ok(auth)
    }

    /// Creates an account. Tokens in the response are not stored; the user
    /// signs in separately.
    pub async fn register(&self, account: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.public_call(Method::Post, "/auth/register/", Some(to_json(account)?))
            .await
    }

    pub async fn refresh_access_token(&self, refresh: &str) -> Result<RefreshResponse, ApiError> {
        self.public_call(
            Method::Post,
            "/auth/token/refresh/",
            Some(serde_json::json!({ "refresh": refresh })),
        )
        .await
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        self.call(Method::Get, "/auth/profile/".to_string(), None).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        self.call(Method::Put, "/auth/profile/".to_string(), Some(to_json(update)?))
            .await
    }

    // ---- farms ----

    pub async fn list_farms(&self) -> Result<Vec<Farm>, ApiError> {
        self.call(Method::Get, "/farms/".to_string(), None).await
    }

    pub async fn create_farm(&self, request: &CreateFarmRequest) -> Result<Farm, ApiError> {
        self.call(Method::Post, "/farms/".to_string(), Some(to_json(request)?))
            .await
    }

    pub async fn get_farm(&self, id: &RecordId) -> Result<Farm, ApiError> {
        self.call(Method::Get, format!("/farms/{id}/"), None).await
    }

    pub async fn update_farm(
        &self,
        id: &RecordId,
        update: &UpdateFarmRequest,
    ) -> Result<Farm, ApiError> {
        self.call(Method::Put, format!("/farms/{id}/"), Some(to_json(update)?))
            .await
    }

    pub async fn delete_farm(&self, id: &RecordId) -> Result<(), ApiError> {
        self.authorized(Method::Delete, format!("/farms/{id}/"), None)
            .await
            .map(|_| ())
    }

    pub async fn analyze_farm(&self, id: &RecordId) -> Result<Analysis, ApiError> {
        self.call(Method::Post, format!("/farms/{id}/analyze/"), None)
            .await
    }

    pub async fn latest_analysis(&self, id: &RecordId) -> Result<Analysis, ApiError> {
        self.call(Method::Get, format!("/farms/{id}/latest-analysis/"), None)
            .await
    }

    pub async fn analyses(&self, id: &RecordId) -> Result<Vec<Analysis>, ApiError> {
        self.call(Method::Get, format!("/farms/{id}/analyses/"), None)
            .await
    }

    // ---- chat ----

    pub async fn send_chat_message(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        self.call(Method::Post, "/chat/".to_string(), Some(to_json(request)?))
            .await
    }

    pub async fn conversation_history(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationHistory, ApiError> {
        self.call(
            Method::Get,
            format!("/chat/conversations/{conversation_id}/messages/"),
            None,
        )
        .await
    }

    // ---- plumbing ----

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let response = self.authorized(method, path, body).await?;
        decode(&response)
    }

    /// Auth endpoints: no bearer header and no refresh on 401.
    async fn public_call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        let response = check(self.transport.send(request).await?)?;
        decode(&response)
    }

    async fn authorized(
        &self,
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let stored = self.tokens.load()?;
        let mut request = ApiRequest::new(method, path)
            .with_bearer(stored.as_ref().map(|t| t.access.clone()));
        request.body = body;

        let response = self.transport.send(request.clone()).await?;
        if response.status != UNAUTHORIZED {
            return check(response);
        }

        let Some(refresh) = stored.and_then(|t| t.refresh) else {
            warn!(path = %request.path, "unauthorized without a refresh token; clearing session");
            self.tokens.clear()?;
            return Err(ApiError::Unauthorized);
        };

        let access = match self.refresh_access_token(&refresh).await {
            Ok(refreshed) => refreshed.access,
            Err(err) => {
                warn!(%err, "token refresh failed; clearing session");
                self.tokens.clear()?;
                return Err(ApiError::Unauthorized);
            }
        };
        self.tokens.save(&Tokens {
            access: access.clone(),
            refresh: Some(refresh),
        })?;

        let retried = self.transport.send(request.with_bearer(Some(access))).await?;
        if retried.status == UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        check(retried)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    Ok(serde_json::to_value(value)?)
}

fn check(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ApiError::Server {
        status: response.status,
        body: ServerMessage::from_body(&response.body),
    })
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(&response.body)?)
}
