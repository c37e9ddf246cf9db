//! Chat assistant session.

use api::{ApiClient, ApiError, ChatRequest, ChatRole, ConversationHistory, RecordId};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("no conversation yet")]
    NoConversation,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// One conversation with the assistant, optionally about a farm.
///
/// The backend assigns the conversation id on the first message; later
/// messages carry it so replies keep their context.
#[derive(Clone)]
pub struct ChatSession {
    client: ApiClient,
    farm_id: Option<RecordId>,
    conversation_id: Option<String>,
    transcript: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(client: ApiClient, farm_id: Option<RecordId>) -> Self {
        Self {
            client,
            farm_id,
            conversation_id: None,
            transcript: Vec::new(),
        }
    }

    /// Continues an existing conversation.
    pub fn resume(client: ApiClient, conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            ..Self::new(client, None)
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Sends `message` and returns the assistant's reply.
    pub async fn send(&mut self, message: &str) -> Result<&str, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let request = ChatRequest {
            message: message.to_string(),
            farm_id: self.farm_id.clone(),
            conversation_id: self.conversation_id.clone(),
        };
        let response = self.client.send_chat_message(&request).await?;
        if self.conversation_id.as_deref() != Some(response.conversation_id.as_str()) {
            info!(conversation_id = %response.conversation_id, "chat conversation started");
        }
        debug!(message_id = response.message_id, "assistant replied");
        self.conversation_id = Some(response.conversation_id);

        self.transcript.push(ChatTurn {
            role: ChatRole::User,
            content: request.message,
        });
        self.transcript.push(ChatTurn {
            role: ChatRole::Assistant,
            content: response.assistant,
        });
        Ok(self
            .transcript
            .last()
            .map(|turn| turn.content.as_str())
            .unwrap_or_default())
    }

    pub async fn history(&self) -> Result<ConversationHistory, ChatError> {
        let id = self.conversation_id.as_deref().ok_or(ChatError::NoConversation)?;
        Ok(self.client.conversation_history(id).await?)
    }
}
