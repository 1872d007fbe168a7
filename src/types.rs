//! Conversation turns and the OpenAI-compatible chat payloads they map to.
//!
//! Local model servers (Ollama, LM Studio, llama.cpp) expose
//! `/chat/completions`; tool use is carried in plain message text, so the
//! wire format only needs `role` + `content`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Roles and turns
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// System instruction message.
    System,
    /// End-user message.
    User,
    /// Raw model output, including any tool-call markup.
    Assistant,
    /// Synthetic turn carrying the results of one tool batch.
    ToolResult,
}

impl Role {
    /// Role name sent on the wire.
    ///
    /// Tool results travel as `user` messages: without native tool-call ids
    /// most local servers reject a bare `tool` role.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User | Self::ToolResult => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single role-tagged entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self {
            role: Role::ToolResult,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat completion request / response
// ---------------------------------------------------------------------------

/// One model call: a read-only snapshot of the turns plus sampling settings.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f64>,
}

/// Request body for POST /chat/completions.
#[derive(Debug, Serialize)]
pub(crate) struct WireRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> WireRequest<'a> {
    pub fn from_request(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.wire_name(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            stream: false,
        }
    }
}

/// Response body from POST /chat/completions.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A single choice in the API response.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant payload inside a choice. `content` may be null on some servers.
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}
