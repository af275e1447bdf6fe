//! Message types for LLM communication.
//!
//! Defines the chat messages and completion requests sent to providers.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing context and instructions.
    System,
    /// User message.
    User,
    /// Assistant message (LLM response).
    Assistant,
}

impl Role {
    /// Returns the role as a string for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

impl Message {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// JSON schema a structured response must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Short identifier, sent to providers that require a schema name.
    pub name: String,
    /// JSON Schema document describing the expected object.
    pub schema: serde_json::Value,
}

/// A single completion call.
///
/// `response_schema` selects between free-text completion (`None`) and
/// schema-constrained structured output.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub response_schema: Option<ResponseSchema>,
}

impl CompletionRequest {
    /// Creates a free-text request.
    pub fn text(messages: Vec<Message>, temperature: f32) -> Self {
        Self {
            messages,
            temperature,
            response_schema: None,
        }
    }

    /// Creates a request whose answer must match `schema`.
    pub fn structured(messages: Vec<Message>, temperature: f32, schema: ResponseSchema) -> Self {
        Self {
            messages,
            temperature,
            response_schema: Some(schema),
        }
    }

    /// Returns the system messages joined into one instruction block.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Returns the non-system messages in order.
    pub fn conversation(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// Returns the content of the last user message, or an empty string.
    pub fn last_user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}
