//! # Assistant Error Types
//!
//! Failures of the language-model collaborator. None of these are retried:
//! they surface from the command that triggered the call.

/// Custom error types for chat-completion calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    /// The request never produced a response (connection, TLS, decoding)
    Transport(String),
    /// The API answered with a non-success status
    Status { status: u16, body: String },
    /// The API answered but without any usable text
    EmptyResponse,
}

impl std::fmt::Display for AssistantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistantError::Transport(msg) => write!(f, "Transport error: {msg}"),
            AssistantError::Status { status, body } => {
                write!(f, "Chat completion failed with status {status}: {body}")
            }
            AssistantError::EmptyResponse => write!(f, "Chat completion returned no text"),
        }
    }
}

impl std::error::Error for AssistantError {}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::Transport(err.to_string())
    }
}
