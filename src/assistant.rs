//! # Assistant
//!
//! Mood labels, summaries and the year-in-review come from an
//! OpenAI-compatible chat-completion endpoint. Each use has its own token and
//! temperature budget. Calls are made once: a failure is returned to the
//! caller untouched.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, error, info};

use crate::assistant_errors::AssistantError;
use crate::config::AssistantConfig;

/// Sections of a year-in-review answer are separated by this line
pub const ANALYSIS_SEPARATOR: &str = ">-----<";

pub const SYSTEM_ROLE: &str =
    "You are a warm, perceptive journaling companion. You read personal journal entries and answer briefly and kindly.";

/// Token and temperature limits of one kind of completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionBudget {
    pub max_tokens: u32,
    pub temperature: f32,
}

pub const MOOD_BUDGET: CompletionBudget = CompletionBudget {
    max_tokens: 10,
    temperature: 0.3,
};

pub const SUMMARY_BUDGET: CompletionBudget = CompletionBudget {
    max_tokens: 200,
    temperature: 0.5,
};

pub const ANALYSIS_BUDGET: CompletionBudget = CompletionBudget {
    max_tokens: 3000,
    temperature: 0.7,
};

/// Text generation used by the journal
pub trait Assistant: Send + Sync {
    /// One or two words describing the mood of an entry
    fn mood(&self, entry_text: &str) -> impl Future<Output = Result<String, AssistantError>> + Send;

    /// A few sentences summarizing an entry
    fn summary(&self, entry_text: &str) -> impl Future<Output = Result<String, AssistantError>> + Send;

    /// Answer `question` about a year of entries. Sections of the answer are
    /// separated by [`ANALYSIS_SEPARATOR`].
    fn review_year(
        &self,
        journal_text: &str,
        question: &str,
    ) -> impl Future<Output = Result<String, AssistantError>> + Send;
}

pub fn mood_prompt(entry_text: &str) -> String {
    format!(
        "Describe the mood of this journal entry in one or two words. Reply with the mood only, no punctuation.\n\nEntry:\n{entry_text}"
    )
}

pub fn summary_prompt(entry_text: &str) -> String {
    format!(
        "Summarize this journal entry in two or three sentences, addressing the writer as \"you\".\n\nEntry:\n{entry_text}"
    )
}

pub fn review_prompt(journal_text: &str, question: &str) -> String {
    format!(
        "Below are my journal entries for this year, one per paragraph, each starting with its date and mood.\n\n\
         {journal_text}\n\n\
         {question}\n\n\
         Split your answer into short sections. Put a line containing only {ANALYSIS_SEPARATOR} between sections. \
         You may use markdown headers, bold and italics."
    )
}

/// Split a year-in-review answer into its non-empty sections
pub fn split_analysis(answer: &str) -> Vec<String> {
    answer
        .split(ANALYSIS_SEPARATOR)
        .map(str::trim)
        .filter(|section| !section.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

fn first_choice_text(response: ChatResponse) -> Result<String, AssistantError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(AssistantError::EmptyResponse)
}

/// Chat Completions client over `reqwest`
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: AssistantConfig,
}

impl OpenAiClient {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(&self, prompt: &str, budget: CompletionBudget) -> Result<String, AssistantError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_ROLE,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: budget.max_tokens,
            temperature: budget.temperature,
        };

        debug!(
            model = %self.config.model,
            max_tokens = budget.max_tokens,
            prompt_chars = prompt.len(),
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Chat completion request failed");
            return Err(AssistantError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let text = first_choice_text(parsed)?;
        info!(response_chars = text.len(), "Chat completion received");
        Ok(text)
    }
}

impl Assistant for OpenAiClient {
    async fn mood(&self, entry_text: &str) -> Result<String, AssistantError> {
        self.complete(&mood_prompt(entry_text), MOOD_BUDGET).await
    }

    async fn summary(&self, entry_text: &str) -> Result<String, AssistantError> {
        self.complete(&summary_prompt(entry_text), SUMMARY_BUDGET).await
    }

    async fn review_year(&self, journal_text: &str, question: &str) -> Result<String, AssistantError> {
        self.complete(&review_prompt(journal_text, question), ANALYSIS_BUDGET)
            .await
    }
}
