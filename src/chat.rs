//! OpenAI chat client for the mention-triggered AI chat
//!
//! Builds a chat completion request from the stored conversation history and
//! maps API failures to the replies users see.

use crate::database::ConversationTurn;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Discord rejects messages longer than this
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OpenAI API key is not configured")]
    MissingApiKey,
    #[error("Authentication with the OpenAI API failed")]
    Authentication,
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("API error: {0}")]
    Api(String),
}

impl ChatError {
    /// The reply posted in the channel for this failure
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::MissingApiKey => "OpenAI API key is not configured.",
            ChatError::Authentication => {
                "Authentication error with OpenAI API. Please check the API key."
            }
            ChatError::RateLimitExceeded => {
                "Rate limit exceeded with OpenAI API. Please try again later."
            }
            ChatError::Api(_) => "An error occurred with the OpenAI API. Please try again later.",
            ChatError::Http(_) => "An unexpected error occurred.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for chat completions
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Turn stored history (newest first) plus the new prompt into chat messages
/// in chronological order
pub fn build_messages(history: &[ConversationTurn], prompt: &str) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = history
        .iter()
        .rev()
        .flat_map(|turn| {
            [
                ChatMessage::user(turn.message.clone()),
                ChatMessage::assistant(turn.bot_response.clone()),
            ]
        })
        .collect();
    messages.push(ChatMessage::user(prompt));
    messages
}

/// Remove mentions of the bot from a message
pub fn strip_mentions(content: &str, bot_id: u64) -> String {
    content
        .replace(&format!("<@{}>", bot_id), "")
        .replace(&format!("<@!{}>", bot_id), "")
        .trim()
        .to_string()
}

/// Split text into chunks Discord accepts, preferring line breaks
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.chars().count() + line.chars().count() > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.chars().count() > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                let piece: String = piece.iter().collect();
                if piece.chars().count() == limit {
                    chunks.push(piece);
                } else {
                    current = piece;
                }
            }
        } else {
            current.push_str(line);
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

fn classify_failure(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED => ChatError::Authentication,
        StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimitExceeded,
        _ => ChatError::Api(format!("{} - {}", status, message)),
    }
}

/// Client for OpenAI chat completions
pub struct ChatClient {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl ChatClient {
    pub fn new(api_key: Option<String>, model: String) -> Result<Self, ChatError> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask the model for the next assistant message
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let api_key = self.api_key.as_deref().ok_or(ChatError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: 1.0,
            max_tokens: 2048,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        debug!("Sending {} chat messages to {}", messages.len(), self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", OPENAI_API_BASE))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("Chat completion failed: {} - {}", status, text);
            return Err(classify_failure(status, &text));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ChatError::Api("Empty completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(message: &str, response: &str) -> ConversationTurn {
        ConversationTurn {
            message: message.to_string(),
            bot_response: response.to_string(),
        }
    }

    #[test]
    fn test_history_becomes_chronological() {
        let history = vec![turn("second", "answer 2"), turn("first", "answer 1")];
        let messages = build_messages(&history, "third");

        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "answer 1", "second", "answer 2", "third"]);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[4].role, Role::User);
    }

    #[test]
    fn test_request_shape() {
        let messages = build_messages(&[], "hi");
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            temperature: 1.0,
            max_tokens: 2048,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
        assert_eq!(value["max_tokens"], 2048);
    }

    #[test]
    fn test_strip_mentions() {
        assert_eq!(strip_mentions("<@42> tell me a joke", 42), "tell me a joke");
        assert_eq!(strip_mentions("hey <@!42>, sup <@7>", 42), "hey , sup <@7>");
    }

    #[test]
    fn test_failure_classification() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, ""),
            ChatError::Authentication
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            ChatError::RateLimitExceeded
        ));
        match classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"message": "bad model", "type": "invalid_request_error"}}"#,
        ) {
            ChatError::Api(msg) => assert!(msg.contains("bad model")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            ChatError::Authentication.user_message(),
            "Authentication error with OpenAI API. Please check the API key."
        );
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "  Hello!  "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("  Hello!  "));
    }

    #[test]
    fn test_split_message() {
        assert_eq!(split_message("short", 2000), vec!["short"]);

        let long = format!("{}\n{}", "a".repeat(1500), "b".repeat(1500));
        let chunks = split_message(&long, 2000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 2000));

        let unbroken = "x".repeat(4500);
        let chunks = split_message(&unbroken, 2000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), unbroken);
    }
}
