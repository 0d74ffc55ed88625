// src/models/explainer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_role() -> String {
    "user".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPart {
    #[serde(default)]
    pub text: String,
}

/// One turn of the learner/explainer conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<ChatPart>,
}

impl ChatMessage {
    pub fn text(&self) -> &str {
        self.parts.first().map(|p| p.text.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub success: bool,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ExplainerStatus {
    pub configured: bool,
    pub service: &'static str,
}
