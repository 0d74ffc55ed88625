// src/services/explainer.rs

//! Hint generation for learners stuck on a question.
//!
//! The explainer is an external text generator. Nothing in the session path waits on it;
//! callers go through [`explain_with_timeout`], which always returns a string.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::Config, models::explainer::ChatMessage};

#[derive(Debug, Error)]
pub enum ExplainerError {
    #[error("explainer is not configured (GEMINI_API_KEY is unset)")]
    NotConfigured,

    #[error("explainer took longer than {0:?} to respond")]
    Timeout(Duration),

    #[error("explainer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("explainer returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("explainer returned an empty response")]
    EmptyResponse,
}

#[async_trait]
pub trait Explainer: Send + Sync {
    /// Produces a hint for `question` given its options and the conversation so far.
    async fn ask(
        &self,
        question: &str,
        options: &[String],
        history: &[ChatMessage],
    ) -> Result<String, ExplainerError>;

    fn is_configured(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Builds the tutoring prompt. The model is told to guide, never to reveal the answer.
pub fn build_prompt(question: &str, options: &[String], history: &[ChatMessage]) -> String {
    let transcript = history
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{}. {}: {}", i + 1, msg.role, msg.text()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a virtual tutor helping a student prepare for an exam.\n\n\
         GUIDELINES:\n\
         - NEVER give the answer directly\n\
         - Offer useful clues and hints\n\
         - Ask guiding questions\n\
         - Explain the reasoning step by step\n\
         - Be encouraging and positive\n\n\
         QUESTION: {}\n\
         OPTIONS: {}\n\n\
         CONVERSATION:\n{}\n\n\
         Your reply should help the student think critically.",
        question,
        options.join(" | "),
        transcript
    )
}

/// Gemini `generateContent` client.
#[derive(Clone, Debug)]
pub struct GeminiExplainer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiExplainer {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gemini_endpoint.clone(), config.gemini_api_key.clone())
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl Explainer for GeminiExplainer {
    async fn ask(
        &self,
        question: &str,
        options: &[String],
        history: &[ChatMessage],
    ) -> Result<String, ExplainerError> {
        let api_key = self.api_key.as_deref().ok_or(ExplainerError::NotConfigured)?;
        let prompt = build_prompt(question, options, history);

        let payload = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: &prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExplainerError::Status { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ExplainerError::EmptyResponse)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn name(&self) -> &'static str {
        "Gemini AI"
    }
}

/// Bounded explainer call that never fails.
///
/// Errors and timeouts come back as a readable message in place of the hint.
pub async fn explain_with_timeout(
    explainer: &dyn Explainer,
    limit: Duration,
    question: &str,
    options: &[String],
    history: &[ChatMessage],
) -> String {
    let outcome = match tokio::time::timeout(limit, explainer.ask(question, options, history)).await
    {
        Ok(result) => result,
        Err(_) => Err(ExplainerError::Timeout(limit)),
    };

    match outcome {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Explainer '{}' failed: {}", explainer.name(), e);
            format!("Hint unavailable: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Explainer for Slow {
        async fn ask(
            &self,
            _question: &str,
            _options: &[String],
            _history: &[ChatMessage],
        ) -> Result<String, ExplainerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    struct Echo;

    #[async_trait]
    impl Explainer for Echo {
        async fn ask(
            &self,
            question: &str,
            options: &[String],
            _history: &[ChatMessage],
        ) -> Result<String, ExplainerError> {
            Ok(format!("{} [{}]", question, options.len()))
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_explain_returns_hint() {
        let options = vec!["1".to_string(), "2".to_string()];
        let hint = explain_with_timeout(&Echo, Duration::from_secs(1), "1+1?", &options, &[]).await;
        assert_eq!(hint, "1+1? [2]");
    }

    #[tokio::test]
    async fn test_explain_degrades_on_timeout() {
        let hint = explain_with_timeout(&Slow, Duration::from_millis(20), "q", &[], &[]).await;
        assert!(hint.starts_with("Hint unavailable"));
        assert!(hint.contains("longer than"));
    }

    #[tokio::test]
    async fn test_unconfigured_gemini_degrades() {
        let explainer = GeminiExplainer::new("http://127.0.0.1:9/unused", None);
        assert!(!explainer.is_configured());

        let hint = explain_with_timeout(&explainer, Duration::from_secs(1), "q", &[], &[]).await;
        assert!(hint.contains("not configured"));
    }

    #[test]
    fn test_prompt_carries_question_options_and_transcript() {
        let history = vec![ChatMessage {
            role: "model".to_string(),
            parts: vec![crate::models::explainer::ChatPart {
                text: "Think about units.".to_string(),
            }],
        }];
        let prompt = build_prompt(
            "What is 2+2?",
            &["3".to_string(), "4".to_string()],
            &history,
        );

        assert!(prompt.contains("QUESTION: What is 2+2?"));
        assert!(prompt.contains("OPTIONS: 3 | 4"));
        assert!(prompt.contains("1. model: Think about units."));
        assert!(prompt.contains("NEVER give the answer"));
    }
}
