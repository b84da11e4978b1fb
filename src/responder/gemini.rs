//! Gemini-backed fallback responder
//!
//! Answers free-form clauses through the `generateContent` API.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AssistantError;
use crate::models::{AssistantReply, Clause, Command};
use crate::responder::FallbackResponder;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

const SYSTEM_PROMPT: &str = r#"You are a crypto portfolio assistant embedded in a DeFi dashboard.

Guidelines:
- Answer questions about token prices, trending tokens, market news and cross-chain bridging
- Be concise; two or three sentences of text at most
- Never claim to have executed a transaction
- If you don't know, say so

Reply with a single JSON object:
{"text": string, "data": object (optional), "trending": [{"symbol", "name", "price_change_24h"}] (optional), "news": [{"title", "url", "source"}] (optional)}"#;

/// Reusable Gemini responder (connection-pooled)
pub struct GeminiResponder {
    client: Client,
    api_key: String,
}

impl GeminiResponder {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self { client, api_key })
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AssistantError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", DEFAULT_BASE_URL, self.api_key);
        let request = GeminiRequest::new(prompt);

        info!("Calling Gemini API");

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!("Gemini API request failed: {}", e);
            AssistantError::ResponderError(format!("Gemini API error: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "Gemini API error response: {}", error_text);
            return Err(AssistantError::ResponderError(format!(
                "Gemini API returned {}",
                status
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AssistantError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let candidate = gemini_response
            .candidates
            .first()
            .ok_or_else(|| AssistantError::LlmError("No response from Gemini API".to_string()))?;

        debug!(
            finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
            "Gemini candidate received"
        );

        candidate
            .content
            .parts
            .first()
            .map(|part| part.text.clone())
            .ok_or_else(|| AssistantError::LlmError("Empty response from Gemini".to_string()))
    }
}

#[async_trait]
impl FallbackResponder for GeminiResponder {
    async fn respond(&self, clause: &Clause, hint: &Command) -> Result<AssistantReply> {
        let answer = self.generate(build_prompt(clause, hint)).await?;
        let reply = parse_reply(&answer);
        info!(usable = reply.is_usable(), "Gemini reply parsed");
        Ok(reply)
    }
}

/// User prompt carrying the clause and, when one was extracted, the intent.
fn build_prompt(clause: &Clause, hint: &Command) -> String {
    match hint {
        Command::Unrecognized => clause.to_string(),
        Command::PriceQuery { coin_id } => {
            format!("{}\n\n(intent: price lookup for \"{}\")", clause, coin_id)
        }
        Command::TrendingQuery => format!("{}\n\n(intent: trending tokens)", clause),
        Command::NewsQuery => format!("{}\n\n(intent: market news)", clause),
        Command::BridgeQuery => format!("{}\n\n(intent: cross-chain bridging)", clause),
        other => format!("{}\n\n(intent: {:?})", clause, other),
    }
}

/// Structured replies are preferred; anything else becomes plain text.
fn parse_reply(answer: &str) -> AssistantReply {
    let trimmed = answer.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<AssistantReply>(body) {
        Ok(reply) => reply,
        Err(e) => {
            debug!("Gemini reply is not structured JSON: {}", e);
            AssistantReply::text(trimmed)
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

impl GeminiRequest {
    fn new(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
                response_mime_type: "application/json",
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest::new("what's trending".to_string());
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("what's trending"));
        assert!(json.contains("application/json"));
        assert!(json.contains("crypto portfolio assistant"));
    }

    #[test]
    fn test_parse_structured_reply() {
        let reply = parse_reply(
            r#"```json
{"text": "Trending now", "trending": [{"symbol": "PEPE", "name": "Pepe", "price_change_24h": 12.5}]}
```"#,
        );
        assert_eq!(reply.text, "Trending now");
        assert_eq!(reply.trending.unwrap()[0].symbol, "PEPE");
    }

    #[test]
    fn test_parse_plain_text_reply() {
        let reply = parse_reply("Bitcoin is trading near its weekly high.");
        assert_eq!(reply.text, "Bitcoin is trading near its weekly high.");
        assert!(reply.data.is_none());
    }

    #[test]
    fn test_prompt_includes_hint() {
        let clause = Clause::normalize("price of bitcoin").unwrap();
        let prompt = build_prompt(
            &clause,
            &Command::PriceQuery {
                coin_id: "bitcoin".to_string(),
            },
        );
        assert!(prompt.starts_with("price of bitcoin"));
        assert!(prompt.contains("price lookup"));
        assert_eq!(build_prompt(&clause, &Command::Unrecognized), "price of bitcoin");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let responder = GeminiResponder::new(String::new()).unwrap();
        let clause = Clause::normalize("hello").unwrap();
        let result = responder.respond(&clause, &Command::Unrecognized).await;
        assert!(matches!(result, Err(AssistantError::ConfigError(_))));
    }
}
