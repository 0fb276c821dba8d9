//! OpenAI-compatible API client for mind map drafting and embeddings
//!
//! The graph engine only sees the `TextGenerator` and `Embedder` traits;
//! `OpenAiClient` implements both over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::settings;
use crate::utils::safe_truncate;

/// Hierarchical draft returned by the generator for one keyword.
/// A missing or empty title marks an entry the builder skips.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MindMapDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub children: Vec<MindMapDraft>,
}

impl MindMapDraft {
    pub fn new(title: &str, children: Vec<MindMapDraft>) -> Self {
        Self { title: Some(title.to_string()), children }
    }

    pub fn leaf(title: &str) -> Self {
        Self::new(title, vec![])
    }

    /// Usable title, if any
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }

    /// Lenient conversion: non-string titles count as missing and a
    /// non-array `children` counts as no children.
    pub fn from_value(value: &Value) -> Self {
        let title = value
            .get("title")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let children = value
            .get("children")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(Self::from_value).collect())
            .unwrap_or_default();

        Self { title, children }
    }
}

/// Turns a keyword into a hierarchical draft.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_mindmap(&self, keyword: &str) -> Result<MindMapDraft, String>;
}

/// Turns text into a fingerprint vector.
/// Callers treat any error as "no fingerprint" rather than failing.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}

// ==================== OpenAI wire formats ====================

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageContent,
}

#[derive(Debug, Deserialize)]
struct ChatMessageContent {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates mind maps in JSON format.";

/// Roughly 8000 tokens
const MAX_EMBED_BYTES: usize = 30000;

/// Client for an OpenAI-compatible endpoint (chat completions + embeddings)
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    embedding_api_key: Option<String>,
    embedding_base_url: String,
    embedding_model: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: &str,
        embedding_api_key: Option<String>,
        embedding_base_url: &str,
        embedding_model: &str,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            embedding_api_key,
            embedding_base_url: embedding_base_url.trim_end_matches('/').to_string(),
            embedding_model: embedding_model.to_string(),
        }
    }

    /// Build from the global settings (env vars take precedence)
    pub fn from_settings() -> Self {
        Self::new(
            settings::get_openai_api_key(),
            &settings::get_openai_base_url(),
            &settings::get_model_name(),
            settings::get_embedding_api_key(),
            &settings::get_embedding_base_url(),
            &settings::get_embedding_model_name(),
        )
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate_mindmap(&self, keyword: &str) -> Result<MindMapDraft, String> {
        let api_key = self.api_key.as_deref().ok_or("OPENAI_API_KEY not set")?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user".to_string(), content: build_mindmap_prompt(keyword) },
            ],
            response_format: ResponseFormat { format_type: "json_object".to_string() },
            temperature: 0.7,
        };

        let response = self.http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("API error {}: {}", status, body));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "No response content".to_string())?;

        parse_mindmap_response(&text)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self.embedding_api_key.as_deref().ok_or("EMBEDDING_API_KEY not set")?;

        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: safe_truncate(text, MAX_EMBED_BYTES).to_string(),
        };

        let response = self.http
            .post(format!("{}/embeddings", self.embedding_base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Embedding HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Embedding API error {}: {}", status, body));
        }

        let api_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse embedding response: {}", e))?;

        api_response.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| "No embedding in response".to_string())
    }
}

fn build_mindmap_prompt(keyword: &str) -> String {
    format!(
        r#"Please generate a mind map based on the keyword '{keyword}'.
The generation should be based on explanatory, divergent, and associative thinking.
The output must be a JSON object representing a tree structure with the keyword as the root.
Each node in the tree should have a "title" and a "children" array.
For example:
{{
  "title": "{keyword}",
  "children": [
    {{ "title": "Sub-topic 1", "children": [] }},
    {{
      "title": "Sub-topic 2",
      "children": [
        {{ "title": "Sub-sub-topic 2.1", "children": [] }}
      ]
    }}
  ]
}}"#
    )
}

/// Parse the model output into a draft.
/// Handles reasoning preambles (`<think>...</think>`) and markdown fences.
pub fn parse_mindmap_response(text: &str) -> Result<MindMapDraft, String> {
    let text = match text.rfind("</think>") {
        Some(pos) => &text[pos + "</think>".len()..],
        None => text,
    };
    let text = text.trim();

    let json_text = if text.starts_with("```") {
        text.lines()
            .skip(1)
            .take_while(|l| !l.starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    };

    // Tolerate chatter around the object
    let json_text = match (json_text.find('{'), json_text.rfind('}')) {
        (Some(start), Some(end)) if start < end => json_text[start..=end].to_string(),
        _ => return Err(format!("No JSON object in response: {}", safe_truncate(text, 200))),
    };

    let value: Value = serde_json::from_str(&json_text)
        .map_err(|e| format!("Invalid mind map JSON: {}", e))?;

    if !value.is_object() {
        return Err("Mind map response is not a JSON object".to_string());
    }

    let draft = MindMapDraft::from_value(&value);
    if draft.title().is_none() {
        return Err("Mind map response has no root title".to_string());
    }
    Ok(draft)
}
