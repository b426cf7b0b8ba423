use super::check_status;
use crate::domain::errors::EngineError;
use crate::domain::timeline::FusedChunk;
use crate::ports::engines::DocumentSynthesizer;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You are a technical analyst. You receive a time-ordered JSON timeline \
of a video: what was said, the words read on screen, and short visual descriptions, per time chunk. \
The on-screen words come from OCR and are unordered; reassemble them into the phrases they most \
likely formed. Write a markdown report that summarizes the video chunk by chunk, then ends with \
the key takeaways.";

/// Report synthesis through an OpenAI-compatible chat completions endpoint.
#[derive(Clone, Debug)]
pub struct GroqSynthesizer {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
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

impl GroqSynthesizer {
    pub fn new(client: Client, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }
}

pub(crate) fn build_prompt(timeline: &[FusedChunk]) -> Result<String, EngineError> {
    let raw = serde_json::to_string_pretty(timeline)?;
    Ok(format!(
        "RAW DATA:\n{}\n\nFINAL SYNTHESIZED REPORT (Markdown Format):",
        raw
    ))
}

pub(crate) fn parse_completion(body: &str) -> Result<String, EngineError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| EngineError::Malformed("completion carried no content".into()))
}

#[async_trait]
impl DocumentSynthesizer for GroqSynthesizer {
    async fn synthesize(&self, api_key: &str, timeline: &[FusedChunk]) -> Result<String, EngineError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user",
                    content: build_prompt(timeline)?,
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        parse_completion(&body)
    }
}
