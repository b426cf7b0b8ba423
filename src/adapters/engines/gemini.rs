use super::check_status;
use crate::domain::errors::EngineError;
use crate::ports::engines::VisionDescriber;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const CAPTION_PROMPT: &str = "Describe this image in one brief sentence.";

/// Frame captions from a Gemini `generateContent` endpoint.
#[derive(Clone, Debug)]
pub struct GeminiVision {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Image { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiVision {
    pub fn new(client: Client, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.endpoint, self.model)
    }
}

#[async_trait]
impl VisionDescriber for GeminiVision {
    async fn connect(&self, api_key: &str) -> Result<(), EngineError> {
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", api_key)
            .send()
            .await?;
        check_status(response).await?;
        debug!(model = %self.model, "vision collaborator reachable");
        Ok(())
    }

    async fn describe(&self, api_key: &str, image: &[u8]) -> Result<String, EngineError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    Part::Text {
                        text: CAPTION_PROMPT.to_string(),
                    },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(image),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}:generateContent", self.model_url()))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        parse_caption(&body)
    }
}

pub(crate) fn parse_caption(body: &str) -> Result<String, EngineError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(EngineError::Malformed("response carried no caption".into()));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_caption() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "A speaker stands "}, {"text": "on stage.\n"}]},
                "finishReason": "STOP"
            }]
        }"#;
        assert_eq!(parse_caption(body).unwrap(), "A speaker stands on stage.");
    }

    #[test]
    fn test_parse_caption_without_candidates() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        assert!(matches!(parse_caption(body), Err(EngineError::Malformed(_))));
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    Part::Text { text: "hi".into() },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".into(),
                            data: "AAAA".into(),
                        },
                    },
                ],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/jpeg"
        );
    }
}
