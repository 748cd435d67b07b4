//! Wire types for the Gemini `generateContent` endpoint

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct RequestContent {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineDataOut },
}

#[derive(Debug, Serialize)]
pub struct InlineDataOut {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            response_modalities: vec!["IMAGE".to_string()],
            temperature: 0.4,
            top_k: 32,
            top_p: 1.0,
            max_output_tokens: 4096,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

/// The API answers in camelCase but older deployments used snake_case
#[derive(Debug, Deserialize, Default)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    pub inline_data: Option<InlineDataIn>,
}

#[derive(Debug, Deserialize, Default)]
pub struct InlineDataIn {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// What the first candidate carried
#[derive(Debug, PartialEq, Eq)]
pub enum ExtractedPayload {
    Image { data: String, mime_type: Option<String> },
    Text(String),
    Empty,
}

impl GenerateContentResponse {
    pub fn extract(&self) -> ExtractedPayload {
        let parts = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();

        for part in parts {
            if let Some(inline) = &part.inline_data {
                if let Some(data) = inline.data.as_ref().filter(|d| !d.is_empty()) {
                    return ExtractedPayload::Image {
                        data: data.clone(),
                        mime_type: inline.mime_type.clone(),
                    };
                }
            }
        }

        parts
            .iter()
            .find_map(|p| p.text.clone())
            .map(ExtractedPayload::Text)
            .unwrap_or(ExtractedPayload::Empty)
    }
}
