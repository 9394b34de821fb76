// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

// Gemini Provider Adapter
//
// Anti-Corruption Layer for the Google Generative Language API
// (`models/{model}:generateContent`). Sends the persona as a system
// instruction, the rendered context as user content, and an optional inline
// image. Safety filters are relaxed so banter is not silently blocked.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::provider::{classify_reply, AttemptOutcome, PromptContext, ProviderAdapter};

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiAdapter {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    quota_markers: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
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

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiAdapter {
    pub fn new(
        name: String,
        client: reqwest::Client,
        endpoint: String,
        api_key: Option<String>,
        model: String,
        quota_markers: Vec<String>,
    ) -> Self {
        Self {
            name,
            client,
            endpoint,
            api_key,
            model,
            quota_markers,
        }
    }

    fn build_request<'a>(&self, context: &'a PromptContext) -> GenerateContentRequest<'a> {
        let mut parts = vec![Part::Text(&context.text)];
        if let Some(image) = &context.image {
            parts.push(Part::InlineData(InlineData {
                mime_type: &image.mime_type,
                data: image.to_base64(),
            }));
        }

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text(&context.system_prompt)],
            },
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            safety_settings: HARM_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
            generation_config: GenerationConfig {
                max_output_tokens: context.limits.max_output_tokens,
            },
        }
    }

    fn classify_status(&self, status: StatusCode, body: &str) -> AttemptOutcome {
        let detail = format!("HTTP {}: {}", status, body.trim());
        match status {
            StatusCode::TOO_MANY_REQUESTS => AttemptOutcome::rate_limited(&self.name, detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AttemptOutcome::setup(&self.name, detail)
            }
            StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => {
                AttemptOutcome::setup(&self.name, detail)
            }
            StatusCode::NOT_FOUND => AttemptOutcome::unsupported(
                &self.name,
                format!("model '{}' not found", self.model),
            ),
            _ => AttemptOutcome::transient(&self.name, detail),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    async fn attempt(&self, context: &PromptContext) -> AttemptOutcome {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => return AttemptOutcome::setup(&self.name, "API key is not configured"),
        };

        let request = self.build_request(context);
        let url = format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );

        let response = match self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::transient(&self.name, e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return self.classify_status(status, &body);
        }

        let parsed: GenerateContentResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return AttemptOutcome::transient(
                    &self.name,
                    format!("Failed to parse response: {}", e),
                )
            }
        };

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            tracing::debug!(provider = %self.name, reason = %reason, "Prompt blocked");
            return AttemptOutcome::empty_reply(&self.name);
        }

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            return AttemptOutcome::empty_reply(&self.name);
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            if let Some(reason) = candidate.finish_reason {
                tracing::debug!(provider = %self.name, finish_reason = %reason, "Candidate had no text");
            }
        }

        classify_reply(&self.name, text, &self.quota_markers)
    }
}
