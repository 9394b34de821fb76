// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

// Ollama Provider Adapter
//
// Anti-Corruption Layer for a locally hosted Ollama server (`/api/generate`).
// Images are passed as base64 for multimodal models.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::provider::{classify_reply, AttemptOutcome, PromptContext, ProviderAdapter};

pub struct OllamaAdapter {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

impl OllamaAdapter {
    pub fn new(name: String, client: reqwest::Client, endpoint: String, model: String) -> Self {
        Self {
            name,
            client,
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    async fn attempt(&self, context: &PromptContext) -> AttemptOutcome {
        let request = OllamaRequest {
            model: &self.model,
            prompt: &context.text,
            stream: false,
            images: context.image.iter().map(|i| i.to_base64()).collect(),
            options: OllamaOptions {
                num_predict: context.limits.max_output_tokens,
            },
        };

        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return AttemptOutcome::transient(&self.name, format!("Ollama unreachable at {}: {}", self.endpoint, e))
            }
            Err(e) => return AttemptOutcome::transient(&self.name, e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return if status == StatusCode::NOT_FOUND {
                AttemptOutcome::unsupported(&self.name, format!("model '{}' not pulled", self.model))
            } else if status == StatusCode::TOO_MANY_REQUESTS {
                AttemptOutcome::rate_limited(&self.name, error_text)
            } else {
                AttemptOutcome::transient(&self.name, format!("HTTP {}: {}", status, error_text))
            };
        }

        match response.json::<OllamaResponse>().await {
            Ok(parsed) => classify_reply(&self.name, parsed.response, &[]),
            Err(e) => AttemptOutcome::transient(&self.name, format!("Failed to parse response: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::ImagePayload;
    use crate::domain::provider::FailureKind;
    use bytes::Bytes;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;

    fn adapter(endpoint: String) -> OllamaAdapter {
        OllamaAdapter::new("ollama".into(), reqwest::Client::new(), endpoint, "llava".into())
    }

    #[tokio::test]
    async fn test_generate_with_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(json!({
                "model": "llava",
                "prompt": "describe",
                "stream": false,
                "images": ["YWJj"],
                "options": { "num_predict": 1024 }
            })))
            .with_status(200)
            .with_body(json!({ "response": "a dog", "done": true }).to_string())
            .create_async()
            .await;

        let image = Arc::new(ImagePayload::new("u", "image/png", Bytes::from_static(b"abc")));
        let outcome = adapter(server.url())
            .attempt(&PromptContext::new("", "describe").with_image(image))
            .await;

        mock.assert_async().await;
        assert_eq!(outcome, AttemptOutcome::Success("a dog".into()));
    }

    #[tokio::test]
    async fn test_missing_model_is_unsupported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model 'llava' not found"}"#)
            .create_async()
            .await;

        let outcome = adapter(server.url()).attempt(&PromptContext::new("", "hi")).await;
        assert_eq!(outcome.failure().map(|f| f.kind), Some(FailureKind::UnsupportedMode));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(500)
            .create_async()
            .await;

        let outcome = adapter(server.url()).attempt(&PromptContext::new("", "hi")).await;
        assert_eq!(outcome.failure().map(|f| f.kind), Some(FailureKind::Transient));
    }
}
