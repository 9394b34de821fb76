// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-Compatible Provider Adapter
//
// Anti-Corruption Layer for `/chat/completions` style APIs. Primarily used
// for the g4f community aggregator, which accepts an extra `provider` field to
// pin the upstream, but works with any OpenAI-compatible server.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::provider::{classify_reply, AttemptOutcome, PromptContext, ProviderAdapter};

/// Error names aggregators put in the body when the call names something they do not have.
const NOT_FOUND_MARKERS: [&str; 2] = ["ProviderNotFound", "ModelNotFound"];

pub struct OpenAICompatibleAdapter {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    upstream: Option<String>,
    quota_markers: Vec<String>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<&'a str>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAICompatibleAdapter {
    pub fn new(
        name: String,
        client: reqwest::Client,
        endpoint: String,
        api_key: Option<String>,
        model: String,
        upstream: Option<String>,
        quota_markers: Vec<String>,
    ) -> Self {
        Self {
            name,
            client,
            endpoint,
            api_key,
            model,
            upstream,
            quota_markers,
        }
    }

    fn classify_status(&self, status: StatusCode, body: &str) -> AttemptOutcome {
        if NOT_FOUND_MARKERS.iter().any(|m| body.contains(m)) {
            return AttemptOutcome::unsupported(&self.name, body.trim().to_string());
        }

        let detail = format!("HTTP {}: {}", status, body.trim());
        match status {
            StatusCode::TOO_MANY_REQUESTS => AttemptOutcome::rate_limited(&self.name, detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
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
impl ProviderAdapter for OpenAICompatibleAdapter {
    async fn attempt(&self, context: &PromptContext) -> AttemptOutcome {
        let content = match &context.image {
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text { text: &context.text },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.to_data_uri(),
                    },
                },
            ]),
            None => MessageContent::Text(&context.text),
        };

        // The rendered context already carries the persona, so one user turn suffices.
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: context.limits.max_output_tokens,
            provider: self.upstream.as_deref(),
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::transient(&self.name, e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return self.classify_status(status, &body);
        }

        let parsed: ChatCompletionResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return AttemptOutcome::transient(
                    &self.name,
                    format!("Failed to parse response: {}", e),
                )
            }
        };

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        classify_reply(&self.name, text, &self.quota_markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::FailureKind;
    use mockito::Matcher;
    use serde_json::json;

    fn adapter(endpoint: String, upstream: Option<&str>) -> OpenAICompatibleAdapter {
        OpenAICompatibleAdapter::new(
            "g4f".to_string(),
            reqwest::Client::new(),
            endpoint,
            None,
            "gpt-4o-mini".to_string(),
            upstream.map(str::to_string),
            vec!["you have reached your request limit".to_string()],
        )
    }

    fn completion(text: &str) -> String {
        json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] }).to_string()
    }

    #[tokio::test]
    async fn test_sends_upstream_and_returns_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "provider": "Bing",
                "messages": [{ "role": "user", "content": "SYS User:\nhi\nAssistant:" }]
            })))
            .with_status(200)
            .with_body(completion("Clyde: hey"))
            .create_async()
            .await;

        let outcome = adapter(server.url(), Some("Bing"))
            .attempt(&PromptContext::new("SYS ", "SYS User:\nhi\nAssistant:"))
            .await;

        mock.assert_async().await;
        assert_eq!(outcome, AttemptOutcome::Success("Clyde: hey".into()));
    }

    #[tokio::test]
    async fn test_quota_marker_in_ok_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(completion("You have reached your request limit for the hour"))
            .create_async()
            .await;

        let outcome = adapter(server.url(), None).attempt(&PromptContext::new("", "hi")).await;
        assert!(matches!(
            outcome,
            AttemptOutcome::RetryableFailure(ref f) if f.kind == FailureKind::QuotaExhausted
        ));
    }

    #[tokio::test]
    async fn test_null_content_is_empty_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(json!({ "choices": [{ "message": { "content": null } }] }).to_string())
            .create_async()
            .await;

        let outcome = adapter(server.url(), None).attempt(&PromptContext::new("", "hi")).await;
        assert!(matches!(
            outcome,
            AttemptOutcome::FatalFailure(ref f) if f.kind == FailureKind::EmptyReply
        ));
    }

    #[tokio::test]
    async fn test_unknown_upstream_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body(r#"{"error":{"message":"ProviderNotFoundError: Nope not found"}}"#)
            .create_async()
            .await;

        let outcome = adapter(server.url(), Some("Nope"))
            .attempt(&PromptContext::new("", "hi"))
            .await;
        assert!(matches!(
            outcome,
            AttemptOutcome::FatalFailure(ref f) if f.kind == FailureKind::UnsupportedMode
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let outcome = adapter(server.url(), None).attempt(&PromptContext::new("", "hi")).await;
        assert!(matches!(
            outcome,
            AttemptOutcome::RetryableFailure(ref f) if f.kind == FailureKind::RateLimited
        ));
    }
}
