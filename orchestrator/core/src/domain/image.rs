// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Prompt images
//!
//! A request may carry an image URL. It is fetched once per request, before
//! the provider loop, and shared by every image-capable adapter attempt.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use bytes::Bytes;
use std::time::Duration;

/// Image bytes plus the MIME type backends need to interpret them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub source_url: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl ImagePayload {
    pub fn new(source_url: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            source_url: source_url.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn to_base64(&self) -> String {
        B64_ENGINE.encode(&self.data)
    }

    /// `data:` URI form used by OpenAI-style vision messages.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("failed to download image: {0}")]
    Network(String),

    #[error("image host answered HTTP {0}")]
    Status(u16),

    #[error("content is not an image ({0})")]
    NotAnImage(String),

    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("image host did not answer within {0:?}")]
    Timeout(Duration),
}

/// Fetches the image referenced by a request.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<ImagePayload, ImageLoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let image = ImagePayload::new("http://x/y.png", "image/png", Bytes::from_static(b"abc"));
        assert_eq!(image.to_base64(), "YWJj");
        assert_eq!(image.to_data_uri(), "data:image/png;base64,YWJj");
    }
}
