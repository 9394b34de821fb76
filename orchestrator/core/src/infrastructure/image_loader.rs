// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

// HTTP image loader
//
// Downloads the image attached to a prompt. The MIME type comes from the
// response's Content-Type when it names an image, otherwise from sniffing the
// magic bytes.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use crate::domain::image::{ImageLoadError, ImageLoader, ImagePayload};

pub struct HttpImageLoader {
    client: reqwest::Client,
    max_bytes: usize,
    timeout: Duration,
}

impl HttpImageLoader {
    /// `timeout` bounds the whole download, body included.
    pub fn new(client: reqwest::Client, max_bytes: usize, timeout: Duration) -> Self {
        Self {
            client,
            max_bytes,
            timeout,
        }
    }

    async fn fetch(&self, url: &str) -> Result<(Option<String>, Bytes), ImageLoadError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageLoadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageLoadError::Status(status.as_u16()));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(ImageLoadError::TooLarge { limit: self.max_bytes });
            }
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_lowercase());

        // Content-Length may be absent or wrong; enforce the cap while streaming.
        let mut data = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ImageLoadError::Network(e.to_string()))?
        {
            if data.len() + chunk.len() > self.max_bytes {
                return Err(ImageLoadError::TooLarge { limit: self.max_bytes });
            }
            data.extend_from_slice(&chunk);
        }

        Ok((declared, data.freeze()))
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<ImagePayload, ImageLoadError> {
        let (declared, data) = tokio::time::timeout(self.timeout, self.fetch(url))
            .await
            .map_err(|_| ImageLoadError::Timeout(self.timeout))??;

        let mime_type = match declared {
            Some(mime) if mime.starts_with("image/") => mime,
            other => match infer::get(&data) {
                Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
                    kind.mime_type().to_string()
                }
                _ => {
                    return Err(ImageLoadError::NotAnImage(
                        other.unwrap_or_else(|| "unknown content type".to_string()),
                    ))
                }
            },
        };

        debug!(url, mime_type = %mime_type, bytes = data.len(), "Loaded prompt image");
        Ok(ImagePayload::new(url, mime_type, data))
    }
}
