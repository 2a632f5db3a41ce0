//! Comment generation over a batch of images.
//!
//! Images are processed strictly one at a time with a fixed pause after each
//! AI call, keeping us under the provider's rate limits. A failed item is
//! recorded and the batch moves on; only an empty batch is rejected.

use crate::config::CommentConfig;
use crate::encoder::ImageEncoder;
use crate::error::{AppError, Result};
use crate::models::{CommentResult, ImageRequest, RequestOrigin};
use providers::{ImageRef, VisionProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const CANCELLED_REASON: &str = "cancelled";

const QUOTES: &[char] = &[
    '"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '\u{300C}', '\u{300D}',
    '\u{300E}', '\u{300F}',
];

#[derive(Clone)]
pub struct CommentPipeline {
    encoder: ImageEncoder,
    provider: Arc<dyn VisionProvider>,
    settings: CommentConfig,
}

impl CommentPipeline {
    pub fn new(
        encoder: ImageEncoder,
        provider: Arc<dyn VisionProvider>,
        settings: CommentConfig,
    ) -> Self {
        Self {
            encoder,
            provider,
            settings,
        }
    }

    /// Comment on one image. Unlike the batch, failures are returned as
    /// errors.
    pub async fn generate_single(
        &self,
        image: &str,
        origin: Option<&RequestOrigin>,
        instruction: Option<&str>,
    ) -> Result<String> {
        let encoded = self.encoder.encode(image, origin)?;
        self.comment_once(&encoded, instruction).await
    }

    /// One result per input, in input order.
    pub async fn generate_batch(
        &self,
        images: &[ImageRequest],
        origin: Option<&RequestOrigin>,
        instruction: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommentResult>> {
        if images.is_empty() {
            return Err(AppError::Validation(
                "images must be a non-empty list".to_string(),
            ));
        }

        let delay = Duration::from_millis(self.settings.delay_ms);
        let mut results = Vec::with_capacity(images.len());
        let mut called_ai = false;

        info!(count = images.len(), "comment batch started");
        for (idx, req) in images.iter().enumerate() {
            if called_ai && !cancel.is_cancelled() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            called_ai = false;

            if cancel.is_cancelled() {
                debug!(idx, image = %req.image, "batch cancelled, skipping");
                results.push(CommentResult::failure(req, CANCELLED_REASON.to_string()));
                continue;
            }

            let encoded = match self.encoder.encode(&req.image, origin) {
                Ok(encoded) => encoded,
                Err(e) => {
                    warn!(idx, image = %req.image, error = %e, "could not encode image");
                    results.push(CommentResult::failure(req, e.to_string()));
                    continue;
                }
            };

            let started = Instant::now();
            let outcome = self.comment_once(&encoded, instruction).await;
            called_ai = true;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(comment) => {
                    debug!(idx, image = %req.image, elapsed_ms, "comment generated");
                    results.push(CommentResult::success(req, comment));
                }
                Err(e) => {
                    warn!(idx, image = %req.image, elapsed_ms, error = %e, "comment failed");
                    results.push(CommentResult::failure(req, e.to_string()));
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "comment batch finished"
        );
        Ok(results)
    }

    async fn comment_once(&self, image: &ImageRef, instruction: Option<&str>) -> Result<String> {
        let instruction = instruction
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.settings.default_instruction);
        let payload = self.provider.call(image, instruction).await?;
        let comment = self
            .provider
            .extract_text(&payload)
            .map(|text| sanitize_comment(&text))
            .filter(|text| !text.is_empty());
        Ok(comment.unwrap_or_else(|| {
            debug!("reply carried no text, using fallback comment");
            self.settings.fallback_comment.clone()
        }))
    }
}

/// Trim, drop surrounding quote marks, and fold line breaks into single
/// spaces.
pub fn sanitize_comment(raw: &str) -> String {
    raw.trim()
        .trim_matches(QUOTES)
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
