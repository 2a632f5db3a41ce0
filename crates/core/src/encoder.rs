//! Turns a stored image into something the AI service can consume.
//!
//! A remote model cannot fetch from a private host, so requests arriving on
//! loopback or private-range hosts get the bytes inline; everyone else gets
//! a public URL.

use crate::error::{AppError, Result};
use crate::models::RequestOrigin;
use base64::Engine;
use providers::ImageRef;
use reqwest::Url;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{AssetStore, StorageError};
use tracing::debug;

/// Decides whether a host is unreachable from the public internet.
pub trait NetworkClassifier: Send + Sync {
    fn is_private(&self, host: &str) -> bool;
}

/// Loopback, `localhost`, RFC1918, link-local and IPv6 unique-local ranges.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrivateRangeClassifier;

impl NetworkClassifier for PrivateRangeClassifier {
    fn is_private(&self, host: &str) -> bool {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local") {
            return true;
        }
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => is_private_v4(&ip),
            Ok(IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(v4) => is_private_v4(&v4),
                None => {
                    ip.is_loopback()
                        || ip.is_unspecified()
                        || is_unique_local(&ip)
                        || is_unicast_link_local(&ip)
                }
            },
            Err(_) => false,
        }
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn is_unicast_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

pub fn mime_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

/// Public URL for `public_path` as seen from `origin`. `None` when the
/// origin cannot form a valid http(s) base.
pub fn public_url(origin: &RequestOrigin, public_path: &str) -> Option<String> {
    let scheme = origin.scheme.trim().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let host = origin.host.trim();
    if host.is_empty() {
        return None;
    }
    let base = Url::parse(&format!("{}://{}/", scheme, host)).ok()?;
    base.join(public_path.trim_start_matches('/'))
        .ok()
        .map(String::from)
}

#[derive(Clone)]
pub struct ImageEncoder {
    store: Arc<dyn AssetStore>,
    classifier: Arc<dyn NetworkClassifier>,
}

impl ImageEncoder {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self::with_classifier(store, Arc::new(PrivateRangeClassifier))
    }

    pub fn with_classifier(
        store: Arc<dyn AssetStore>,
        classifier: Arc<dyn NetworkClassifier>,
    ) -> Self {
        Self { store, classifier }
    }

    /// Encode the image at `public_path`. Without an origin (offline use)
    /// the inline form is always chosen.
    pub fn encode(&self, public_path: &str, origin: Option<&RequestOrigin>) -> Result<ImageRef> {
        let bytes = self.store.read_bytes(public_path).map_err(|e| match e {
            StorageError::NotFound(p) => AppError::ImageNotFound(PathBuf::from(p)),
            other => AppError::from(other),
        })?;

        let mime = mime_for(public_path);
        let inline = ImageRef::Inline {
            mime: mime.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        };

        let Some(origin) = origin else {
            return Ok(inline);
        };
        if self.classifier.is_private(origin.hostname()) {
            debug!(host = %origin.host, "private host, sending image inline");
            return Ok(inline);
        }
        match public_url(origin, public_path) {
            Some(url) => Ok(ImageRef::Url { url }),
            None => {
                debug!(host = %origin.host, "could not build public url, sending inline");
                Ok(inline)
            }
        }
    }
}
