//! Metadata probes for a batch of image URLs.
//!
//! Every URL is probed independently: HEAD first, then a ranged GET when the
//! HEAD response gives no usable size. Probes run concurrently but never more
//! than `concurrency` at a time.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::content_type::{extension_from_mime, extension_from_url, is_non_image, mime_essence};
use crate::models::{AnalyzeSummary, LocationInfo, ProbeResult};

pub const MAX_BATCH: usize = 1000;
pub const LARGE_IMAGE_BYTES: u64 = 500 * 1024;
const RANGE_PROBE: &str = "bytes=0-1023";

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub concurrency: usize,
    pub head_timeout: Duration,
    pub range_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success {
        size_bytes: u64,
        content_type: Option<String>,
    },
    /// Reachable, but the server says it is not an image.
    Filtered { content_type: String },
    Failed { error: String },
}

#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<ProbeResult>,
    pub summary: AnalyzeSummary,
}

#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
    settings: ProbeSettings,
}

impl Prober {
    pub fn new(client: reqwest::Client, settings: ProbeSettings) -> Self {
        Self { client, settings }
    }

    /// Probe the batch; only successful probes are returned, the rest are counted.
    pub async fn analyze(
        &self,
        urls: &[String],
        location_data: Option<&HashMap<String, LocationInfo>>,
    ) -> BatchReport {
        let semaphore = Semaphore::new(self.settings.concurrency.max(1));

        let probes = urls.iter().map(|url| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.probe(url).await
            }
        });
        let outcomes = join_all(probes).await;

        let report = summarize(urls, outcomes, location_data);
        info!(
            "Analyzed {} URLs: {} ok, {} filtered, {} failed",
            report.summary.total_processed,
            report.summary.successful,
            report.summary.filtered,
            report.summary.failed
        );
        report
    }

    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        if url.trim_start().to_lowercase().starts_with("data:") {
            return probe_data_uri(url.trim());
        }

        let head = self
            .client
            .head(url)
            .timeout(self.settings.head_timeout)
            .send()
            .await;

        let response = match head {
            Ok(r) => r,
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                return ProbeOutcome::Failed {
                    error: describe_error(&e),
                };
            }
        };

        if response.status().is_success() {
            let content_type = header_str(response.headers(), CONTENT_TYPE);
            if is_non_image(content_type.as_deref()) {
                return filtered(content_type);
            }
            if let Some(size_bytes) = header_u64(response.headers(), CONTENT_LENGTH) {
                return ProbeOutcome::Success {
                    size_bytes,
                    content_type,
                };
            }
        } else {
            debug!("HEAD {} answered {}; trying ranged GET", url, response.status());
        }

        self.range_probe(url).await
    }

    async fn range_probe(&self, url: &str) -> ProbeOutcome {
        let response = match self
            .client
            .get(url)
            .header(RANGE, RANGE_PROBE)
            .timeout(self.settings.range_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!("GET {} failed: {}", url, e);
                return ProbeOutcome::Failed {
                    error: describe_error(&e),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            return ProbeOutcome::Failed {
                error: format!("HTTP {}", status),
            };
        }

        let headers = response.headers();
        let content_type = header_str(headers, CONTENT_TYPE);
        if is_non_image(content_type.as_deref()) {
            return filtered(content_type);
        }
        let size_bytes = content_range_total(headers)
            .or_else(|| header_u64(headers, CONTENT_LENGTH))
            .unwrap_or(0);

        // Dropping the response aborts the body stream.
        drop(response);

        ProbeOutcome::Success {
            size_bytes,
            content_type,
        }
    }
}

fn filtered(content_type: Option<String>) -> ProbeOutcome {
    ProbeOutcome::Filtered {
        content_type: content_type.unwrap_or_default(),
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("TimeoutError: {}", e)
    } else if e.is_connect() {
        format!("ConnectError: {}", e)
    } else {
        format!("RequestError: {}", e)
    }
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn header_u64(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<u64> {
    header_str(headers, name).and_then(|s| s.parse().ok())
}

/// `bytes 0-1023/48213` → 48213.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, CONTENT_RANGE)
        .and_then(|s| s.rsplit('/').next().map(str::to_string))
        .and_then(|total| total.trim().parse().ok())
}

fn probe_data_uri(url: &str) -> ProbeOutcome {
    let Some((header, payload)) = url.split_once(',') else {
        return ProbeOutcome::Failed {
            error: "Invalid data URI".to_string(),
        };
    };
    let header = &header["data:".len()..];
    let mut parts = header.split(';');
    let mime = parts.next().unwrap_or("").trim();
    let mime = if mime.is_empty() { "text/plain" } else { mime }.to_string();
    let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    if is_non_image(Some(&mime)) {
        return ProbeOutcome::Filtered { content_type: mime };
    }

    let size_bytes = if is_base64 {
        match base64_payload_size(payload) {
            Some(size) => size,
            None => {
                return ProbeOutcome::Failed {
                    error: "Invalid base64".to_string(),
                }
            }
        }
    } else {
        payload.len() as u64
    };

    ProbeOutcome::Success {
        size_bytes,
        content_type: Some(mime),
    }
}

/// Decoded size of a base64 payload without decoding it: `len * 3 / 4 - padding`.
/// Padding is optional; `None` when the payload has characters outside the
/// standard or URL-safe alphabets.
fn base64_payload_size(payload: &str) -> Option<u64> {
    let clean: Vec<u8> = payload.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let body_len = clean.len() - clean.iter().rev().take_while(|b| **b == b'=').count();
    let padding = clean.len() - body_len;
    let valid = clean[..body_len]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_'));
    if !valid || padding > 2 {
        return None;
    }
    Some((clean.len() as u64 * 3 / 4).saturating_sub(padding as u64))
}

// ── Summary ──────────────────────────────────────────────────────────────────

fn summarize(
    urls: &[String],
    outcomes: Vec<ProbeOutcome>,
    location_data: Option<&HashMap<String, LocationInfo>>,
) -> BatchReport {
    let mut summary = AnalyzeSummary {
        total_processed: urls.len(),
        ..Default::default()
    };
    let mut results = Vec::new();

    for (url, outcome) in urls.iter().zip(outcomes) {
        match outcome {
            ProbeOutcome::Success {
                size_bytes,
                content_type,
            } => {
                let location_info = location_data.and_then(|m| m.get(url)).cloned();
                let result = success_result(url, size_bytes, content_type, location_info);

                summary.successful += 1;
                summary.total_bytes += size_bytes;
                if size_bytes >= LARGE_IMAGE_BYTES {
                    summary.large_images += 1;
                }
                if result.location_info.is_some() {
                    summary.with_location_data += 1;
                }
                *summary
                    .format_counts
                    .entry(format_label(&result.kind))
                    .or_insert(0) += 1;
                results.push(result);
            }
            ProbeOutcome::Filtered { content_type } => {
                summary.filtered += 1;
                *summary
                    .filtered_content_types
                    .entry(mime_essence(&content_type))
                    .or_insert(0) += 1;
            }
            ProbeOutcome::Failed { error } => {
                debug!("Probe failed for {}: {}", url, error);
            }
        }
    }

    summary.failed = summary.total_processed - summary.successful - summary.filtered;
    BatchReport { results, summary }
}

fn success_result(
    url: &str,
    size_bytes: u64,
    content_type: Option<String>,
    location_info: Option<LocationInfo>,
) -> ProbeResult {
    let extension = content_type
        .as_deref()
        .and_then(extension_from_mime)
        .or_else(|| extension_from_url(url));

    ProbeResult {
        url: url.to_string(),
        filename: filename_for(url, extension),
        kind: extension.unwrap_or("unknown").to_string(),
        size_bytes,
        size: if size_bytes > 0 {
            format_file_size(size_bytes)
        } else {
            "(unknown)".to_string()
        },
        success: true,
        content_type,
        error: None,
        location_info,
    }
}

fn format_label(kind: &str) -> String {
    match kind.to_uppercase().as_str() {
        "JPG" => "JPEG".to_string(),
        other => other.to_string(),
    }
}

fn filename_for(url: &str, extension: Option<&str>) -> String {
    if url.to_lowercase().starts_with("data:") {
        return format!("base64_image.{}", extension.unwrap_or("unknown"));
    }
    let name = url
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .rsplit('/')
        .next()
        .unwrap_or("");
    if !name.is_empty() && name.contains('.') {
        return name.to_string();
    }
    match extension {
        Some(ext) => format!("image.{}", ext),
        None => "image".to_string(),
    }
}

/// Human-readable size, DevTools style.
pub fn format_file_size(size_bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let size = size_bytes as f64;
    if size_bytes == 0 {
        "0 B".to_string()
    } else if size < KB {
        format!("{} B", size_bytes)
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else if size < GB {
        format!("{:.1} MB", size / MB)
    } else {
        format!("{:.1} GB", size / GB)
    }
}
