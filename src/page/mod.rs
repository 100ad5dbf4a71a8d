//! The rendered-page capability the aggregator drives.
//!
//! A [`PageDriver`] owns one page for the lifetime of an extraction call. It
//! navigates, scrolls, and reports raw image references together with the DOM
//! facts needed to classify where each one sits. Two implementations exist: a
//! headless Chrome page ([`chrome`]) and a fetched, unrendered document
//! ([`static_html`]).

pub mod chrome;
mod script;
pub mod static_html;

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::region::{ElementSnapshot, PageMetrics};

pub use chrome::ChromeLauncher;
pub use static_html::StaticLauncher;

/// Elements inspected for CSS backgrounds in a bounded scan.
pub const BACKGROUND_SCAN_LIMIT: usize = 1000;

static CSS_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\(\s*["']?([^"')]+?)["']?\s*\)"#).unwrap());

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("Failed to close page: {0}")]
    Close(String),
}

// ── Extraction data ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Wait for the full load event.
    Load,
    /// Return as soon as the DOM is interactive.
    DomReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanScope {
    /// Only the first [`BACKGROUND_SCAN_LIMIT`] elements are checked for backgrounds.
    Bounded,
    Full,
}

impl ScanScope {
    pub fn background_limit(self) -> Option<usize> {
        match self {
            ScanScope::Bounded => Some(BACKGROUND_SCAN_LIMIT),
            ScanScope::Full => None,
        }
    }
}

/// Where a raw reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscoveryStrategy {
    /// `img[src]`
    ImgSrc,
    /// `data-src`, `data-lazy-src`, `data-original`
    LazyAttribute,
    /// `img[srcset]`, `img[data-srcset]`
    Srcset,
    /// `picture > source[srcset]`
    PictureSource,
    /// Computed `background-image`
    CssBackground,
}

/// One attribute or style value as read from the page, plus its owning element.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandidate {
    pub strategy: DiscoveryStrategy,
    pub value: String,
    #[serde(default)]
    pub element: ElementSnapshot,
}

impl RawCandidate {
    /// Image references carried by the raw value.
    pub fn references(&self) -> Vec<String> {
        match self.strategy {
            DiscoveryStrategy::ImgSrc | DiscoveryStrategy::LazyAttribute => {
                let value = self.value.trim();
                if value.is_empty() {
                    Vec::new()
                } else {
                    vec![value.to_string()]
                }
            }
            DiscoveryStrategy::Srcset | DiscoveryStrategy::PictureSource => {
                parse_srcset(&self.value)
            }
            DiscoveryStrategy::CssBackground => css_urls(&self.value),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageExtraction {
    pub metrics: PageMetrics,
    pub candidates: Vec<RawCandidate>,
}

/// URLs from a `srcset`, descriptors dropped.
pub fn parse_srcset(srcset: &str) -> Vec<String> {
    srcset
        .split(',')
        .filter_map(|part| part.split_whitespace().next())
        .map(|url| url.to_string())
        .collect()
}

/// Every `url(...)` inside a CSS value.
pub fn css_urls(css: &str) -> Vec<String> {
    CSS_URL_RE
        .captures_iter(css)
        .map(|cap| cap[1].trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

// ── Capability traits ────────────────────────────────────────────────────────

#[async_trait]
pub trait PageDriver: Send {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), PageError>;

    /// Scroll to `fraction` (0.0..=1.0) of the current document height.
    async fn scroll_to(&mut self, fraction: f64) -> Result<(), PageError>;

    async fn run_extraction(&mut self, scope: ScanScope) -> Result<PageExtraction, PageError>;

    async fn close(self: Box<Self>) -> Result<(), PageError>;

    /// Static documents never change after load, so timed waits are pointless.
    fn is_static(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, PageError>;

    fn name(&self) -> &'static str;
}
