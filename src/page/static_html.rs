//! Requests-only page: the HTML is fetched once and inspected without rendering.
//!
//! There is no layout, so element boxes are empty and an element's vertical
//! position is approximated by its document-order index over the element count.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{
    DiscoveryStrategy, PageDriver, PageError, PageExtraction, PageLauncher, RawCandidate, ScanScope,
    WaitStrategy,
};
use crate::region::{AncestorInfo, ElementSnapshot, PageMetrics, Rect, MAX_CHAIN_LEN};

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const LAZY_ATTRIBUTES: &[&str] = &["data-src", "data-lazy-src", "data-original"];
const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "data-srcset"];
const BACKGROUND_ATTRIBUTES: &[&str] = &["data-bg", "data-background"];

#[derive(Clone)]
pub struct StaticLauncher {
    client: reqwest::Client,
}

impl StaticLauncher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageLauncher for StaticLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, PageError> {
        Ok(Box::new(StaticPage::new(self.client.clone())))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// The document never changes after navigation, so each scan scope is walked
/// at most once and replayed at later checkpoints.
pub struct StaticPage {
    client: reqwest::Client,
    html: Option<String>,
    bounded: Option<PageExtraction>,
    full: Option<PageExtraction>,
}

impl StaticPage {
    fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            html: None,
            bounded: None,
            full: None,
        }
    }

    #[cfg(test)]
    fn from_html(client: reqwest::Client, html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Self::new(client)
        }
    }

    async fn fetch_html(&self, url: &str, timeout: Duration) -> Result<String, PageError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, HTML_ACCEPT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PageError::Timeout(format!("TimeoutError: {}", e))
                } else if e.is_connect() {
                    PageError::Navigation(format!("ConnectError: {}", e))
                } else {
                    PageError::Navigation(format!("RequestError: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::Navigation(format!("Upstream returned HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        if !content_type.contains("text/html") && !content_type.contains("xhtml") {
            return Err(PageError::Navigation("URL did not return HTML".to_string()));
        }

        response
            .text()
            .await
            .map_err(|e| PageError::Navigation(e.to_string()))
    }
}

#[async_trait]
impl PageDriver for StaticPage {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), PageError> {
        let html = self.fetch_html(url, timeout).await?;
        self.html = Some(html);
        self.bounded = None;
        self.full = None;
        Ok(())
    }

    async fn scroll_to(&mut self, _fraction: f64) -> Result<(), PageError> {
        Ok(())
    }

    async fn run_extraction(&mut self, scope: ScanScope) -> Result<PageExtraction, PageError> {
        let html = self
            .html
            .as_deref()
            .ok_or_else(|| PageError::Script("no document loaded".to_string()))?;
        let slot = match scope {
            ScanScope::Bounded => &mut self.bounded,
            ScanScope::Full => &mut self.full,
        };
        let extraction = slot.get_or_insert_with(|| extract_from_html(html, scope));
        Ok(extraction.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), PageError> {
        Ok(())
    }

    fn is_static(&self) -> bool {
        true
    }
}

// ── Document walk ────────────────────────────────────────────────────────────

pub fn extract_from_html(html: &str, scope: ScanScope) -> PageExtraction {
    let document = Html::parse_document(html);
    let all = Selector::parse("*").unwrap();

    let elements: Vec<ElementRef<'_>> = document.select(&all).collect();
    let positions: HashMap<_, usize> = elements
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id(), i))
        .collect();
    let total = elements.len();
    let background_limit = scope.background_limit().unwrap_or(usize::MAX);
    let mut candidates = Vec::new();

    for (index, el) in elements.iter().copied().enumerate() {
        let name = el.value().name();

        if name == "img" {
            push_attr(&mut candidates, el, index, "src", DiscoveryStrategy::ImgSrc, el);
            for attr in LAZY_ATTRIBUTES {
                push_attr(&mut candidates, el, index, attr, DiscoveryStrategy::LazyAttribute, el);
            }
            for attr in SRCSET_ATTRIBUTES {
                push_attr(&mut candidates, el, index, attr, DiscoveryStrategy::Srcset, el);
            }
        }

        if name == "source" {
            if let Some(picture) = enclosing(el, "picture") {
                let owner = find_first_tag(picture, "img").unwrap_or(picture);
                let owner_index = positions.get(&owner.id()).copied().unwrap_or(index);
                for attr in SRCSET_ATTRIBUTES {
                    push_attr(
                        &mut candidates,
                        el,
                        owner_index,
                        attr,
                        DiscoveryStrategy::PictureSource,
                        owner,
                    );
                }
            }
        }

        if index < background_limit {
            if let Some(style) = el.value().attr("style") {
                let lower = style.to_lowercase();
                if lower.contains("background") && lower.contains("url(") {
                    candidates.push(RawCandidate {
                        strategy: DiscoveryStrategy::CssBackground,
                        value: style.to_string(),
                        element: snapshot(el, index),
                    });
                }
            }
            for attr in BACKGROUND_ATTRIBUTES {
                if let Some(value) = el.value().attr(attr).filter(|v| !v.trim().is_empty()) {
                    candidates.push(RawCandidate {
                        strategy: DiscoveryStrategy::CssBackground,
                        value: format!("url({})", value.trim()),
                        element: snapshot(el, index),
                    });
                }
            }
        }
    }

    PageExtraction {
        metrics: PageMetrics {
            scroll_x: 0.0,
            scroll_y: 0.0,
            document_height: total as f64,
        },
        candidates,
    }
}

fn push_attr(
    candidates: &mut Vec<RawCandidate>,
    source: ElementRef<'_>,
    index: usize,
    attr: &str,
    strategy: DiscoveryStrategy,
    owner: ElementRef<'_>,
) {
    if let Some(value) = source.value().attr(attr).filter(|v| !v.trim().is_empty()) {
        candidates.push(RawCandidate {
            strategy,
            value: value.to_string(),
            element: snapshot(owner, index),
        });
    }
}

fn snapshot(el: ElementRef<'_>, index: usize) -> ElementSnapshot {
    let ancestors = std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .take(MAX_CHAIN_LEN)
        .map(|a| {
            AncestorInfo::new(
                a.value().name(),
                &a.value().classes().collect::<Vec<_>>().join(" "),
                a.value().id().unwrap_or(""),
            )
        })
        .collect();

    let caption = enclosing(el, "figure")
        .and_then(|figure| find_first_tag(figure, "figcaption"))
        .map(collect_text);

    ElementSnapshot {
        rect: Rect {
            x: 0.0,
            y: index as f64,
            width: 0.0,
            height: 0.0,
        },
        ancestors,
        alt: el.value().attr("alt").map(str::to_string),
        title: el.value().attr("title").map(str::to_string),
        caption,
        error: None,
    }
}

// ── DOM utility helpers ──────────────────────────────────────────────────────

fn enclosing<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == tag)
}

/// Depth-first search for the first element with the given tag name.
fn find_first_tag<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|d| d.value().name() == tag)
}

fn collect_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join("")
}
