//! Scroll-and-extract passes over one page, merged into a single candidate set.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::models::LocationInfo;
use crate::page::{PageDriver, PageError, PageExtraction, ScanScope, WaitStrategy};
use crate::region;

/// Scroll positions visited in every pass, as fractions of document height.
pub const SCROLL_CHECKPOINTS: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("Failed to load page: {0}")]
    Navigation(PageError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPlan {
    pub iterations: u32,
    pub scroll_delay: Duration,
    pub settle: Duration,
    pub navigation_timeout: Duration,
}

impl ScrollPlan {
    /// Pause after each checkpoint, before extracting.
    pub fn checkpoint_delay(&self) -> Duration {
        self.scroll_delay / 2
    }
}

/// Raw references in first-seen order, with the best location known for each.
#[derive(Debug, Default, Clone)]
pub struct CandidateSet {
    order: Vec<String>,
    locations: HashMap<String, LocationInfo>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union the reference in; a later location only replaces the stored one when
    /// it names strictly more sections.
    pub fn merge(&mut self, reference: String, location: LocationInfo) {
        match self.locations.get_mut(&reference) {
            Some(existing) => {
                if location.sections.len() > existing.sections.len() {
                    *existing = location;
                }
            }
            None => {
                self.order.push(reference.clone());
                self.locations.insert(reference, location);
            }
        }
    }

    /// Add the reference only if it is new; existing locations are kept as-is.
    pub fn merge_coverage(&mut self, reference: String, location: LocationInfo) {
        if !self.locations.contains_key(&reference) {
            self.order.push(reference.clone());
            self.locations.insert(reference, location);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn location(&self, reference: &str) -> Option<&LocationInfo> {
        self.locations.get(reference)
    }

    fn absorb(&mut self, extraction: PageExtraction, coverage_only: bool) -> usize {
        let before = self.len();
        for candidate in extraction.candidates {
            let location = region::classify(&candidate.element, &extraction.metrics);
            for reference in candidate.references() {
                if coverage_only {
                    self.merge_coverage(reference, location.clone());
                } else {
                    self.merge(reference, location.clone());
                }
            }
        }
        self.len() - before
    }
}

/// Drive `page` through navigation, settling, the scroll passes and a final sweep.
pub async fn collect_candidates(
    page: &mut dyn PageDriver,
    url: &str,
    plan: &ScrollPlan,
) -> Result<CandidateSet, AggregateError> {
    let timed = !page.is_static();

    navigate_with_fallback(page, url, plan.navigation_timeout).await?;

    if timed {
        debug!("Settling for {:?}", plan.settle);
        tokio::time::sleep(plan.settle).await;
    }

    let mut set = CandidateSet::new();

    for pass in 1..=plan.iterations {
        for fraction in SCROLL_CHECKPOINTS {
            if let Err(e) = page.scroll_to(fraction).await {
                warn!("Scroll to {:.0}% failed: {}", fraction * 100.0, e);
            }
            if timed {
                tokio::time::sleep(plan.checkpoint_delay()).await;
            }
            let extraction = extract_or_empty(page, ScanScope::Bounded).await;
            let added = set.absorb(extraction, false);
            debug!(
                "Pass {} at {:.0}%: +{} references ({} total)",
                pass,
                fraction * 100.0,
                added,
                set.len()
            );
        }
        if timed {
            tokio::time::sleep(plan.scroll_delay).await;
        }
    }

    let extraction = extract_or_empty(page, ScanScope::Full).await;
    let added = set.absorb(extraction, true);
    info!(
        "Collected {} candidate references ({} from final sweep)",
        set.len(),
        added
    );

    Ok(set)
}

async fn navigate_with_fallback(
    page: &mut dyn PageDriver,
    url: &str,
    timeout: Duration,
) -> Result<(), AggregateError> {
    match page.navigate(url, WaitStrategy::Load, timeout).await {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!("Navigation to {} failed ({}); retrying with DOM-ready wait", url, first);
            page.navigate(url, WaitStrategy::DomReady, timeout)
                .await
                .map_err(AggregateError::Navigation)
        }
    }
}

async fn extract_or_empty(page: &mut dyn PageDriver, scope: ScanScope) -> PageExtraction {
    match page.run_extraction(scope).await {
        Ok(extraction) => extraction,
        Err(e) => {
            warn!("Extraction script failed, continuing with empty result: {}", e);
            PageExtraction::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::models::{Coordinates, RegionLabel};
    use crate::page::{DiscoveryStrategy, RawCandidate};
    use crate::region::{AncestorInfo, ElementSnapshot, PageMetrics};

    /// Scripted page: each extraction pops the next canned result.
    pub(crate) struct FakePage {
        pub extractions: VecDeque<Result<PageExtraction, PageError>>,
        pub fail_load: bool,
        pub fail_dom_ready: bool,
        /// Behave like a rendered page, so the aggregator waits between steps.
        pub timed: bool,
        pub log: Arc<Mutex<Vec<String>>>,
    }

    impl FakePage {
        pub(crate) fn new(extractions: Vec<Result<PageExtraction, PageError>>) -> Self {
            Self {
                extractions: extractions.into(),
                fail_load: false,
                fail_dom_ready: false,
                timed: false,
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl PageDriver for FakePage {
        async fn navigate(
            &mut self,
            _url: &str,
            wait: WaitStrategy,
            _timeout: Duration,
        ) -> Result<(), PageError> {
            self.log.lock().unwrap().push(format!("navigate:{:?}", wait));
            let fail = match wait {
                WaitStrategy::Load => self.fail_load,
                WaitStrategy::DomReady => self.fail_dom_ready,
            };
            if fail {
                Err(PageError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string()))
            } else {
                Ok(())
            }
        }

        async fn scroll_to(&mut self, fraction: f64) -> Result<(), PageError> {
            self.log.lock().unwrap().push(format!("scroll:{}", fraction));
            Ok(())
        }

        async fn run_extraction(&mut self, scope: ScanScope) -> Result<PageExtraction, PageError> {
            self.log.lock().unwrap().push(format!("extract:{:?}", scope));
            self.extractions
                .pop_front()
                .unwrap_or_else(|| Ok(PageExtraction::default()))
        }

        async fn close(self: Box<Self>) -> Result<(), PageError> {
            self.log.lock().unwrap().push("close".to_string());
            Ok(())
        }

        fn is_static(&self) -> bool {
            !self.timed
        }
    }

    pub(crate) fn candidate(value: &str, ancestors: &[&str]) -> RawCandidate {
        RawCandidate {
            strategy: DiscoveryStrategy::ImgSrc,
            value: value.to_string(),
            element: ElementSnapshot {
                ancestors: std::iter::once("img")
                    .chain(ancestors.iter().copied())
                    .map(|tag| AncestorInfo::new(tag, "", ""))
                    .collect(),
                ..Default::default()
            },
        }
    }

    pub(crate) fn extraction(candidates: Vec<RawCandidate>) -> PageExtraction {
        PageExtraction {
            metrics: PageMetrics {
                scroll_x: 0.0,
                scroll_y: 0.0,
                document_height: 1000.0,
            },
            candidates,
        }
    }

    fn location(sections: Vec<RegionLabel>) -> LocationInfo {
        LocationInfo {
            coordinates: Coordinates::default(),
            sections,
            context_info: String::new(),
        }
    }

    fn plan(iterations: u32) -> ScrollPlan {
        ScrollPlan {
            iterations,
            scroll_delay: Duration::ZERO,
            settle: Duration::ZERO,
            navigation_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn richer_location_wins_in_either_order() {
        let poor = location(vec![RegionLabel::Unknown]);
        let rich = location(vec![RegionLabel::Header, RegionLabel::Main]);

        let mut forward = CandidateSet::new();
        forward.merge("a.png".into(), poor.clone());
        forward.merge("a.png".into(), rich.clone());

        let mut backward = CandidateSet::new();
        backward.merge("a.png".into(), rich.clone());
        backward.merge("a.png".into(), poor);

        assert_eq!(forward.location("a.png"), Some(&rich));
        assert_eq!(backward.location("a.png"), Some(&rich));
        assert_eq!(forward.len(), 1);
    }

    #[test]
    fn equal_section_counts_keep_first_seen() {
        let mut set = CandidateSet::new();
        set.merge("a.png".into(), location(vec![RegionLabel::Header]));
        set.merge("a.png".into(), location(vec![RegionLabel::Footer]));
        assert_eq!(set.location("a.png").unwrap().sections, vec![RegionLabel::Header]);
    }

    #[test]
    fn coverage_merge_never_replaces() {
        let mut set = CandidateSet::new();
        set.merge("a.png".into(), location(vec![RegionLabel::Unknown]));
        set.merge_coverage(
            "a.png".into(),
            location(vec![RegionLabel::Header, RegionLabel::Main]),
        );
        set.merge_coverage("b.png".into(), location(vec![RegionLabel::Footer]));
        assert_eq!(set.location("a.png").unwrap().sections, vec![RegionLabel::Unknown]);
        assert_eq!(set.references().collect::<Vec<_>>(), vec!["a.png", "b.png"]);
    }

    #[tokio::test]
    async fn visits_every_checkpoint_then_final_sweep() {
        let mut page = FakePage::new(vec![]);
        let log = page.log.clone();
        collect_candidates(&mut page, "https://example.com", &plan(2))
            .await
            .unwrap();

        let log = log.lock().unwrap();
        let scrolls = log.iter().filter(|l| l.starts_with("scroll:")).count();
        let bounded = log.iter().filter(|l| *l == "extract:Bounded").count();
        assert_eq!(scrolls, 10);
        assert_eq!(bounded, 10);
        assert_eq!(log.last().map(String::as_str), Some("extract:Full"));
    }

    #[tokio::test(start_paused = true)]
    async fn rendered_pages_settle_and_pause_between_steps() {
        let mut page = FakePage::new(vec![]);
        page.timed = true;
        let plan = ScrollPlan {
            iterations: 1,
            scroll_delay: Duration::from_secs(2),
            settle: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(1),
        };

        let start = tokio::time::Instant::now();
        collect_candidates(&mut page, "https://example.com", &plan)
            .await
            .unwrap();

        // settle + five half-delay checkpoints + the full delay after the pass
        assert_eq!(start.elapsed(), Duration::from_secs(5 + 5 + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn static_pages_skip_every_wait() {
        let page_plan = ScrollPlan {
            iterations: 3,
            scroll_delay: Duration::from_secs(2),
            settle: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(1),
        };
        let mut page = FakePage::new(vec![]);

        let start = tokio::time::Instant::now();
        collect_candidates(&mut page, "https://example.com", &page_plan)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn merges_passes_and_final_sweep() {
        let mut page = FakePage::new(vec![
            Ok(extraction(vec![candidate("/a.png", &["div"])])),
            Ok(extraction(vec![
                candidate("/a.png", &["header", "main"]),
                candidate("/b.png", &["footer"]),
            ])),
            Err(PageError::Script("TypeError: x is null".to_string())),
            Ok(extraction(vec![])),
            Ok(extraction(vec![])),
            // final sweep
            Ok(extraction(vec![
                candidate("/a.png", &["nav", "aside", "footer"]),
                candidate("/c.png", &["aside"]),
            ])),
        ]);

        let set = collect_candidates(&mut page, "https://example.com", &plan(1))
            .await
            .unwrap();

        assert_eq!(set.references().collect::<Vec<_>>(), vec!["/a.png", "/b.png", "/c.png"]);
        assert_eq!(
            set.location("/a.png").unwrap().sections,
            vec![RegionLabel::Header, RegionLabel::Main]
        );
        assert_eq!(set.location("/c.png").unwrap().sections, vec![RegionLabel::Sidebar]);
    }

    #[tokio::test]
    async fn navigation_falls_back_to_dom_ready() {
        let mut page = FakePage::new(vec![]);
        page.fail_load = true;
        let log = page.log.clone();
        collect_candidates(&mut page, "https://example.com", &plan(1))
            .await
            .unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log[0], "navigate:Load");
        assert_eq!(log[1], "navigate:DomReady");
    }

    #[tokio::test]
    async fn navigation_fails_after_fallback() {
        let mut page = FakePage::new(vec![]);
        page.fail_load = true;
        page.fail_dom_ready = true;
        let err = collect_candidates(&mut page, "https://example.com", &plan(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    }
}
