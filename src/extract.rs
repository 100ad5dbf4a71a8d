use std::collections::HashMap;
use std::time::Duration;

use tracing::{info, warn};

use crate::aggregate::{collect_candidates, ScrollPlan};
use crate::error::AppError;
use crate::filter::{normalize, FilterOptions};
use crate::models::{ExtractRequest, ExtractResponse, ExtractStats, RenderMode};
use crate::page::PageLauncher;
use crate::urls;

// ── Option bounds ────────────────────────────────────────────────────────────

const SCROLL_ITERATIONS: OptionBounds = OptionBounds {
    name: "scrollIterations",
    min: 1,
    max: 50,
    default: 3,
};
const SCROLL_DELAY_MS: OptionBounds = OptionBounds {
    name: "scrollDelayMs",
    min: 500,
    max: 10_000,
    default: 2000,
};
const PAGE_LOAD_WAIT_SECONDS: OptionBounds = OptionBounds {
    name: "pageLoadWaitSeconds",
    min: 3,
    max: 60,
    default: 5,
};

struct OptionBounds {
    name: &'static str,
    min: i64,
    max: i64,
    default: i64,
}

impl OptionBounds {
    fn resolve(&self, value: Option<i64>) -> Result<i64, AppError> {
        match value {
            None => Ok(self.default),
            Some(v) if (self.min..=self.max).contains(&v) => Ok(v),
            Some(v) => Err(AppError::Validation(format!(
                "{} must be between {} and {} (got {})",
                self.name, self.min, self.max, v
            ))),
        }
    }
}

// ── Validated job ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractJob {
    pub url: String,
    pub mode: RenderMode,
    pub plan: ScrollPlan,
    pub filter: FilterOptions,
}

impl ExtractJob {
    pub fn from_request(
        request: &ExtractRequest,
        navigation_timeout: Duration,
    ) -> Result<Self, AppError> {
        let url = request
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::Validation("URL is required".to_string()))?;

        let lower = url.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(AppError::Validation(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        let options = &request.options;
        let iterations = SCROLL_ITERATIONS.resolve(options.scroll_iterations)?;
        let scroll_delay_ms = SCROLL_DELAY_MS.resolve(options.scroll_delay_ms)?;
        let settle_secs = PAGE_LOAD_WAIT_SECONDS.resolve(options.page_load_wait_seconds)?;

        Ok(Self {
            url: url.to_string(),
            mode: options.mode,
            plan: ScrollPlan {
                iterations: iterations as u32,
                scroll_delay: Duration::from_millis(scroll_delay_ms as u64),
                settle: Duration::from_secs(settle_secs as u64),
                navigation_timeout,
            },
            filter: FilterOptions {
                same_domain_only: options.same_domain_only,
            },
        })
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Open a page, collect and filter its images, and close the page on every path.
pub async fn extract_images(
    launcher: &dyn PageLauncher,
    job: &ExtractJob,
) -> Result<ExtractResponse, AppError> {
    info!(
        "Extracting images from {} ({} mode, {} passes)",
        job.url,
        launcher.name(),
        job.plan.iterations
    );

    let mut page = launcher.launch().await?;
    let collected = collect_candidates(page.as_mut(), &job.url, &job.plan).await;
    if let Err(e) = page.close().await {
        warn!("Page cleanup failed: {}", e);
    }
    let candidates = collected?;

    let images = normalize(&job.url, &candidates, job.filter);

    let with_location_data = images
        .iter()
        .filter(|image| !image.location_info.is_unavailable())
        .count();

    let mut image_urls = Vec::with_capacity(images.len());
    let mut location_data = HashMap::with_capacity(images.len());
    for image in images {
        image_urls.push(image.absolute_url.clone());
        location_data.insert(image.absolute_url, image.location_info);
    }

    let stats = ExtractStats {
        total_found: candidates.len(),
        valid_images: image_urls.len(),
        site_name: urls::site_name(&job.url),
        with_location_data,
    };
    info!(
        "Found {} candidates, {} valid images on {}",
        stats.total_found, stats.valid_images, stats.site_name
    );

    Ok(ExtractResponse {
        success: true,
        image_urls,
        location_data,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::aggregate::tests::{candidate, extraction, FakePage};
    use crate::models::{ExtractOptions, RegionLabel};
    use crate::page::{PageDriver, PageError};

    struct FakeLauncher {
        page: Mutex<Option<FakePage>>,
    }

    impl FakeLauncher {
        fn new(page: FakePage) -> Self {
            Self {
                page: Mutex::new(Some(page)),
            }
        }
    }

    #[async_trait]
    impl PageLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn PageDriver>, PageError> {
            match self.page.lock().unwrap().take() {
                Some(page) => Ok(Box::new(page)),
                None => Err(PageError::Launch("no page left".to_string())),
            }
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn request(url: Option<&str>, options: ExtractOptions) -> ExtractRequest {
        ExtractRequest {
            url: url.map(str::to_string),
            options,
        }
    }

    fn job(url: &str) -> ExtractJob {
        ExtractJob::from_request(&request(Some(url), ExtractOptions::default()), Duration::from_secs(1))
            .unwrap()
    }

    #[test]
    fn defaults_fill_missing_options() {
        let job = job("https://example.com");
        assert_eq!(job.plan.iterations, 3);
        assert_eq!(job.plan.scroll_delay, Duration::from_millis(2000));
        assert_eq!(job.plan.settle, Duration::from_secs(5));
        assert_eq!(job.mode, RenderMode::Browser);
    }

    #[test]
    fn rejects_bad_requests() {
        let timeout = Duration::from_secs(1);
        let cases = [
            request(None, ExtractOptions::default()),
            request(Some("   "), ExtractOptions::default()),
            request(Some("ftp://example.com"), ExtractOptions::default()),
            request(
                Some("https://example.com"),
                ExtractOptions {
                    scroll_iterations: Some(0),
                    ..Default::default()
                },
            ),
            request(
                Some("https://example.com"),
                ExtractOptions {
                    scroll_delay_ms: Some(10_001),
                    ..Default::default()
                },
            ),
            request(
                Some("https://example.com"),
                ExtractOptions {
                    page_load_wait_seconds: Some(2),
                    ..Default::default()
                },
            ),
        ];
        for case in &cases {
            assert!(matches!(
                ExtractJob::from_request(case, timeout),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn range_message_names_the_option() {
        let err = ExtractJob::from_request(
            &request(
                Some("https://example.com"),
                ExtractOptions {
                    scroll_iterations: Some(51),
                    ..Default::default()
                },
            ),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "scrollIterations must be between 1 and 50 (got 51)");
    }

    #[tokio::test]
    async fn builds_response_from_collected_candidates() {
        let page = FakePage::new(vec![Ok(extraction(vec![
            candidate("/logo.png", &["header"]),
            candidate("https://cdn.x.com/f.png", &["footer"]),
            candidate("/api/pixel.png", &["footer"]),
        ]))]);
        let log = page.log.clone();
        let launcher = FakeLauncher::new(page);

        let response = extract_images(&launcher, &job("https://www.example.com/post"))
            .await
            .unwrap();

        assert_eq!(
            response.image_urls,
            vec!["https://www.example.com/logo.png", "https://cdn.x.com/f.png"]
        );
        assert_eq!(
            response.location_data["https://www.example.com/logo.png"].sections,
            vec![RegionLabel::Header]
        );
        assert_eq!(
            response.location_data["https://cdn.x.com/f.png"].sections,
            vec![RegionLabel::Footer]
        );
        assert_eq!(response.stats.total_found, 3);
        assert_eq!(response.stats.valid_images, 2);
        assert_eq!(response.stats.with_location_data, 2);
        assert_eq!(response.stats.site_name, "example_com");
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn closes_page_when_navigation_fails() {
        let mut page = FakePage::new(vec![]);
        page.fail_load = true;
        page.fail_dom_ready = true;
        let log: Arc<Mutex<Vec<String>>> = page.log.clone();
        let launcher = FakeLauncher::new(page);

        let err = extract_images(&launcher, &job("https://example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Navigation(_)));
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn launch_failure_is_a_browser_error() {
        let launcher = FakeLauncher {
            page: Mutex::new(None),
        };
        let err = extract_images(&launcher, &job("https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Browser(_)));
    }
}
