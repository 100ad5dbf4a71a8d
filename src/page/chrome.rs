//! Headless Chrome page over the DevTools protocol.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::script::{extraction_script, scroll_script, READY_STATE_SCRIPT};
use super::{PageDriver, PageError, PageExtraction, PageLauncher, ScanScope, WaitStrategy};

const VIEWPORT_WIDTH: u32 = 1920;
const VIEWPORT_HEIGHT: u32 = 1080;
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
    headful: bool,
    user_agent: String,
    request_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(
        executable: Option<PathBuf>,
        headful: bool,
        user_agent: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            executable,
            headful,
            user_agent: user_agent.into(),
            request_timeout,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, PageError> {
        let args = [
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--no-first-run".to_string(),
            "--disable-extensions".to_string(),
            format!("--window-size={},{}", VIEWPORT_WIDTH, VIEWPORT_HEIGHT),
            format!("--user-agent={}", self.user_agent),
        ];

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.request_timeout)
            .viewport(Some(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .args(args);

        if self.headful {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(PageError::Launch)
    }
}

#[async_trait]
impl PageLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, PageError> {
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PageError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                // The browser process is already up; do not leak it.
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(PageError::Launch(format!("Failed to create page: {}", e)));
            }
        };

        debug!("Chrome page ready");
        Ok(Box::new(ChromePage {
            browser,
            page: Some(page),
            handler_task,
        }))
    }

    fn name(&self) -> &'static str {
        "chrome"
    }
}

pub struct ChromePage {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
}

impl ChromePage {
    fn page(&self) -> Result<&Page, PageError> {
        self.page
            .as_ref()
            .ok_or_else(|| PageError::Script("page already closed".to_string()))
    }

    async fn evaluate_string(&self, script: String) -> Result<String, PageError> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(|e| PageError::Script(e.to_string()))?
            .into_value::<String>()
            .map_err(|e| PageError::Script(e.to_string()))
    }

    async fn wait_for_dom_ready(&self, timeout: Duration) -> Result<(), PageError> {
        let start = Instant::now();
        loop {
            let state = self
                .page()?
                .evaluate(READY_STATE_SCRIPT)
                .await
                .ok()
                .and_then(|r| r.into_value::<String>().ok());

            if matches!(state.as_deref(), Some("interactive") | Some("complete")) {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(PageError::Timeout("DOM never became ready".to_string()));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), PageError> {
        match wait {
            WaitStrategy::Load => {
                let page = self.page()?;
                match tokio::time::timeout(timeout, page.goto(url)).await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(e)) => Err(PageError::Navigation(e.to_string())),
                    Err(_) => Err(PageError::Timeout(format!(
                        "load event not reached within {}s",
                        timeout.as_secs()
                    ))),
                }
            }
            WaitStrategy::DomReady => {
                self.page()?
                    .execute(NavigateParams::new(url))
                    .await
                    .map_err(|e| PageError::Navigation(e.to_string()))?;
                self.wait_for_dom_ready(timeout).await
            }
        }
    }

    async fn scroll_to(&mut self, fraction: f64) -> Result<(), PageError> {
        self.page()?
            .evaluate(scroll_script(fraction))
            .await
            .map(|_| ())
            .map_err(|e| PageError::Script(e.to_string()))
    }

    async fn run_extraction(&mut self, scope: ScanScope) -> Result<PageExtraction, PageError> {
        let json = self
            .evaluate_string(extraction_script(scope.background_limit()))
            .await?;
        serde_json::from_str(&json).map_err(|e| PageError::Script(e.to_string()))
    }

    async fn close(mut self: Box<Self>) -> Result<(), PageError> {
        let mut failures = Vec::new();

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                failures.push(format!("page: {}", e));
            }
        }
        if let Err(e) = self.browser.close().await {
            failures.push(format!("browser: {}", e));
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Chrome process did not exit cleanly: {}", e);
        }
        self.handler_task.abort();

        if failures.is_empty() {
            debug!("Chrome session closed");
            Ok(())
        } else {
            Err(PageError::Close(failures.join("; ")))
        }
    }
}
