use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::extract::{extract_images, ExtractJob};
use crate::models::{AnalyzeRequest, AnalyzeResponse, ExtractRequest, ExtractResponse, RenderMode};
use crate::page::{ChromeLauncher, PageLauncher, StaticLauncher};
use crate::probe::{Prober, MAX_BATCH};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub prober: Prober,
    pub browser: Arc<dyn PageLauncher>,
    pub static_pages: Arc<dyn PageLauncher>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let page_client = config.http_client()?;
        let probe_client = config.probe_client()?;
        let browser = ChromeLauncher::new(
            config.chrome_path.clone(),
            config.headful,
            config.user_agent.clone(),
            config.navigation_timeout(),
        );
        Ok(Self::with_launchers(
            config,
            probe_client,
            Arc::new(browser),
            Arc::new(StaticLauncher::new(page_client)),
        ))
    }

    pub fn with_launchers(
        config: Config,
        probe_client: reqwest::Client,
        browser: Arc<dyn PageLauncher>,
        static_pages: Arc<dyn PageLauncher>,
    ) -> Self {
        let prober = Prober::new(probe_client, config.probe_settings());
        Self {
            config: Arc::new(config),
            prober,
            browser,
            static_pages,
        }
    }

    fn launcher(&self, mode: RenderMode) -> &dyn PageLauncher {
        match mode {
            RenderMode::Browser => self.browser.as_ref(),
            RenderMode::Static => self.static_pages.as_ref(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let max_body = state.config.max_body_bytes();

    Router::new()
        .route("/health", get(health))
        .route("/api/extract-images", post(extract_endpoint))
        .route("/api/analyze-images", post(analyze_endpoint))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Internal server error".to_string()
    };
    AppError::Internal(message).into_response()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "features": {
            "scrollPasses": true,
            "lazyLoadDetection": true,
            "cssBackgrounds": true,
            "srcsetParsing": true,
            "regionClassification": true,
            "contentTypeFiltering": true,
            "staticMode": true,
        },
        "services": {
            "browser": "chrome",
            "probe": "http",
        },
    }))
}

async fn extract_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractResponse>, AppError> {
    let Json(request) = payload?;
    let job = ExtractJob::from_request(&request, state.config.navigation_timeout())?;
    let response = extract_images(state.launcher(job.mode), &job).await?;
    Ok(Json(response))
}

async fn analyze_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(request) = payload?;
    let urls = request
        .urls
        .ok_or_else(|| AppError::Validation("URLs array is required".to_string()))?;
    if urls.len() > MAX_BATCH {
        return Err(AppError::Validation(format!(
            "Too many URLs: {} (maximum {} per request)",
            urls.len(),
            MAX_BATCH
        )));
    }

    info!("Analyzing {} image URLs", urls.len());
    let report = state
        .prober
        .analyze(&urls, request.location_data.as_ref())
        .await;

    Ok(Json(AnalyzeResponse {
        success: true,
        results: report.results,
        summary: report.summary,
    }))
}
