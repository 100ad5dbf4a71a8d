use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Location data ────────────────────────────────────────────────────────────

/// Semantic page region an image sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionLabel {
    Header,
    Navigation,
    Main,
    Sidebar,
    Footer,
    Content,
    Unknown,
}

/// Absolute document-space pixel box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub coordinates: Coordinates,
    pub sections: Vec<RegionLabel>,
    pub context_info: String,
}

pub const UNAVAILABLE_CONTEXT: &str = "Location data unavailable";

impl LocationInfo {
    /// Stand-in for URLs that never received a classification.
    pub fn unavailable() -> Self {
        Self {
            coordinates: Coordinates::default(),
            sections: vec![RegionLabel::Unknown],
            context_info: UNAVAILABLE_CONTEXT.to_string(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.context_info == UNAVAILABLE_CONTEXT
    }
}

// ── Extract ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Browser,
    Static,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOptions {
    pub scroll_iterations: Option<i64>,
    pub scroll_delay_ms: Option<i64>,
    pub page_load_wait_seconds: Option<i64>,
    #[serde(default)]
    pub mode: RenderMode,
    #[serde(default)]
    pub same_domain_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub url: Option<String>,
    #[serde(default)]
    pub options: ExtractOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractStats {
    pub total_found: usize,
    pub valid_images: usize,
    pub site_name: String,
    pub with_location_data: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub success: bool,
    pub image_urls: Vec<String>,
    pub location_data: HashMap<String, LocationInfo>,
    pub stats: ExtractStats,
}

// ── Analyze ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub urls: Option<Vec<String>>,
    #[serde(default)]
    pub location_data: Option<HashMap<String, LocationInfo>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub url: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size_bytes: u64,
    pub size: String,
    pub success: bool,
    pub content_type: Option<String>,
    pub error: Option<String>,
    pub location_info: Option<LocationInfo>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeSummary {
    pub total_processed: usize,
    pub successful: usize,
    pub filtered: usize,
    pub failed: usize,
    pub filtered_content_types: HashMap<String, usize>,
    pub with_location_data: usize,
    pub total_bytes: u64,
    pub format_counts: HashMap<String, usize>,
    pub large_images: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub results: Vec<ProbeResult>,
    pub summary: AnalyzeSummary,
}
