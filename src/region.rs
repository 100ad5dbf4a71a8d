//! Page-region classification for a single image-bearing element.
//!
//! The rendered page only reports plain DOM facts (box, ancestry, text hints);
//! every decision about which region an element belongs to is made here.

use serde::Deserialize;

use crate::models::{Coordinates, LocationInfo, RegionLabel};

pub const MAX_ANCESTOR_DEPTH: usize = 10;
/// The element itself plus up to [`MAX_ANCESTOR_DEPTH`] ancestors.
pub const MAX_CHAIN_LEN: usize = MAX_ANCESTOR_DEPTH + 1;
const CONTEXT_FIELD_LIMIT: usize = 50;
pub const NO_CONTEXT: &str = "No context available";

/// Class/id keywords per region, checked in this order.
const KEYWORD_GROUPS: &[(RegionLabel, &[&str])] = &[
    (RegionLabel::Header, &["header", "top"]),
    (RegionLabel::Navigation, &["nav", "menu", "navigation"]),
    (RegionLabel::Sidebar, &["sidebar", "aside", "widget"]),
    (RegionLabel::Footer, &["footer", "bottom"]),
    (
        RegionLabel::Main,
        &["main", "content", "article", "hero", "banner", "slider"],
    ),
];

/// Viewport-relative box, as reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AncestorInfo {
    pub tag: String,
    pub class_name: String,
    pub id: String,
}

impl AncestorInfo {
    pub fn new(tag: &str, class_name: &str, id: &str) -> Self {
        Self {
            tag: tag.to_string(),
            class_name: class_name.to_string(),
            id: id.to_string(),
        }
    }
}

/// DOM facts about one element. `ancestors` starts with the element itself,
/// then its ancestors nearest first.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementSnapshot {
    pub rect: Rect,
    pub ancestors: Vec<AncestorInfo>,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
    /// Set when the page failed to inspect the element.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageMetrics {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub document_height: f64,
}

pub fn classify(element: &ElementSnapshot, metrics: &PageMetrics) -> LocationInfo {
    if let Some(err) = &element.error {
        return failed_classification(err);
    }

    let coordinates = Coordinates {
        x: element.rect.x + metrics.scroll_x,
        y: element.rect.y + metrics.scroll_y,
        width: element.rect.width,
        height: element.rect.height,
    };

    let mut sections = sections_from_ancestry(&element.ancestors);
    if sections.is_empty() {
        sections.push(position_band(coordinates.y, metrics.document_height));
    }

    LocationInfo {
        coordinates,
        sections,
        context_info: context_string(element),
    }
}

fn failed_classification(err: &str) -> LocationInfo {
    LocationInfo {
        coordinates: Coordinates::default(),
        sections: vec![RegionLabel::Unknown],
        context_info: format!("Error: {}", err),
    }
}

fn sections_from_ancestry(ancestors: &[AncestorInfo]) -> Vec<RegionLabel> {
    let mut sections: Vec<RegionLabel> = Vec::new();
    let mut push = |label: RegionLabel| {
        if !sections.contains(&label) {
            sections.push(label);
        }
    };

    for ancestor in ancestors.iter().take(MAX_CHAIN_LEN) {
        if let Some(label) = label_for_tag(&ancestor.tag) {
            push(label);
        }

        let class_id = format!("{} {}", ancestor.class_name, ancestor.id).to_lowercase();
        if class_id.trim().is_empty() {
            continue;
        }
        for (label, keywords) in KEYWORD_GROUPS {
            if keywords.iter().any(|k| class_id.contains(k)) {
                push(*label);
            }
        }
    }
    sections
}

fn label_for_tag(tag: &str) -> Option<RegionLabel> {
    match tag.to_lowercase().as_str() {
        "header" => Some(RegionLabel::Header),
        "nav" => Some(RegionLabel::Navigation),
        "main" => Some(RegionLabel::Main),
        "aside" => Some(RegionLabel::Sidebar),
        "footer" => Some(RegionLabel::Footer),
        "section" | "article" => Some(RegionLabel::Content),
        _ => None,
    }
}

/// Position fallback: top fifth is header, bottom fifth footer, the rest main.
pub fn position_band(absolute_y: f64, document_height: f64) -> RegionLabel {
    if !(document_height > 0.0) {
        return RegionLabel::Main;
    }
    let relative_y = absolute_y / document_height;
    if relative_y < 0.2 {
        RegionLabel::Header
    } else if relative_y > 0.8 {
        RegionLabel::Footer
    } else {
        RegionLabel::Main
    }
}

fn context_string(element: &ElementSnapshot) -> String {
    let fields = [
        ("Alt", element.alt.as_deref()),
        ("Title", element.title.as_deref()),
        ("Caption", element.caption.as_deref()),
    ];

    let parts: Vec<String> = fields
        .into_iter()
        .filter_map(|(name, value)| {
            let text = normalize_text(value?);
            if text.is_empty() {
                None
            } else {
                Some(format!("{}: {}", name, truncate(&text, CONTEXT_FIELD_LIMIT)))
            }
        })
        .collect();

    if parts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        parts.join(" | ")
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
