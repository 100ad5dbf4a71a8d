//! Turns the raw candidate set into unique, absolute, plausible image URLs.

use std::collections::HashSet;

use tracing::debug;

use crate::aggregate::CandidateSet;
use crate::models::LocationInfo;
use crate::urls;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedImage {
    pub absolute_url: String,
    pub location_info: LocationInfo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub same_domain_only: bool,
}

/// Output keeps first-occurrence order of the candidate set.
pub fn normalize(
    page_url: &str,
    candidates: &CandidateSet,
    options: FilterOptions,
) -> Vec<ValidatedImage> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut images = Vec::new();

    for reference in candidates.references() {
        let Some(absolute) = accept(page_url, reference, options) else {
            continue;
        };
        if !seen.insert(absolute.clone()) {
            continue;
        }
        let location_info = candidates
            .location(reference)
            .cloned()
            .unwrap_or_else(LocationInfo::unavailable);
        images.push(ValidatedImage {
            absolute_url: absolute,
            location_info,
        });
    }

    debug!(
        "Filtered {} candidates down to {} images",
        candidates.len(),
        images.len()
    );
    images
}

fn accept(page_url: &str, reference: &str, options: FilterOptions) -> Option<String> {
    let reference = reference.trim();
    if urls::is_rejected_reference(reference) || urls::is_ignored_host(reference) {
        return None;
    }

    let absolute = urls::make_absolute(page_url, reference)?;
    if urls::is_ignored_host(&absolute) || !urls::is_plausible_image(&absolute) {
        return None;
    }
    if options.same_domain_only && !urls::is_same_domain(&absolute, page_url) {
        return None;
    }
    Some(absolute)
}
