//! Pure URL helpers: resolution, plausibility and host rules.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

// ── Rule tables ──────────────────────────────────────────────────────────────

/// Platform hosts whose images are almost always tracking pixels or embeds.
pub const IGNORED_HOSTS: &[&str] = &[
    "facebook.com",
    "facebook.net",
    "fbcdn.net",
    "instagram.com",
    "cdninstagram.com",
    "twitter.com",
    "twimg.com",
    "linkedin.com",
    "licdn.com",
    "pinterest.com",
    "pinimg.com",
    "tiktok.com",
    "youtube.com",
    "ytimg.com",
    "google-analytics.com",
    "googletagmanager.com",
    "doubleclick.net",
];

/// Path fragments that rule a URL out regardless of its extension.
pub const NON_IMAGE_PATH_FRAGMENTS: &[&str] = &[
    "/api/", ".json", ".html", ".htm", ".js", ".css", ".xml", ".txt", ".pdf", ".zip",
    ".mp4", ".webm", ".mov", ".avi", ".mkv", ".m3u8", ".mp3", ".wav", ".ogg", ".flac",
    ".woff", ".woff2", ".ttf", ".eot",
];

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jfif", "pjpeg", "pjp", "png", "apng", "gif", "webp", "svg",
    "bmp", "ico", "cur", "avif", "tif", "tiff", "heic", "heif", "jxl", "jp2", "raw",
    "cr2", "nef", "arw", "dng", "orf", "rw2",
];

/// Reference prefixes that never point at a fetchable image.
const REJECTED_PREFIXES: &[&str] = &[
    "data:",
    "about:",
    "javascript:",
    "blob:",
    "chrome://",
    "chrome-extension://",
    "moz-extension://",
];

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

static IMAGE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\.(?:{})(?:\?[^#]*)?(?:#.*)?$", IMAGE_EXTENSIONS.join("|")))
        .unwrap()
});

// ── Resolution ───────────────────────────────────────────────────────────────

/// Resolve `reference` against `base`.
///
/// References that already carry a scheme come back unchanged. Protocol-relative
/// references inherit the base scheme; everything else is joined onto the base path.
pub fn make_absolute(base: &str, reference: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if SCHEME_RE.is_match(reference) {
        return Url::parse(reference).ok().map(|_| reference.to_string());
    }

    if reference.starts_with("//") {
        let joined = format!("{}:{}", base.scheme(), reference);
        return Url::parse(&joined).ok().map(|u| u.to_string());
    }

    base.join(reference).ok().map(|u| u.to_string())
}

// ── Rules ────────────────────────────────────────────────────────────────────

pub fn is_ignored_host(url: &str) -> bool {
    host_name(url)
        .map(|host| IGNORED_HOSTS.iter().any(|ignored| host.contains(ignored)))
        .unwrap_or(false)
}

/// Whether the URL looks like it serves an image, judged from its path alone.
pub fn is_plausible_image(url: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return false,
    };

    let path = parsed.path().to_lowercase();
    if NON_IMAGE_PATH_FRAGMENTS.iter().any(|f| path.contains(f)) {
        return false;
    }

    let has_image_extension = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext))
        .unwrap_or(false);

    has_image_extension || IMAGE_SUFFIX_RE.is_match(url)
}

/// True for references that cannot be resolved to a fetchable image at all.
pub fn is_rejected_reference(reference: &str) -> bool {
    let lower = reference.trim().to_lowercase();
    lower.is_empty() || REJECTED_PREFIXES.iter().any(|p| lower.starts_with(p))
}

pub fn host_name(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Same site when the hosts match, or one is a subdomain of the other.
pub fn is_same_domain(image_url: &str, page_url: &str) -> bool {
    let (image_host, page_host) = match (host_name(image_url), host_name(page_url)) {
        (Some(i), Some(p)) => (i, p),
        _ => return false,
    };
    let image = strip_www(&image_host);
    let page = strip_www(&page_host);
    image == page
        || image.ends_with(&format!(".{}", page))
        || page.ends_with(&format!(".{}", image))
}

/// Filesystem-safe site name: `www.my-site.co.uk` → `my_site_co_uk`.
pub fn site_name(url: &str) -> String {
    let host = host_name(url).unwrap_or_default();
    strip_www(&host)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
