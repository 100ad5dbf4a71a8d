//! Content-Type policy for probed URLs.

/// MIME families that are never reported as images.
pub const NON_IMAGE_CONTENT_TYPES: &[&str] = &[
    "text/html",
    "text/plain",
    "text/css",
    "text/javascript",
    "text/xml",
    "application/javascript",
    "application/json",
    "application/xml",
    "application/xhtml+xml",
    "application/pdf",
    "application/octet-stream",
    "application/zip",
    "video/",
    "audio/",
    "font/",
];

/// Classifies a probed Content-Type. An absent header is not proof of anything,
/// so it is let through.
pub fn is_non_image(content_type: Option<&str>) -> bool {
    let lower = match content_type {
        Some(ct) => ct.to_lowercase(),
        None => return false,
    };
    NON_IMAGE_CONTENT_TYPES.iter().any(|t| lower.contains(t)) || !lower.contains("image/")
}

/// `Text/HTML; charset=utf-8` → `text/html`.
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

pub fn extension_from_mime(content_type: &str) -> Option<&'static str> {
    let lower = content_type.to_lowercase();
    let ext = if lower.contains("jpeg") || lower.contains("image/jpg") {
        "jpg"
    } else if lower.contains("png") {
        "png"
    } else if lower.contains("gif") {
        "gif"
    } else if lower.contains("webp") {
        "webp"
    } else if lower.contains("svg") {
        "svg"
    } else if lower.contains("bmp") {
        "bmp"
    } else if lower.contains("ico") || lower.contains("icon") {
        "ico"
    } else if lower.contains("avif") {
        "avif"
    } else if lower.contains("tiff") {
        "tiff"
    } else if lower.contains("heic") || lower.contains("heif") {
        "heic"
    } else {
        return None;
    };
    Some(ext)
}

pub fn extension_from_url(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    const KNOWN: &[&str] = &[
        "jpeg", "jpg", "png", "gif", "webp", "svg", "bmp", "ico", "avif", "tiff", "heic",
    ];
    KNOWN
        .iter()
        .find(|ext| lower.contains(&format!(".{}", ext)))
        .map(|ext| if *ext == "jpeg" { "jpg" } else { *ext })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_non_image() {
        assert!(is_non_image(Some("text/html; charset=utf-8")));
        assert!(is_non_image(Some("application/json")));
        assert!(is_non_image(Some("video/mp4")));
    }

    #[test]
    fn image_types_pass() {
        assert!(!is_non_image(Some("image/png")));
        assert!(!is_non_image(Some("IMAGE/WEBP")));
        assert!(!is_non_image(Some("image/svg+xml")));
    }

    #[test]
    fn missing_content_type_is_permissive() {
        assert!(!is_non_image(None));
    }

    #[test]
    fn unknown_types_without_image_prefix_are_filtered() {
        assert!(is_non_image(Some("binary/x-custom")));
        assert!(is_non_image(Some("")));
    }

    #[test]
    fn essence_strips_parameters() {
        assert_eq!(mime_essence("Text/HTML; charset=utf-8"), "text/html");
        assert_eq!(mime_essence("image/png"), "image/png");
    }

    #[test]
    fn extensions_from_mime_and_url() {
        assert_eq!(extension_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(extension_from_mime("image/svg+xml"), Some("svg"));
        assert_eq!(extension_from_mime("image/x-icon"), Some("ico"));
        assert_eq!(extension_from_mime("text/html"), None);
        assert_eq!(extension_from_url("https://a.com/b.JPEG?x=1"), Some("jpg"));
        assert_eq!(extension_from_url("https://a.com/b"), None);
    }
}
