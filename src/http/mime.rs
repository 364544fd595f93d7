//! MIME type helpers
//!
//! Extension based lookup for `Response::set_type` and prefix based sniffing
//! of rendered template output.

/// Content type used when sniffing finds nothing better
pub const DEFAULT_RENDER_TYPE: &str = "text/html; charset=utf-8";

const PREFIX_TYPES: &[(&str, &str)] = &[
    ("<!DOCTYPE html", "text/html; charset=utf-8"),
    ("<html", "text/html; charset=utf-8"),
    ("<?xml", "text/xml; charset=utf-8"),
    ("BEGIN:VCALENDAR", "text/calendar; charset=utf-8"),
    ("BEGIN:VCARD", "text/vcard; charset=utf-8"),
];

/// Get MIME Content-Type based on a file extension or short type name
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "html" | "htm" | "mustache" => "text/html; charset=utf-8",
        "css" => "text/css",
        "txt" | "text" | "md" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "ics" => "text/calendar; charset=utf-8",
        "vcf" => "text/vcard; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json; charset=utf-8",
        "form" | "urlencoded" => "application/x-www-form-urlencoded",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Guess a content type from the first bytes of a rendered body
pub fn detect_content_type(body: &str) -> &'static str {
    PREFIX_TYPES
        .iter()
        .find(|(prefix, _)| body.starts_with(prefix))
        .map_or(DEFAULT_RENDER_TYPE, |(_, content_type)| content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        assert_eq!(content_type_for("html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for(".json"), "application/json; charset=utf-8");
        assert_eq!(content_type_for("PNG"), "image/png");
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(content_type_for("xyz"), "application/octet-stream");
    }

    #[test]
    fn test_detect_content_type() {
        assert_eq!(detect_content_type("<!DOCTYPE html><p>"), "text/html; charset=utf-8");
        assert_eq!(detect_content_type("<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
        assert_eq!(detect_content_type("BEGIN:VCARD\nEND:VCARD"), "text/vcard; charset=utf-8");
        assert_eq!(detect_content_type("BEGIN:VCALENDAR"), "text/calendar; charset=utf-8");
        assert_eq!(detect_content_type("plain words"), DEFAULT_RENDER_TYPE);
    }
}
