//! File-extension to media-type lookup for file responses.

/// Fallback for unknown or missing extensions.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Returns the media type for a file extension (without the dot).
///
/// Matching is case-insensitive. Unknown extensions map to
/// [`DEFAULT_MIME_TYPE`].
///
/// # Examples
///
/// ```
/// use hasty::http::mime::lookup_mime_type;
///
/// assert_eq!(lookup_mime_type("HTML"), "text/html");
/// assert_eq!(lookup_mime_type("weird"), "application/octet-stream");
/// ```
pub fn lookup_mime_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpeg" | "jpg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "bin" | "exe" | "dll" => DEFAULT_MIME_TYPE,
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Looks up the media type for a path by its final extension.
pub fn mime_for_path(path: &std::path::Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(DEFAULT_MIME_TYPE, lookup_mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn known_extensions() {
        assert_eq!(lookup_mime_type("json"), "application/json");
        assert_eq!(lookup_mime_type("jpg"), "image/jpeg");
        assert_eq!(lookup_mime_type("Css"), "text/css");
    }

    #[test]
    fn binaries_and_unknowns_fall_back() {
        assert_eq!(lookup_mime_type("exe"), DEFAULT_MIME_TYPE);
        assert_eq!(lookup_mime_type(""), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn path_lookup_uses_last_extension() {
        assert_eq!(mime_for_path(Path::new("/srv/app.min.js")), "text/javascript");
        assert_eq!(mime_for_path(Path::new("/srv/README")), DEFAULT_MIME_TYPE);
    }
}
