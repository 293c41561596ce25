use std::path::Path;

/// Fallback when the extension is unknown or missing.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Guess the MIME type an object should be served with from its extension.
pub fn guess(path: impl AsRef<Path>) -> &'static str {
    mime_guess::from_path(path).first_raw().unwrap_or(DEFAULT_CONTENT_TYPE)
}
