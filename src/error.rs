use once_cell::sync::OnceCell;
use regex::Regex;

/// Failure taxonomy shared by scene generation and video rendering.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// Bad user input: empty idea, malformed prompt JSON, missing key.
    #[error("{0}")]
    Validation(String),

    /// The configured API key was rejected.
    #[error("{0}")]
    Auth(String),

    /// The requested model does not exist or is unavailable.
    #[error("{0}")]
    NotFound(String),

    /// Anything else the backend (or the download) reported.
    #[error("{0}")]
    Remote(String),

    #[error(
        "Failed to generate prompt for Scene {scene} after trying all available models. Last error: {source}"
    )]
    SceneFailed {
        scene: usize,
        #[source]
        source: Box<StudioError>,
    },
}

impl StudioError {
    pub fn is_auth(&self) -> bool {
        matches!(self, StudioError::Auth(_))
    }
}

const INVALID_KEY_MARKER: &str = "API key not valid";

/// True when a raw backend message says the API key was rejected.
pub fn is_invalid_key(message: &str) -> bool {
    message.contains(INVALID_KEY_MARKER)
}

/// True when a raw backend message carries a `NOT_FOUND` status.
pub fn is_not_found(message: &str) -> bool {
    match not_found_regex() {
        Ok(re) => re.is_match(message),
        Err(_) => message.contains("NOT_FOUND"),
    }
}

fn not_found_regex() -> anyhow::Result<&'static Regex> {
    static NOT_FOUND_RE: OnceCell<Regex> = OnceCell::new();
    NOT_FOUND_RE.get_or_try_init(|| {
        Regex::new(r#""status"\s*:\s*"NOT_FOUND""#)
            .map_err(|e| anyhow::anyhow!("failed to compile NOT_FOUND regex: {e}"))
    })
}

/// Keeps at most `max_chars` characters of a backend body for messages.
pub(crate) fn snippet(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_invalid_key_message() {
        assert!(is_invalid_key(
            "HTTP 400: API key not valid. Please pass a valid API key."
        ));
        assert!(!is_invalid_key("HTTP 500: internal"));
    }

    #[test]
    fn detects_not_found_in_compact_and_pretty_bodies() {
        assert!(is_not_found(r#"{"error":{"code":404,"status":"NOT_FOUND"}}"#));
        assert!(is_not_found(
            "{\n  \"error\": {\n    \"code\": 404,\n    \"status\": \"NOT_FOUND\"\n  }\n}"
        ));
        assert!(!is_not_found(r#"{"error":{"status":"INVALID_ARGUMENT"}}"#));
    }

    #[test]
    fn scene_failure_names_index_and_cause() {
        let err = StudioError::SceneFailed {
            scene: 3,
            source: Box::new(StudioError::Remote("quota exceeded".into())),
        };
        let text = err.to_string();
        assert!(text.contains("Scene 3"));
        assert!(text.ends_with("Last error: quota exceeded"));
    }
}
