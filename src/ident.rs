//! Video URL validation and id extraction.

use thiserror::Error;
use url::Url;

/// The identifier is not a recognized video URL.
///
/// This is a programming error on the caller's side, never retried.
#[derive(Debug, Clone, Error)]
#[error("not a recognized video URL: {0}")]
pub struct InvalidIdentifier(pub String);

/// Extract the video id from a watch URL.
///
/// Recognized forms: `youtu.be/<id>`, `youtube.com/watch?v=<id>`,
/// `youtube.com/embed/<id>` and `youtube.com/v/<id>`.
pub fn video_id(identifier: &str) -> Result<String, InvalidIdentifier> {
    let url =
        Url::parse(identifier).map_err(|_| InvalidIdentifier(identifier.to_string()))?;

    let host = url
        .host_str()
        .ok_or_else(|| InvalidIdentifier(identifier.to_string()))?;

    let id = match host {
        "youtu.be" => url.path().trim_start_matches('/').to_string(),
        "www.youtube.com" | "youtube.com" | "m.youtube.com" => {
            let path = url.path();
            if path == "/watch" {
                url.query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default()
            } else if let Some(rest) = path.strip_prefix("/embed/") {
                rest.split('/').next().unwrap_or_default().to_string()
            } else if let Some(rest) = path.strip_prefix("/v/") {
                rest.split('/').next().unwrap_or_default().to_string()
            } else {
                String::new()
            }
        }
        _ => String::new(),
    };

    if id.is_empty() {
        return Err(InvalidIdentifier(identifier.to_string()));
    }
    Ok(id)
}

/// Check whether a URL points at a recognized video resource.
pub fn is_valid_video_url(identifier: &str) -> bool {
    video_id(identifier).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_watch_urls() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            video_id("https://youtube.com/watch?v=abc123&t=30").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn extracts_short_and_embed_urls() {
        assert_eq!(video_id("https://youtu.be/abc123").unwrap(), "abc123");
        assert_eq!(
            video_id("https://www.youtube.com/embed/abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            video_id("https://www.youtube.com/v/abc123").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn rejects_non_video_urls() {
        assert!(video_id("https://example.com/watch?v=abc").is_err());
        assert!(video_id("https://www.youtube.com/feed/trending").is_err());
        assert!(video_id("not a url").is_err());
        assert!(video_id("https://www.youtube.com/watch").is_err());
    }

    #[test]
    fn validity_check() {
        assert!(is_valid_video_url("https://youtu.be/abc123"));
        assert!(!is_valid_video_url("https://vimeo.com/123456"));
    }
}
