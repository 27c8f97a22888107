//! Folder-link validation.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const FOLDER_LINK_PATTERN: &str = r"^https://drive\.google\.com/drive/folders/([a-zA-Z0-9_-]+)";

/// The supplied string is not a Google Drive folder link.
///
/// The display text is the user-visible message, verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid Google Drive link.")]
pub struct InvalidLink;

fn folder_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FOLDER_LINK_PATTERN).expect("folder link pattern is valid"))
}

/// Extract the root folder id from a Drive folder link.
pub fn parse_folder_link(link: &str) -> Result<String, InvalidLink> {
    folder_link_regex()
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or(InvalidLink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_folder_link() {
        let id = parse_folder_link("https://drive.google.com/drive/folders/1AbC_d-9xYz").unwrap();
        assert_eq!(id, "1AbC_d-9xYz");
    }

    #[test]
    fn test_link_with_query_suffix() {
        // The pattern is anchored at the start only; trailing URL parts are fine.
        let id = parse_folder_link(
            "https://drive.google.com/drive/folders/1AbC?usp=sharing",
        )
        .unwrap();
        assert_eq!(id, "1AbC");
    }

    #[test]
    fn test_non_drive_url_is_rejected() {
        assert_eq!(
            parse_folder_link("https://example.com/not-drive"),
            Err(InvalidLink)
        );
    }

    #[test]
    fn test_file_link_is_rejected() {
        assert!(parse_folder_link("https://drive.google.com/file/d/1AbC/view").is_err());
    }

    #[test]
    fn test_http_scheme_is_rejected() {
        assert!(parse_folder_link("http://drive.google.com/drive/folders/1AbC").is_err());
    }

    #[test]
    fn test_error_message_is_user_visible_text() {
        assert_eq!(InvalidLink.to_string(), "Invalid Google Drive link.");
    }
}
