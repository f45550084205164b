use thiserror::Error;
use url::Url;

/// Content URLs are logical paths; they are resolved against a fixed origin
/// only so that `url` can normalize their percent-encoding.
const PATH_ORIGIN: &str = "http://folio.invalid";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("URL cannot be empty")]
    EmptyUrl,
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
    #[error("URL must not contain a query string: {0}")]
    QueryNotAllowed(String),
    #[error("URL must not contain a fragment: {0}")]
    FragmentNotAllowed(String),
    #[error("URL must not contain empty or relative segments: {0}")]
    InvalidSegment(String),
    #[error("Collection ID cannot be empty")]
    EmptyCollectionId,
    #[error("Invalid collection ID: {0}")]
    InvalidCollectionId(String),
}

/// Normalizes the URL a content item occupies once published.
///
/// The result always starts with `/`, has no trailing slash (except the root
/// itself), and carries canonical percent-encoding.
pub fn normalize_content_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    if trimmed.contains('?') {
        return Err(ValidationError::QueryNotAllowed(trimmed.to_string()));
    }
    if trimmed.contains('#') {
        return Err(ValidationError::FragmentNotAllowed(trimmed.to_string()));
    }

    let path = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        return Ok("/".to_string());
    }

    let segments: Vec<&str> = path.split('/').collect();
    if segments
        .iter()
        .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
    {
        return Err(ValidationError::InvalidSegment(trimmed.to_string()));
    }

    let parsed = Url::parse(&format!("{PATH_ORIGIN}/{path}"))
        .map_err(|_| ValidationError::MalformedUrl(trimmed.to_string()))?;

    // Encoded dot segments ("%2e%2e") are resolved away by the parser.
    let normalized = parsed.path();
    if normalized.split('/').skip(1).count() != segments.len() {
        return Err(ValidationError::InvalidSegment(trimmed.to_string()));
    }

    Ok(normalized.to_string())
}

/// Collection IDs are opaque, but must be usable as a single path segment.
pub fn validate_collection_id(raw: &str) -> Result<&str, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyCollectionId);
    }

    if !raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidCollectionId(raw.to_string()));
    }

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_leading_slash() {
        assert_eq!(normalize_content_url("about").unwrap(), "/about");
    }

    #[test]
    fn test_normalize_keeps_absolute_path() {
        assert_eq!(
            normalize_content_url("/economy/inflation").unwrap(),
            "/economy/inflation"
        );
    }

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(normalize_content_url("/about/").unwrap(), "/about");
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize_content_url("/").unwrap(), "/");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize_content_url("  /about  ").unwrap(), "/about");
    }

    #[test]
    fn test_normalize_percent_encodes_spaces() {
        assert_eq!(
            normalize_content_url("/about us").unwrap(),
            "/about%20us"
        );
    }

    #[test]
    fn test_empty_url_returns_empty_error() {
        assert!(matches!(
            normalize_content_url("   "),
            Err(ValidationError::EmptyUrl)
        ));
    }

    #[test]
    fn test_query_returns_query_error() {
        assert!(matches!(
            normalize_content_url("/about?draft=1"),
            Err(ValidationError::QueryNotAllowed(_))
        ));
    }

    #[test]
    fn test_fragment_returns_fragment_error() {
        assert!(matches!(
            normalize_content_url("/about#team"),
            Err(ValidationError::FragmentNotAllowed(_))
        ));
    }

    #[test]
    fn test_dot_segments_are_rejected() {
        assert!(matches!(
            normalize_content_url("/about/../admin"),
            Err(ValidationError::InvalidSegment(_))
        ));
        assert!(matches!(
            normalize_content_url("/./about"),
            Err(ValidationError::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_encoded_dot_segments_are_rejected() {
        assert!(matches!(
            normalize_content_url("/about/%2e%2e/admin"),
            Err(ValidationError::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_empty_segments_are_rejected() {
        assert!(matches!(
            normalize_content_url("/about//team"),
            Err(ValidationError::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_collection_id_accepts_identifiers() {
        assert_eq!(validate_collection_id("coll-123_a").unwrap(), "coll-123_a");
    }

    #[test]
    fn test_empty_collection_id_is_rejected() {
        assert!(matches!(
            validate_collection_id(""),
            Err(ValidationError::EmptyCollectionId)
        ));
    }

    #[test]
    fn test_collection_id_with_separator_is_rejected() {
        assert!(matches!(
            validate_collection_id("a/b"),
            Err(ValidationError::InvalidCollectionId(_))
        ));
    }
}
