//! Deep-link routing.
//!
//! Activation URLs (`iris://...`) carry a navigation target in the
//! `openLink` query parameter. The embedded value is usually itself a full
//! URL, and upstream senders do not reliably percent-encode it, so a naive
//! query parser truncates it at its first `&`. Extraction therefore runs
//! in two stages: a structured parse with a heuristic that rejoins
//! trailing pairs whose names are outside the known parameter vocabulary,
//! then a manual substring fallback when structured parsing yields
//! nothing.

use tracing::debug;
use url::Url;

/// Query parameter carrying the navigation target.
const OPEN_LINK_PARAM: &str = "openLink";

/// Parameter names a well-formed activation URL may carry. A trailing pair
/// with any other name is assumed to be a fragment of the unencoded
/// embedded value.
const KNOWN_PARAMS: &[&str] = &["openLink"];

/// Extract the navigation target from an activation URL.
///
/// Returns `None` when the input carries no usable target. Never fails:
/// malformed input degrades to the fallback path or to `None`.
pub fn extract_open_link(raw: &str) -> Option<String> {
    if let Some(value) = extract_structured(raw) {
        return non_empty(value);
    }

    debug!("structured parse yielded nothing, trying substring fallback");
    extract_fallback(raw).and_then(non_empty)
}

/// Structured path: parse the URL, scan raw query segments for the target
/// parameter, and rejoin trailing segments that look like fragments of it.
fn extract_structured(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let query = url.query()?;

    // Work on raw segments: the usual pair iterator percent-decodes before
    // we can tell which pairs are genuine.
    let mut segments = query.split('&');
    let mut value = loop {
        let segment = segments.next()?;
        if let Some(rest) = segment.strip_prefix(OPEN_LINK_PARAM) {
            if let Some(value) = rest.strip_prefix('=') {
                break value.to_string();
            }
        }
    };

    for segment in segments {
        let key = segment.split('=').next().unwrap_or_default();
        if KNOWN_PARAMS.contains(&key) {
            // A genuine parameter ends the embedded value.
            break;
        }
        value.push('&');
        value.push_str(segment);
    }

    Some(decode_or_raw(&value))
}

/// Fallback path: find the parameter marker anywhere in the input and take
/// everything after it.
fn extract_fallback(raw: &str) -> Option<String> {
    let marker = format!("{}=", OPEN_LINK_PARAM);
    let start = raw.find(&marker)? + marker.len();
    Some(decode_or_raw(&raw[start..]))
}

/// Percent-decode when possible, keep the raw form when not.
fn decode_or_raw(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstructs_unencoded_embedded_url() {
        let link = extract_open_link("iris://?openLink=https://example.com/a?x=1&y=2");
        assert_eq!(link.as_deref(), Some("https://example.com/a?x=1&y=2"));
    }

    #[test]
    fn test_rejoins_multiple_trailing_fragments() {
        let link = extract_open_link("iris://?openLink=https://example.com/a?x=1&y=2&z=3");
        assert_eq!(link.as_deref(), Some("https://example.com/a?x=1&y=2&z=3"));
    }

    #[test]
    fn test_encoded_value_is_decoded() {
        let link = extract_open_link(
            "iris://?openLink=https%3A%2F%2Fexample.com%2Fa%3Fx%3D1%26y%3D2",
        );
        assert_eq!(link.as_deref(), Some("https://example.com/a?x=1&y=2"));
    }

    #[test]
    fn test_plain_value() {
        let link = extract_open_link("iris://?openLink=settings");
        assert_eq!(link.as_deref(), Some("settings"));
    }

    #[test]
    fn test_missing_param_returns_none() {
        assert_eq!(extract_open_link("iris://?foo=bar"), None);
        assert_eq!(extract_open_link("iris://"), None);
        assert_eq!(extract_open_link(""), None);
    }

    #[test]
    fn test_known_param_name_ends_the_value() {
        // A second openLink pair is a genuine parameter, not a fragment.
        let link = extract_open_link("iris://?openLink=a&openLink=b");
        assert_eq!(link.as_deref(), Some("a"));
    }

    #[test]
    fn test_params_before_target_are_skipped() {
        let link = extract_open_link("iris://?foo=1&openLink=https://example.com");
        assert_eq!(link.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_similar_param_name_does_not_match() {
        assert_eq!(extract_open_link("iris://?openLinkExtra=x"), None);
    }

    #[test]
    fn test_empty_value_returns_none() {
        assert_eq!(extract_open_link("iris://?openLink="), None);
    }

    #[test]
    fn test_fallback_on_unparseable_input() {
        // Not a URL at all, but the marker is there.
        let link = extract_open_link("openLink=hello%20world");
        assert_eq!(link.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_invalid_percent_encoding_returns_raw() {
        let link = extract_open_link("iris://?openLink=%FFraw");
        assert_eq!(link.as_deref(), Some("%FFraw"));
    }

    #[test]
    fn test_garbage_never_panics() {
        for input in ["%%%", "iris://?", "a&b&c", "openLink", "??openLink??", "\u{0}"] {
            let _ = extract_open_link(input);
        }
    }
}
