//! Parsing of slash-delimited addresses into path segments.

use crate::error::{Error, Result};

/// Parse an address into ordered path segments and an optional port label.
///
/// The trailing segment is checked for a `:label` suffix, which is returned
/// separately from the directory parts. A single leading '/' is preserved as
/// the first segment `"/"`; repeated leading slashes collapse into it. Empty
/// segments and `.` segments are dropped, and a `..` segment removes the
/// previously retained segment. A path that condenses to nothing becomes the
/// single segment `"/"`.
///
/// ```
/// use nstree::path::parse_path;
///
/// let (segments, port) = parse_path("/localhost:2809/sub.ctx/motor0.cmp:in").unwrap();
/// assert_eq!(segments, ["/", "localhost:2809", "sub.ctx", "motor0.cmp"]);
/// assert_eq!(port.as_deref(), Some("in"));
/// ```
pub fn parse_path(path: &str) -> Result<(Vec<String>, Option<String>)> {
    let mut bits: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    // The port suffix is taken from the trailing raw segment, before any
    // "." / ".." condensation.
    let mut port = None;
    if let Some(last) = bits.last_mut() {
        if !last.is_empty() {
            let (stem, label) = split_port(*last)?;
            *last = stem;
            port = label;
        }
    }

    let mut segments: Vec<String> = Vec::with_capacity(bits.len() + 1);
    if path.starts_with('/') {
        segments.push("/".to_string());
    }
    for bit in bits {
        match bit {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_string()),
        }
    }
    if segments.is_empty() {
        segments.push("/".to_string());
    }

    Ok((segments, port.map(str::to_string)))
}

/// Split a trailing segment into its stem and optional port label.
fn split_port(segment: &str) -> Result<(&str, Option<&str>)> {
    let mut parts = segment.split(':');
    let stem = parts.next().unwrap_or("");
    match (parts.next(), parts.next()) {
        (None, _) => Ok((stem, None)),
        (Some(label), None) => Ok((stem, Some(label))),
        (Some(_), Some(_)) => Err(Error::BadPath(segment.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("a/b/c", &["a", "b", "c"], None)]
    #[case("/a/b", &["/", "a", "b"], None)]
    #[case("a/b:in", &["a", "b"], Some("in"))]
    #[case("a/./b/../c", &["a", "c"], None)]
    #[case("../..", &["/"], None)]
    #[case("//a///b", &["/", "a", "b"], None)]
    #[case("localhost:30000/manager/comp0.cmp", &["localhost:30000", "manager", "comp0.cmp"], None)]
    #[case("/localhost/manager/comp0.cmp:in", &["/", "localhost", "manager", "comp0.cmp"], Some("in"))]
    #[case("comp0.cmp", &["comp0.cmp"], None)]
    #[case("a/b/", &["a", "b"], None)]
    #[case("", &["/"], None)]
    fn test_parse_path(
        #[case] path: &str,
        #[case] segments: &[&str],
        #[case] port: Option<&str>,
    ) {
        let (parsed, parsed_port) = parse_path(path).unwrap();
        assert_eq!(parsed, segments);
        assert_eq!(parsed_port.as_deref(), port);
    }

    #[test]
    fn test_parse_path_rejects_multiple_colons() {
        assert!(matches!(
            parse_path("a/b:in:out"),
            Err(Error::BadPath(segment)) if segment == "b:in:out"
        ));
    }

    #[test]
    fn test_port_split_happens_before_condensation() {
        let (segments, port) = parse_path("a/..:in").unwrap();
        assert_eq!(segments, ["/"]);
        assert_eq!(port.as_deref(), Some("in"));
    }

    proptest! {
        #[test]
        fn test_parsed_segments_are_normalized(path in "[a-z/.:]{0,32}") {
            if let Ok((segments, port)) = parse_path(&path) {
                prop_assert!(!segments.is_empty());
                for segment in &segments {
                    prop_assert!(!segment.is_empty());
                    prop_assert_ne!(segment.as_str(), ".");
                    prop_assert_ne!(segment.as_str(), "..");
                }
                if let Some(port) = port {
                    prop_assert!(!port.contains(':'));
                }
            }
        }
    }
}
