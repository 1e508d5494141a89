//! Origin URL canonicalization.
//!
//! Produces a stable form of a document's origin for the exact-match
//! pre-filter. Never fails: input that cannot be parsed as an absolute,
//! host-bearing URL is handed back unchanged and flagged so the caller can
//! fall back to content-based deduplication alone.

use tracing::debug;
use url::Url;

/// Result of canonicalizing an origin identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    /// Normalized URL, usable for exact-match deduplication
    Url(String),
    /// Input could not be parsed; the original string, unchanged
    Unparsed(String),
    /// No origin supplied
    Missing,
}

impl Canonical {
    /// Key for the exact-match gate. Only normalized URLs qualify.
    pub fn match_key(&self) -> Option<&str> {
        match self {
            Canonical::Url(url) => Some(url),
            Canonical::Unparsed(_) | Canonical::Missing => None,
        }
    }

    /// Value recorded on the document.
    pub fn into_recorded(self) -> Option<String> {
        match self {
            Canonical::Url(s) | Canonical::Unparsed(s) => Some(s),
            Canonical::Missing => None,
        }
    }

    /// Whether canonicalization fell back to the raw input.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Canonical::Unparsed(_))
    }
}

/// Canonicalize an origin URL.
///
/// Rules, in order: lower-case host, strip a leading `www.`, remove tracking
/// query parameters, drop the fragment, strip one trailing slash.
pub fn canonicalize(raw: Option<&str>, tracking_params: &[String]) -> Canonical {
    let original = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return Canonical::Missing,
    };

    match Url::parse(original.trim()) {
        Ok(url) => match normalize(&url, tracking_params) {
            Some(normalized) => Canonical::Url(normalized),
            None => {
                debug!(url = original, "URL has no host, using raw origin");
                Canonical::Unparsed(original.to_string())
            }
        },
        Err(e) => {
            debug!(url = original, error = %e, "URL parse failed, using raw origin");
            Canonical::Unparsed(original.to_string())
        }
    }
}

fn normalize(url: &Url, tracking_params: &[String]) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        return None;
    }

    let mut out = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }

    let path = url.path();
    out.push_str(path.strip_suffix('/').unwrap_or(path));

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name, tracking_params))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if !kept.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        out.push('?');
        out.push_str(&query);
    }

    Some(out)
}

fn is_tracking_param(name: &str, tracking_params: &[String]) -> bool {
    let name = name.to_lowercase();
    tracking_params.iter().any(|pattern| {
        let pattern = pattern.to_lowercase();
        match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => name == pattern,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DedupConfig;

    fn canon(raw: &str) -> Canonical {
        canonicalize(Some(raw), &DedupConfig::default().tracking_params)
    }

    #[test]
    fn test_lowercases_host_and_strips_www() {
        assert_eq!(
            canon("https://WWW.Example.COM/Path"),
            Canonical::Url("https://example.com/Path".to_string())
        );
    }

    #[test]
    fn test_strips_tracking_params_keeps_others() {
        assert_eq!(
            canon("https://example.com/a?id=7&utm_source=news&fbclid=xyz&utm_campaign=q3"),
            Canonical::Url("https://example.com/a?id=7".to_string())
        );
    }

    #[test]
    fn test_drops_fragment_and_trailing_slash() {
        assert_eq!(
            canon("https://example.com/article/#comments"),
            Canonical::Url("https://example.com/article".to_string())
        );
    }

    #[test]
    fn test_strips_only_one_trailing_slash() {
        assert_eq!(
            canon("https://example.com/a//"),
            Canonical::Url("https://example.com/a/".to_string())
        );
    }

    #[test]
    fn test_root_path() {
        assert_eq!(canon("https://example.com/"), canon("https://www.example.com"));
    }

    #[test]
    fn test_variants_converge() {
        let a = canon("https://example.com/news/rust-2024");
        let b = canon("https://www.EXAMPLE.com/news/rust-2024/?utm_source=feed&utm_medium=rss#top");
        assert_eq!(a, b);
    }

    #[test]
    fn test_keeps_explicit_port() {
        assert_eq!(
            canon("http://example.com:8080/x/"),
            Canonical::Url("http://example.com:8080/x".to_string())
        );
    }

    #[test]
    fn test_malformed_returns_original() {
        let raw = "not a url at all";
        let result = canon(raw);
        assert_eq!(result, Canonical::Unparsed(raw.to_string()));
        assert!(result.is_fallback());
        assert!(result.match_key().is_none());
        assert_eq!(result.into_recorded().as_deref(), Some(raw));
    }

    #[test]
    fn test_hostless_scheme_is_fallback() {
        assert!(canon("mailto:someone@example.com").is_fallback());
    }

    #[test]
    fn test_missing() {
        assert_eq!(canonicalize(None, &[]), Canonical::Missing);
        assert_eq!(canonicalize(Some("   "), &[]), Canonical::Missing);
        assert!(Canonical::Missing.into_recorded().is_none());
    }

    #[test]
    fn test_custom_tracking_params() {
        let params = vec!["session".to_string()];
        assert_eq!(
            canonicalize(Some("https://a.io/p?session=1&utm_source=x"), &params),
            Canonical::Url("https://a.io/p?utm_source=x".to_string())
        );
    }
}
