//! Dedup identity helpers: URL normalization, company-name normalization
//! and content fingerprinting.
//!
//! Dedup is keyed on the normalized canonical URL first, with a SHA-256
//! fingerprint of the extracted body as a secondary check for the same
//! article republished under a different URL.

use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters that identify click tracking rather than content.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "_ga",
    "ref",
];

/// Normalize a URL for use as a dedup key: lowercase the host, drop the
/// fragment, strip tracking parameters and any trailing slash.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    url.set_host(Some(&host)).ok()?;
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query: String = kept
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let mut out = url.to_string();
    while out.ends_with('/') && out.len() > url.scheme().len() + 3 + host.len() + 1 {
        out.pop();
    }
    Some(out)
}

/// Collapse whitespace and lowercase, for matching company names across
/// articles that style them differently.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identity of a startup record: the normalized company name.
///
/// Different outlets routinely cover the same funding event under different
/// URLs, so the source URL stays out of the key; a later article merges
/// into the existing record instead of inserting a duplicate.
pub fn record_key(name: &str) -> String {
    normalize_name(name)
}

/// SHA-256 hex digest of the article body, whitespace-collapsed so trivial
/// reformatting does not defeat the check.
pub fn fingerprint(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let digest = Sha256::digest(collapsed.as_bytes());
    format!("{:x}", digest)
}
