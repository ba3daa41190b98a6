//! Article page content extraction.
//!
//! Turns raw HTML into clean text for the extraction engine, and resolves
//! search-engine redirect wrappers back to the real article URL.

use scraper::{Html, Selector};
use url::Url;

use ft_core::{CandidateArticle, ExtractedContent};

/// Minimum usable article body length, in characters.
pub const MIN_CONTENT_LEN: usize = 200;

/// Minimum summary length accepted as a fallback body when the page itself
/// cannot be fetched or yields too little text.
pub const MIN_SUMMARY_LEN: usize = 40;

/// Selectors tried in order when a source has no selector of its own.
const FALLBACK_SELECTORS: &[&str] = &[
    "article",
    ".artText",
    ".content-wrapper",
    ".story-content",
    "main",
    "body p",
];

/// Resolve a candidate URL to its canonical absolute form.
///
/// Search engines wrap result links in redirect endpoints; the real target
/// sits in a query parameter. Returns `None` for links that cannot be made
/// into an absolute http(s) URL.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let absolute = if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    // DuckDuckGo: /l/?uddg=<target>, Google: /url?q=<target> or url=<target>.
    let host = parsed.host_str().unwrap_or_default();
    let wrapped = if host.ends_with("duckduckgo.com") {
        query_param(&parsed, "uddg")
    } else if host.ends_with("google.com") && parsed.path() == "/url" {
        query_param(&parsed, "q").or_else(|| query_param(&parsed, "url"))
    } else {
        None
    };
    if let Some(target) = wrapped {
        return canonicalize_url(&target);
    }

    Some(parsed.to_string())
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Extract readable text from a page using the source's selector, falling
/// back through common article containers. `scraper::Html` is not `Send`, so
/// this stays a plain sync function called between awaits.
pub fn extract_text(html: &str, preferred_selector: Option<&str>) -> String {
    let document = Html::parse_document(html);

    let mut selectors: Vec<&str> = Vec::new();
    if let Some(sel) = preferred_selector {
        selectors.push(sel);
    }
    selectors.extend(FALLBACK_SELECTORS);

    for sel in selectors {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        let text: String = document
            .select(&selector)
            .flat_map(|el| el.text())
            .collect::<Vec<_>>()
            .join(" ");
        let cleaned = collapse_whitespace(&text);
        if cleaned.len() >= MIN_CONTENT_LEN {
            return cleaned;
        }
    }
    String::new()
}

/// Build the content handed to the extraction engine for one candidate.
///
/// Prefers the fetched page body; when that is missing or too short, falls
/// back to the feed/search summary if it is long enough to be worth
/// analyzing. Returns `None` when neither yields usable text.
pub fn extract_content(
    candidate: &CandidateArticle,
    canonical_url: &str,
    page_html: Option<&str>,
    preferred_selector: Option<&str>,
) -> Option<ExtractedContent> {
    let body = page_html
        .map(|html| extract_text(html, preferred_selector))
        .filter(|text| text.len() >= MIN_CONTENT_LEN);

    let body = match body {
        Some(text) => text,
        None => {
            let summary = candidate.summary.as_deref().map(collapse_whitespace)?;
            if summary.len() < MIN_SUMMARY_LEN {
                return None;
            }
            summary
        }
    };

    Some(ExtractedContent {
        canonical_url: canonical_url.to_string(),
        title: collapse_whitespace(&candidate.title),
        body,
        published_at: candidate.published_at,
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(summary: Option<&str>) -> CandidateArticle {
        CandidateArticle {
            source_id: "src-1".to_string(),
            url: "https://example.com/story".to_string(),
            title: "  A   headline  ".to_string(),
            summary: summary.map(|s| s.to_string()),
            published_at: None,
            discovered_at: Utc::now(),
        }
    }

    fn long_article_html(container: &str) -> String {
        let body = "Acme Robotics raised ten million dollars in a Series A round \
                    led by Example Ventures, the company announced on Monday. "
            .repeat(4);
        format!("<html><body><{container}><p>{body}</p></{container}></body></html>")
    }

    #[test]
    fn canonicalize_passes_plain_urls_through() {
        assert_eq!(
            canonicalize_url("https://Example.com/Story?a=1").as_deref(),
            Some("https://example.com/Story?a=1")
        );
    }

    #[test]
    fn canonicalize_unwraps_duckduckgo_redirects() {
        let wrapped =
            "//duckduckgo.com/l/?uddg=https%3A%2F%2Fnews.example.com%2Fitem&rut=abc";
        assert_eq!(
            canonicalize_url(wrapped).as_deref(),
            Some("https://news.example.com/item")
        );
    }

    #[test]
    fn canonicalize_unwraps_google_redirects() {
        let wrapped = "https://www.google.com/url?q=https%3A%2F%2Fnews.example.com%2Fitem";
        assert_eq!(
            canonicalize_url(wrapped).as_deref(),
            Some("https://news.example.com/item")
        );
    }

    #[test]
    fn canonicalize_rejects_non_http_schemes() {
        assert!(canonicalize_url("mailto:tips@example.com").is_none());
        assert!(canonicalize_url("javascript:void(0)").is_none());
        assert!(canonicalize_url("/relative/path").is_none());
    }

    #[test]
    fn extract_text_prefers_source_selector() {
        let html = format!(
            "<html><body><div class=\"artText\"><p>{}</p></div>\
             <article><p>short decoy</p></article></body></html>",
            "Funding announcement body text with plenty of detail. ".repeat(6)
        );
        let text = extract_text(&html, Some(".artText"));
        assert!(text.starts_with("Funding announcement body text"));
        assert!(!text.contains("decoy"));
    }

    #[test]
    fn extract_text_falls_back_through_containers() {
        let html = long_article_html("main");
        let text = extract_text(&html, Some(".does-not-exist"));
        assert!(text.len() >= MIN_CONTENT_LEN);
        assert!(text.contains("Acme Robotics"));
    }

    #[test]
    fn extract_content_uses_page_body_when_long_enough() {
        let html = long_article_html("article");
        let content = extract_content(
            &candidate(Some("short")),
            "https://example.com/story",
            Some(&html),
            None,
        )
        .unwrap();
        assert!(content.body.contains("Acme Robotics"));
        assert_eq!(content.title, "A headline");
    }

    #[test]
    fn extract_content_falls_back_to_summary() {
        let summary = "Acme Robotics raised $10M in Series A funding led by Example Ventures.";
        let content = extract_content(&candidate(Some(summary)), "https://example.com/story", None, None).unwrap();
        assert_eq!(content.body, summary);
    }

    #[test]
    fn extract_content_rejects_thin_candidates() {
        let url = "https://example.com/story";
        assert!(extract_content(&candidate(Some("too short")), url, None, None).is_none());
        assert!(extract_content(&candidate(None), url, Some("<html></html>"), None).is_none());
    }
}
