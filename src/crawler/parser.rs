//! Content parsing for source adapters
//!
//! This module handles:
//! - Extracting anchors (href + text) from HTML
//! - Finding onion service addresses in free text (feeds, raw pages)
//! - Unwrapping search-engine redirect links

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Absolute URL when it could be resolved, otherwise the raw href
    pub href: String,

    /// Visible anchor text, whitespace-collapsed
    pub text: String,
}

/// An onion address mentioned in a text document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnionMention {
    /// Lowercased `<base32>.onion` host
    pub address: String,

    /// The line the address was found on, lowercased
    pub context: String,
}

impl OnionMention {
    /// Root URL of the mentioned service
    pub fn url(&self) -> String {
        format!("http://{}/", self.address)
    }
}

/// Parses HTML content and extracts every `<a href>`
///
/// # Link Extraction Rules
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// # Example
///
/// ```
/// use hunt::crawler::parse_html;
///
/// let html = r#"<html><body><a href="http://abc.onion/">Abc</a></body></html>"#;
/// let anchors = parse_html(html, None);
/// assert_eq!(anchors.len(), 1);
/// assert_eq!(anchors[0].text, "Abc");
/// ```
pub fn parse_html(html: &str, base_url: Option<&Url>) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    match Selector::parse("a[href]") {
        Ok(selector) => collect_anchors(&document, &selector, base_url),
        Err(_) => Vec::new(),
    }
}

/// Extracts anchors matching a caller-supplied selector
///
/// Elements without an `href` attribute are skipped.
pub fn select_anchors(html: &str, selector: &Selector, base_url: Option<&Url>) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    collect_anchors(&document, selector, base_url)
}

fn collect_anchors(document: &Html, selector: &Selector, base_url: Option<&Url>) -> Vec<Anchor> {
    document
        .select(selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let href = resolve_link(href, base_url)?;
            Some(Anchor {
                href,
                text: collapse_whitespace(&element.text().collect::<String>()),
            })
        })
        .collect()
}

/// Resolves a link href against the base URL, filtering unusable schemes
fn resolve_link(href: &str, base_url: Option<&Url>) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.map(|base| base.join(href)) {
        Some(Ok(absolute)) => Some(absolute.to_string()),
        _ => Some(href.to_string()),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn onion_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(?:[a-z2-7]{56}|[a-z2-7]{16})\.onion\b").ok())
        .as_ref()
}

/// Finds every distinct v2 (16 char) and v3 (56 char) onion address in a text
///
/// Addresses are returned in order of first appearance.
pub fn extract_onion_addresses(text: &str) -> Vec<OnionMention> {
    let mut seen = HashSet::new();
    let mut mentions = Vec::new();

    let Some(pattern) = onion_pattern() else {
        return mentions;
    };

    for line in text.lines() {
        let lowered = line.to_lowercase();
        for found in pattern.find_iter(&lowered) {
            let address = found.as_str().to_string();
            if seen.insert(address.clone()) {
                mentions.push(OnionMention {
                    address,
                    context: lowered.clone(),
                });
            }
        }
    }

    mentions
}

/// Unwraps a search-engine redirect (`...redirect?search_result=<url>&...`)
///
/// Returns the href unchanged when it is not a redirect.
pub fn unwrap_redirect(href: &str) -> String {
    if !href.contains("search_result=") {
        return href.to_string();
    }

    let query = href.split_once('?').map(|(_, q)| q).unwrap_or(href);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "search_result")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| href.to_string())
}
