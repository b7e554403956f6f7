//! Keyword expansion and category classification
//!
//! Both are pure functions of the configured tables.

use crate::config::CategoryEntry;
use std::collections::BTreeMap;

/// Category assigned when no keyword matches
pub const FALLBACK_CATEGORY: &str = "Other / General";

/// First-match keyword classifier
#[derive(Debug, Clone)]
pub struct Classifier {
    categories: Vec<(String, Vec<String>)>,
}

impl Classifier {
    /// Builds a classifier from the category table, preserving its order
    pub fn new(categories: &[CategoryEntry]) -> Self {
        let categories = categories
            .iter()
            .map(|entry| {
                let keywords = entry
                    .keywords
                    .iter()
                    .map(|kw| kw.to_lowercase())
                    .filter(|kw| !kw.is_empty())
                    .collect();
                (entry.name.clone(), keywords)
            })
            .collect();

        Self { categories }
    }

    /// Returns the first category with a keyword contained in `text` or `url`
    ///
    /// Matching is case-insensitive substring containment.
    pub fn classify(&self, text: &str, url: &str) -> &str {
        let haystack = format!("{} {}", text, url).to_lowercase();

        self.categories
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| haystack.contains(kw.as_str())))
            .map(|(name, _)| name.as_str())
            .unwrap_or(FALLBACK_CATEGORY)
    }
}

/// Expands a query into the ordered keyword list of a run
///
/// The query itself comes first, followed by its synonyms (looked up by the
/// lowercased query). Duplicates are dropped, keeping the first occurrence.
pub fn expand_keywords(query: &str, synonyms: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let query = query.trim();
    let mut keywords = vec![query.to_string()];

    if let Some(extra) = synonyms.get(&query.to_lowercase()) {
        for word in extra {
            if !keywords.iter().any(|k| k.eq_ignore_ascii_case(word)) {
                keywords.push(word.clone());
            }
        }
    }

    keywords
}

/// Returns the first keyword contained (case-insensitively) in the haystack
pub(crate) fn first_match<'k>(haystack: &str, keywords: &'k [String]) -> Option<&'k str> {
    let haystack = haystack.to_lowercase();
    keywords
        .iter()
        .map(String::as_str)
        .find(|kw| !kw.is_empty() && haystack.contains(&kw.to_lowercase()))
}
