//! Proof Link Handling
//!
//! Normalization and duplicate detection for the links bloggers submit as
//! proof of completion. Two links are the same proof when their normalized
//! forms are equal, so tracking parameters and cosmetic differences
//! (host case, empty query) never hide a repeat.

use std::collections::HashSet;
use url::Url;

/// Query parameters that only carry ad attribution.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "yclid"];

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Normalize a submitted URL for comparison and storage.
///
/// Tracking parameters are removed and an empty query is dropped. The rest
/// of the query is kept byte for byte. Input that does not parse as a URL
/// is returned trimmed, without trailing `?`/`&`.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return trimmed.trim_end_matches(['?', '&']).to_string(),
    };

    let filtered = url.query().and_then(|query| {
        let segments: Vec<&str> = query.split('&').collect();
        let kept: Vec<&str> = segments
            .iter()
            .copied()
            .filter(|segment| !segment.is_empty())
            .filter(|segment| {
                let name = segment.split_once('=').map_or(*segment, |(name, _)| name);
                !is_tracking_param(name)
            })
            .collect();
        if kept.is_empty() {
            Some(None)
        } else if kept.len() != segments.len() {
            Some(Some(kept.join("&")))
        } else {
            None
        }
    });
    if let Some(query) = filtered {
        url.set_query(query.as_deref());
    }

    url.to_string()
}

/// Pull http(s) links out of a message.
///
/// Links may be separated by commas, spaces or newlines. Results are
/// normalized and de-duplicated, keeping first-seen order.
pub fn extract_links(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(normalize_url)
        .filter(|link| link.starts_with("http://") || link.starts_with("https://"))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Candidates that already appear among `known` normalized links.
pub fn find_duplicates(candidates: &[String], known: &HashSet<String>) -> Vec<String> {
    candidates
        .iter()
        .filter(|link| known.contains(*link))
        .cloned()
        .collect()
}
