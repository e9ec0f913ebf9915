//! Formats search results into a bounded text block for prompts.

use std::fmt::Write;

use super::SearchResult;

/// Returned when no result is eligible for summarization.
pub const NO_SOURCES_PLACEHOLDER: &str = "(No useful sources returned.)";

/// Maximum characters of body text kept per source.
pub const MAX_BODY_CHARS: usize = 400;

/// Formats up to `max_items` eligible results as a bulleted block.
///
/// Failed entries and entries with no title, URL or body are skipped.
/// Results are taken in order; nothing is re-ranked.
#[must_use]
pub fn summarize(results: &[SearchResult], max_items: usize) -> String {
    let mut out = String::new();

    for hit in results
        .iter()
        .filter_map(SearchResult::as_hit)
        .filter(|hit| !hit.is_blank())
        .take(max_items)
    {
        if !out.is_empty() {
            out.push('\n');
        }
        let body: String = hit
            .body
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(MAX_BODY_CHARS)
            .collect();
        let _ = write!(
            out,
            "- {}\n  {}\n  {}",
            hit.title.as_deref().unwrap_or_default(),
            hit.url.as_deref().unwrap_or_default(),
            body
        );
    }

    if out.is_empty() {
        NO_SOURCES_PLACEHOLDER.to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchHit;

    fn hit(i: usize) -> SearchResult {
        SearchResult::hit(
            "q",
            SearchHit::new(format!("Title {i}"), format!("https://e.com/{i}"), "body"),
        )
    }

    #[test]
    fn test_format() {
        let summary = summarize(&[hit(1)], 12);
        assert_eq!(summary, "- Title 1\n  https://e.com/1\n  body");
    }

    #[test]
    fn test_placeholder_when_empty() {
        assert_eq!(summarize(&[], 12), NO_SOURCES_PLACEHOLDER);
    }

    #[test]
    fn test_skips_errors_and_blank_hits() {
        let results = vec![
            SearchResult::error("q", "boom"),
            SearchResult::hit("q", SearchHit::default()),
            hit(2),
        ];
        let summary = summarize(&results, 12);
        assert_eq!(summary.matches("- ").count(), 1);
        assert!(summary.contains("Title 2"));
        assert!(!summary.contains("boom"));
    }

    #[test]
    fn test_only_errors_gives_placeholder() {
        let results = vec![SearchResult::error("a", "x"), SearchResult::error("b", "y")];
        assert_eq!(summarize(&results, 12), NO_SOURCES_PLACEHOLDER);
    }

    #[test]
    fn test_stops_at_max_items() {
        let results: Vec<_> = (0..5).map(hit).collect();
        let summary = summarize(&results, 3);
        assert_eq!(summary.lines().filter(|l| l.starts_with("- ")).count(), 3);
        assert!(summary.contains("Title 2"));
        assert!(!summary.contains("Title 3"));
    }

    #[test]
    fn test_body_truncated_by_chars() {
        let long = "é".repeat(1000);
        let results = vec![SearchResult::hit("q", SearchHit::new("t", "u", long))];
        let summary = summarize(&results, 1);
        let body = summary.lines().nth(2).unwrap_or_default().trim_start();
        assert_eq!(body.chars().count(), MAX_BODY_CHARS);
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let results = vec![SearchResult::hit(
            "q",
            SearchHit {
                title: Some("Only title".to_string()),
                url: None,
                body: None,
            },
        )];
        assert_eq!(summarize(&results, 1), "- Only title\n  \n  ");
    }
}
