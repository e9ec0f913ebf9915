//! DuckDuckGo HTML search adapter.
//!
//! Queries the JavaScript-free HTML endpoint and scrapes result titles,
//! links and snippets. Links arrive wrapped in a DuckDuckGo redirect and
//! are unwrapped before they are returned.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use super::{SearchHit, SearchProvider};
use crate::error::SearchError;

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!("aegis-mind/", env!("CARGO_PKG_VERSION"));

/// Search provider backed by DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoProvider {
    client: Client,
    title_re: Regex,
    snippet_re: Regex,
    tag_re: Regex,
}

fn compile(pattern: &str) -> Result<Regex, SearchError> {
    Regex::new(pattern).map_err(|e| SearchError::Parse(format!("invalid pattern: {e}")))
}

impl DuckDuckGoProvider {
    /// Creates a provider whose HTTP requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Request`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::Request(e.to_string()))?;

        Ok(Self {
            client,
            title_re: compile(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)?,
            snippet_re: compile(
                r#"(?s)<(?:a|div|td)[^>]*class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#,
            )?,
            tag_re: compile(r"<[^>]+>")?,
        })
    }

    /// Extracts up to `max_results` hits from a results page.
    ///
    /// Each snippet is matched within its own result block, so a result
    /// without a snippet never borrows the next one's.
    fn parse_results(&self, html: &str, max_results: usize) -> Vec<SearchHit> {
        let titles: Vec<_> = self.title_re.captures_iter(html).collect();
        let mut hits = Vec::with_capacity(titles.len().min(max_results));

        for (i, caps) in titles.iter().enumerate() {
            if hits.len() >= max_results {
                break;
            }
            let (Some(whole), Some(href), Some(title)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let block_end = titles
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(html.len(), |m| m.start());
            let body = self
                .snippet_re
                .captures(&html[whole.end()..block_end])
                .and_then(|c| c.get(1))
                .map(|m| self.clean_text(m.as_str()))
                .filter(|s| !s.is_empty());

            let url = decode_link(href.as_str());
            if url.contains("duckduckgo.com/y.js") {
                // sponsored result
                continue;
            }

            hits.push(SearchHit {
                title: Some(self.clean_text(title.as_str())).filter(|s| !s.is_empty()),
                url: Some(url).filter(|s| !s.is_empty()),
                body,
            });
        }

        hits
    }

    fn clean_text(&self, fragment: &str) -> String {
        let stripped = self.tag_re.replace_all(fragment, "");
        let decoded = decode_entities(&stripped);
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Unwraps a `//duckduckgo.com/l/?uddg=<encoded>` redirect link.
fn decode_link(href: &str) -> String {
    let href = decode_entities(href);
    if let Some(start) = href.find("uddg=") {
        let encoded = &href[start + "uddg=".len()..];
        let encoded = encoded.split('&').next().unwrap_or_default();
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    href.strip_prefix("//")
        .map_or_else(|| href.clone(), |rest| format!("https://{rest}"))
}

/// Longest entity body between `&` and `;` worth trying to decode.
const MAX_ENTITY_LEN: usize = 10;

/// Decodes HTML character references in one pass.
///
/// Handles numeric references (`&#233;`, `&#xE9;`) and the named entities
/// result pages actually use. Anything else is left as written.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= MAX_ENTITY_LEN)
            .and_then(|end| decode_entity(&tail[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code).filter(|&c| c != '\0');
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "laquo" => '\u{AB}',
        "raquo" => '\u{BB}',
        "middot" => '\u{B7}',
        "copy" => '\u{A9}',
        "reg" => '\u{AE}',
        _ => return None,
    };
    Some(c)
}

impl std::fmt::Debug for DuckDuckGoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDuckGoProvider")
            .field("endpoint", &ENDPOINT)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn text_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{ENDPOINT}?q={}", urlencoding::encode(query));

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Request(format!("request timed out: {e}"))
            } else {
                SearchError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Parse(format!("failed to read body: {e}")))?;

        Ok(self.parse_results(&html, max_results))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const FIXTURE: &str = r#"
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FBras%C3%ADlia&amp;rut=abc">Brasília - <b>Wikipedia</b></a>
    </h2>
    <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x"><b>Brasília</b> is the capital of Brazil &amp; seat of government.</a>
  </div>
</div>
<div class="result results_links web-result">
  <div class="links_main result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="https://example.org/no-snippet">No snippet here</a>
    </h2>
  </div>
</div>
<div class="result results_links web-result">
  <div class="links_main result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fbritannica.com%2Fplace%2FBrasilia">Brasília | History</a>
    </h2>
    <a class="result__snippet" href="x">Planned city   inaugurated in 1960.</a>
  </div>
</div>
"#;

    fn provider() -> DuckDuckGoProvider {
        DuckDuckGoProvider::new(Duration::from_secs(5)).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_parse_results() {
        let hits = provider().parse_results(FIXTURE, 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(
            hits[0].url.as_deref(),
            Some("https://en.wikipedia.org/wiki/Brasília")
        );
        assert_eq!(hits[0].title.as_deref(), Some("Brasília - Wikipedia"));
        assert_eq!(
            hits[0].body.as_deref(),
            Some("Brasília is the capital of Brazil & seat of government.")
        );
    }

    #[test]
    fn test_missing_snippet_not_borrowed() {
        let hits = provider().parse_results(FIXTURE, 10);
        assert_eq!(hits[1].url.as_deref(), Some("https://example.org/no-snippet"));
        assert!(hits[1].body.is_none());
        assert_eq!(hits[2].body.as_deref(), Some("Planned city inaugurated in 1960."));
    }

    #[test]
    fn test_max_results() {
        let hits = provider().parse_results(FIXTURE, 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_empty_page() {
        assert!(provider().parse_results("<html></html>", 5).is_empty());
    }

    #[test_case("caf&#233; &amp; bar", "café & bar" ; "decimal")]
    #[test_case("S&#xE3;o Paulo &#X2014; SP", "São Paulo \u{2014} SP" ; "hex")]
    #[test_case("it&#x27;s &#39;ok&#39;", "it's 'ok'" ; "apostrophes")]
    #[test_case("&lt;b&gt; &quot;x&quot;&nbsp;y", "<b> \"x\" y" ; "named")]
    #[test_case("&amp;lt;", "&lt;" ; "decoded once")]
    #[test_case("AT&T & co; &bogus; &#xZZ; &#0;", "AT&T & co; &bogus; &#xZZ; &#0;" ; "left as written")]
    #[test_case("trailing &", "trailing &" ; "dangling ampersand")]
    fn test_decode_entities(input: &str, expected: &str) {
        assert_eq!(decode_entities(input), expected);
    }

    #[test]
    fn test_numeric_entities_in_results() {
        let page = r#"<a rel="nofollow" class="result__a" href="https://example.org">Bras&#237;lia &#x2013; capital</a>
<a class="result__snippet" href="x">Inaugurada em 1960 &#8211; planejada</a>"#;
        let hits = provider().parse_results(page, 5);
        assert_eq!(hits[0].title.as_deref(), Some("Brasília \u{2013} capital"));
        assert_eq!(hits[0].body.as_deref(), Some("Inaugurada em 1960 \u{2013} planejada"));
    }

    #[test]
    fn test_decode_link() {
        assert_eq!(decode_link("//example.com/a"), "https://example.com/a");
        assert_eq!(decode_link("https://x.io"), "https://x.io");
        assert_eq!(
            decode_link("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.b%2Fc%3Fd%3D1&amp;rut=z"),
            "https://a.b/c?d=1"
        );
    }
}
