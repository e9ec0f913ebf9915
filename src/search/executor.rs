//! Runs planned queries against a [`SearchProvider`].

use std::time::{Duration, Instant};

use super::{SearchProvider, SearchResult};
use crate::error::SearchError;
use crate::monitor::Monitor;

/// Issues one search per query, in order, and flattens the results.
///
/// Hits keep query order, then provider order within a query. A query that
/// fails or exceeds `timeout` contributes a single error entry instead of
/// hits; the remaining queries still run. No deduplication is performed.
pub async fn execute_searches(
    provider: &dyn SearchProvider,
    queries: &[String],
    max_results: usize,
    timeout: Duration,
    monitor: &dyn Monitor,
) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for query in queries {
        let start = Instant::now();
        let outcome = tokio::time::timeout(timeout, provider.text_search(query, max_results))
            .await
            .unwrap_or(Err(SearchError::Timeout {
                seconds: timeout.as_secs(),
            }));

        match outcome {
            Ok(mut hits) => {
                hits.truncate(max_results);
                let sources: Vec<String> = hits.iter().filter_map(|h| h.url.clone()).collect();
                monitor.on_search(query, hits.len(), &sources);
                tracing::debug!(
                    provider = provider.name(),
                    query = %query,
                    hits = hits.len(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "search query completed"
                );
                results.extend(hits.into_iter().map(|hit| SearchResult::hit(query.clone(), hit)));
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    query = %query,
                    error = %e,
                    "search query failed"
                );
                results.push(SearchResult::error(query.clone(), e.to_string()));
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::monitor::SearchLog;
    use crate::search::SearchHit;

    struct EchoProvider;

    #[async_trait]
    impl SearchProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn text_search(
            &self,
            query: &str,
            max_results: usize,
        ) -> Result<Vec<SearchHit>, SearchError> {
            match query {
                "fail" => Err(SearchError::Request("connection reset".to_string())),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(Vec::new())
                }
                _ => Ok((0..max_results + 2)
                    .map(|i| SearchHit::new(format!("{query} {i}"), format!("https://{query}/{i}"), "b"))
                    .collect()),
            }
        }
    }

    fn queries(qs: &[&str]) -> Vec<String> {
        qs.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_order_and_cap() {
        let log = SearchLog::new();
        let results = execute_searches(
            &EchoProvider,
            &queries(&["a", "b"]),
            2,
            Duration::from_secs(1),
            &log,
        )
        .await;
        let titles: Vec<_> = results
            .iter()
            .filter_map(|r| r.as_hit().and_then(|h| h.title.clone()))
            .collect();
        assert_eq!(titles, vec!["a 0", "a 1", "b 0", "b 1"]);
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_monitor_sees_capped_hits() {
        let log = SearchLog::new();
        execute_searches(
            &EchoProvider,
            &queries(&["a"]),
            3,
            Duration::from_secs(1),
            &log,
        )
        .await;
        let records = log.recent(1);
        assert_eq!(records[0].result_count, 3);
        assert_eq!(
            records[0].sources,
            vec!["https://a/0", "https://a/1", "https://a/2"]
        );
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let log = SearchLog::new();
        let results = execute_searches(
            &EchoProvider,
            &queries(&["a", "fail", "c"]),
            1,
            Duration::from_secs(1),
            &log,
        )
        .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].query, "fail");
        assert!(results[1].error_message().is_some_and(|m| m.contains("connection reset")));
        assert!(!results[0].is_error());
        assert!(!results[2].is_error());
        assert_eq!(log.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error_entry() {
        let log = SearchLog::new();
        let results = execute_searches(
            &EchoProvider,
            &queries(&["slow", "a"]),
            1,
            Duration::from_secs(1),
            &log,
        )
        .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].error_message().is_some_and(|m| m.contains("timed out")));
        assert!(!results[1].is_error());
    }
}
