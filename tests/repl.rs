//! Chat loop tests driven through in-memory input and output.

mod common;

use std::sync::Arc;

use aegis_mind::agent::client::SMOKE_TEST_PROMPTS;
use aegis_mind::cli::{OutputFormat, run_repl};
use common::{Reply, ScriptedProvider, StaticSearch, config, try_session};
use tokio::runtime::Runtime;

fn run(provider: &Arc<ScriptedProvider>, input: &str, format: OutputFormat) -> String {
    let rt = Runtime::new().unwrap_or_else(|_| unreachable!());
    let search = Arc::new(StaticSearch::new());
    let mut session = rt
        .block_on(try_session(provider, &search, config(&["Agent-1", "Agent-2"])))
        .unwrap_or_else(|_| unreachable!());

    let mut output = Vec::new();
    run_repl(&rt, &mut session, input.as_bytes(), &mut output, format)
        .unwrap_or_else(|_| unreachable!());
    String::from_utf8(output).unwrap_or_default()
}

#[test]
fn test_model_smoke_test_command() {
    let provider = Arc::new(ScriptedProvider::new());
    let out = run(&provider, "teste\nexit\n", OutputFormat::Text);

    assert!(out.contains("Testing model deepseek-r1:8b..."));
    for prompt in SMOKE_TEST_PROMPTS {
        assert!(out.contains(prompt));
    }
    assert!(out.contains("3/3 prompts answered."));

    // Bare prompts: no system message, no pipeline stages.
    let calls = provider.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.system.is_empty() && c.stage == "unknown"));
}

#[test]
fn test_model_smoke_test_reports_failures() {
    let provider = Arc::new(ScriptedProvider::new().role("unknown", Reply::Fail("boom".to_string())));
    let out = run(&provider, "test\n", OutputFormat::Json);

    let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_default();
    let results = value["results"].as_array().cloned().unwrap_or_default();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r["error"].as_str().is_some_and(|e| e.contains("boom"))));
}

#[test]
fn test_question_then_exit() {
    let provider = Arc::new(ScriptedProvider::new().aggregator(Reply::text("Brasília.")));
    let out = run(&provider, "capital of Brazil\nstatus\nquit\nnever asked\n", OutputFormat::Text);

    assert!(out.contains("Brasília."));
    assert!(out.contains("Agents: Agent-1, Agent-2"));
    assert!(out.contains("Turns in history: 2"));
    assert!(!provider.calls().iter().any(|c| c.user.contains("never asked")));
}
