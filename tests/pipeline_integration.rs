//! Integration tests for the analysis pipeline
//!
//! Runs drive the orchestrator end to end against an in-memory repository
//! and a scripted LLM, covering the happy path, budget pressure, degraded
//! fallbacks, cancellation and single-flight admission.

use reposage::github::MockSourceHost;
use reposage::llm::{BackendError, MockLLMClient, MockResponse};
use reposage::pipeline::phases::fetch::README_PLACEHOLDER;
use reposage::pipeline::{
    AnalysisOrchestrator, AnalysisState, FileMetadata, PipelineConfig, SessionRegistry, Stage,
};
use reposage::progress::{CollectingHandler, ProgressEvent};
use reposage::AnalysisError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const MAIN_RS: &str = "// entry\n// entry\n// entry\n// entry\n";
const LIB_RS: &str = "pub fn run() { println!(\"raw-lib-body\"); }\n";

/// README, two sources, a manifest and an image
fn demo_host() -> MockSourceHost {
    MockSourceHost::new("octo", "demo")
        .with_file("README.md", "# Demo\nA tiny CLI.")
        .with_dir("src")
        .with_file("src/main.rs", MAIN_RS)
        .with_file("src/lib.rs", LIB_RS)
        .with_file("logo.png", "png")
        .with_file("Cargo.toml", "[package]\nname = \"demo\"\n")
}

struct Harness {
    llm: Arc<MockLLMClient>,
    host: Arc<MockSourceHost>,
    registry: Arc<SessionRegistry>,
    progress: Arc<CollectingHandler>,
    orchestrator: Arc<AnalysisOrchestrator>,
    url: String,
}

fn harness(host: MockSourceHost, config: PipelineConfig) -> Harness {
    let llm = Arc::new(MockLLMClient::new());
    let url = host.url();
    let host = Arc::new(host);
    let registry = Arc::new(SessionRegistry::new());
    let progress = Arc::new(CollectingHandler::new());
    let orchestrator = Arc::new(
        AnalysisOrchestrator::new(llm.clone(), host.clone(), registry.clone(), config)
            .with_progress(progress.clone()),
    );
    Harness {
        llm,
        host,
        registry,
        progress,
        orchestrator,
        url,
    }
}

async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

fn summary_json() -> String {
    json!({
        "intro": "This project is a tiny CLI.",
        "mainPurpose": "Runs a command.",
        "techStack": "Rust.",
        "keyComponents": "main.rs calls lib.rs.",
        "notableFeatures": "None.",
        "codeOrganization": "Binary plus library.",
        "overall": "Overall, a minimal example."
    })
    .to_string()
}

#[tokio::test]
async fn test_full_analysis() {
    let h = harness(demo_host(), PipelineConfig::default());
    h.llm.add_responses(vec![
        MockResponse::text("A Rust CLI with a library"),
        MockResponse::text(r#"{"importantFiles": ["src/main.rs", "src/lib.rs", "logo.png"]}"#),
        MockResponse::text("Main entry point"),
        MockResponse::text("```json\n{\"name\":\"main.rs\"}\n```"),
        MockResponse::text("Library with run()"),
        MockResponse::text("not json at all"),
        MockResponse::text("main() → run()"),
        MockResponse::text(summary_json()),
    ]);

    let result = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap()
        .expect("run was not canceled");

    assert_eq!(result.project_understanding, "A Rust CLI with a library");
    assert_eq!(result.readme, "# Demo\nA tiny CLI.");
    assert_eq!(result.candidate_count, 3);
    assert_eq!(result.selection_strategy, "structured_response");

    let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src/main.rs", "src/lib.rs"]);
    assert_eq!(result.files[0].text_analysis, "Main entry point");
    assert_eq!(
        result.files[0].metadata,
        FileMetadata::Parsed(json!({"name": "main.rs"}).as_object().unwrap().clone())
    );
    assert!(result.files[1].metadata.is_degraded());
    assert_eq!(
        result.files[1].metadata.get("mainPurpose"),
        Some(json!("Extracted from text analysis"))
    );

    assert_eq!(result.call_hierarchy, "main() → run()");
    assert!(result
        .summary
        .starts_with("This project is a tiny CLI.\n1. **Main purpose and functionality**: Runs a command."));
    assert!(result.summary.ends_with("Overall, a minimal example."));

    assert_eq!(
        h.host.requested_paths(),
        vec!["README.md", "src/main.rs", "src/lib.rs"]
    );
    assert_eq!(
        result.total_tokens,
        (MAIN_RS.chars().count() / 4) + (LIB_RS.chars().count() / 4)
    );

    let requests = h.llm.requests();
    assert_eq!(requests.len(), 8);
    assert!(requests[0].user_text().contains("# Demo"));
    assert!(requests[0].user_text().contains("src/main.rs\nsrc/lib.rs"));
    assert!(requests[1].response_schema.is_some());
    assert!(!requests[1].user_text().contains("logo.png"));
    assert!(requests[2].user_text().contains(MAIN_RS));
    assert_eq!(requests[6].max_tokens, Some(Stage::CallHierarchy.default_max_tokens()));

    let states = h.progress.states();
    assert!(states.contains(&AnalysisState::AnalyzingFiles { current: 1, total: 2 }));
    assert!(states.contains(&AnalysisState::AnalyzingFiles { current: 2, total: 2 }));
    assert_eq!(states.last(), Some(&AnalysisState::Complete));

    let state = h.registry.state();
    assert!(!state.is_analyzing);
    assert_eq!(state.active_requests, 0);
    assert!(!state.previously_canceled);
    assert_eq!(state.last_session_id.as_deref(), Some("session-1"));
    assert!(h.registry.active_sessions().is_empty());
}

#[tokio::test]
async fn test_budget_pressure_analyzes_summary() {
    let config = PipelineConfig::default().with_max_tokens_per_request(10);
    let h = harness(demo_host(), config);
    h.llm.add_responses(vec![
        MockResponse::text("A Rust CLI"),
        MockResponse::text(r#"["src/main.rs", "src/lib.rs"]"#),
        MockResponse::text("Main entry point"),
        MockResponse::text(r#"{"name":"main.rs"}"#),
        MockResponse::text("SUMMARY-OF-LIB"),
        MockResponse::text("Library, from summary"),
        MockResponse::text(r#"{"name":"lib.rs"}"#),
        MockResponse::text("main() → run()"),
        MockResponse::text("This project is a CLI."),
    ]);

    let result = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap()
        .unwrap();

    assert!(!result.files[0].summarized);
    assert!(result.files[1].summarized);
    assert_eq!(
        result.total_tokens,
        MAIN_RS.chars().count() / 4 + "SUMMARY-OF-LIB".len() / 4
    );

    let requests = h.llm.requests();
    assert_eq!(requests[4].max_tokens, Some(Stage::ContentSummary.default_max_tokens()));
    assert!(requests[4].user_text().contains("raw-lib-body"));
    for request in &requests[5..7] {
        assert!(request.user_text().contains("SUMMARY-OF-LIB"));
        assert!(!request.user_text().contains("raw-lib-body"));
    }

    // Unstructured summaries pass through untouched
    assert_eq!(result.summary, "This project is a CLI.");

    let summarized: Vec<ProgressEvent> = h
        .progress
        .events()
        .into_iter()
        .filter(|e| matches!(e, ProgressEvent::FileSummarized { .. }))
        .collect();
    assert_eq!(summarized.len(), 1);
}

#[tokio::test]
async fn test_failed_selection_call_falls_back_to_heuristic() {
    let h = harness(demo_host(), PipelineConfig::default());
    h.llm.add_responses(vec![
        MockResponse::text("A Rust CLI"),
        MockResponse::error(BackendError::RateLimitError { retry_after: None }),
        MockResponse::text("Main"),
        MockResponse::text("{}"),
        MockResponse::text("Lib"),
        MockResponse::text("{}"),
        MockResponse::text("hierarchy"),
        MockResponse::text("summary"),
    ]);

    let result = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.selection_strategy, "static_heuristic");
    let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src/main.rs", "src/lib.rs"]);
}

#[tokio::test]
async fn test_cancel_while_analyzing_files() {
    let h = harness(demo_host(), PipelineConfig::default());
    h.llm.add_responses(vec![
        MockResponse::text("A Rust CLI"),
        MockResponse::text(r#"{"importantFiles": ["src/main.rs", "src/lib.rs"]}"#),
        MockResponse::hang(),
    ]);

    let orchestrator = h.orchestrator.clone();
    let url = h.url.clone();
    let run = tokio::spawn(async move { orchestrator.run_analysis(&url, "session-1").await });

    let registry = h.registry.clone();
    let llm = h.llm.clone();
    wait_for("the first file analysis call", move || {
        llm.call_count() == 3
            && matches!(
                registry.session_state("session-1"),
                Some(AnalysisState::AnalyzingFiles { current: 1, total: 2 })
            )
    })
    .await;
    assert_eq!(h.registry.state().active_requests, 1);

    assert!(h.orchestrator.cancel("session-1"));
    let outcome = run.await.unwrap().unwrap();
    assert!(outcome.is_none());

    assert!(!h.registry.is_active("session-1"));
    let state = h.registry.state();
    assert!(!state.is_analyzing);
    assert!(state.previously_canceled);
    assert_eq!(state.active_requests, 0);

    // Nothing past the interrupted call was attempted
    assert_eq!(h.llm.call_count(), 3);
    assert_eq!(h.host.requested_paths(), vec!["README.md", "src/main.rs"]);
    assert!(h.progress.events().contains(&ProgressEvent::Canceled {
        session_id: "session-1".to_string()
    }));

    // Canceling again reports an unknown session
    assert!(!h.orchestrator.cancel("session-1"));
}

#[tokio::test]
async fn test_external_signal_cancels_run() {
    let h = harness(demo_host(), PipelineConfig::default());
    h.llm.add_response(MockResponse::hang());

    let signal = tokio_util::sync::CancellationToken::new();
    let orchestrator = h.orchestrator.clone();
    let url = h.url.clone();
    let run_signal = signal.clone();
    let run = tokio::spawn(async move {
        orchestrator
            .run_analysis_with_signal(&url, "session-1", &run_signal)
            .await
    });

    let llm = h.llm.clone();
    wait_for("the understanding call", move || llm.call_count() == 1).await;
    signal.cancel();

    assert!(run.await.unwrap().unwrap().is_none());
    assert!(h.registry.active_sessions().is_empty());
}

#[tokio::test]
async fn test_restart_same_session_evicts_previous_run() {
    let h = harness(MockSourceHost::new("octo", "empty"), PipelineConfig::default());
    h.llm.add_responses(vec![
        MockResponse::hang(),
        MockResponse::text("An empty project"),
        MockResponse::text("No calls"),
        MockResponse::text("This project is empty."),
    ]);

    let orchestrator = h.orchestrator.clone();
    let url = h.url.clone();
    let first = tokio::spawn(async move { orchestrator.run_analysis(&url, "session-1").await });

    let llm = h.llm.clone();
    wait_for("the first run's understanding call", move || llm.call_count() == 1).await;

    let second = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap();

    assert!(first.await.unwrap().unwrap().is_none());
    let second = second.expect("second run completes");
    assert_eq!(second.summary, "This project is empty.");

    // The evicted run's late teardown leaves no cancellation marker behind
    let state = h.registry.state();
    assert!(!state.is_analyzing);
    assert!(!state.previously_canceled);
    assert!(h.registry.active_sessions().is_empty());
}

#[tokio::test]
async fn test_second_session_is_refused_while_analyzing() {
    let h = harness(demo_host(), PipelineConfig::default());
    h.llm.add_response(MockResponse::hang());

    let orchestrator = h.orchestrator.clone();
    let url = h.url.clone();
    let first = tokio::spawn(async move { orchestrator.run_analysis(&url, "session-1").await });

    let llm = h.llm.clone();
    wait_for("the first run's understanding call", move || llm.call_count() == 1).await;
    let before = h.registry.state();

    let err = h
        .orchestrator
        .run_analysis(&h.url, "session-2")
        .await
        .unwrap_err();
    match err {
        AnalysisError::AlreadyAnalyzing { active_session } => {
            assert_eq!(active_session, "session-1")
        }
        other => panic!("expected AlreadyAnalyzing, got {:?}", other),
    }
    assert_eq!(h.registry.state(), before);
    assert_eq!(h.llm.call_count(), 1);

    h.orchestrator.force_terminate_all();
    assert!(first.await.unwrap().unwrap().is_none());
    h.orchestrator.reset_state();
    assert!(!h.registry.state().is_analyzing);
}

#[tokio::test]
async fn test_llm_failure_names_the_stage() {
    let h = harness(demo_host(), PipelineConfig::default());
    h.llm.add_response(MockResponse::error(BackendError::AuthenticationError {
        message: "bad key".to_string(),
    }));

    let err = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::LlmCall {
            stage: Stage::ProjectStructure,
            ..
        }
    ));
    assert!(h.progress.events().iter().any(|e| matches!(
        e,
        ProgressEvent::Failed { stage, .. } if stage == "project_structure"
    )));
    assert_eq!(h.progress.states().last(), Some(&AnalysisState::Failed));
    assert!(!h.registry.state().is_analyzing);
    assert!(!h.registry.state().previously_canceled);
}

#[tokio::test]
async fn test_file_analysis_call_failure_aborts_run() {
    let h = harness(demo_host(), PipelineConfig::default());
    h.llm.add_responses(vec![
        MockResponse::text("A Rust CLI"),
        MockResponse::text(r#"["src/main.rs"]"#),
        MockResponse::text("Main entry point"),
        MockResponse::error(BackendError::TimeoutError { seconds: 30 }),
    ]);

    let err = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::LlmCall {
            stage: Stage::CodeAnalysis,
            ..
        }
    ));
}

#[tokio::test]
async fn test_readme_failure_is_not_fatal() {
    let host = demo_host().with_failing_path("README.md");
    let h = harness(host, PipelineConfig::default());
    h.llm.add_responses(vec![
        MockResponse::text("A Rust CLI"),
        MockResponse::text(r#"{"importantFiles": ["Cargo.toml"]}"#),
        MockResponse::text("Manifest"),
        MockResponse::text(r#"{"name":"Cargo.toml"}"#),
        MockResponse::text("hierarchy"),
        MockResponse::text("summary"),
    ]);

    let result = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.readme, README_PLACEHOLDER);
    assert!(h.llm.requests()[0].user_text().contains(README_PLACEHOLDER));
    assert!(h
        .progress
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::ReadmeUnavailable { path, .. } if path == "README.md")));
}

#[tokio::test]
async fn test_selected_file_fetch_failure_is_fatal() {
    let host = demo_host().with_failing_path("src/main.rs");
    let h = harness(host, PipelineConfig::default());
    h.llm.add_responses(vec![
        MockResponse::text("A Rust CLI"),
        MockResponse::text(r#"["src/main.rs", "src/lib.rs"]"#),
    ]);

    let err = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap_err();

    match &err {
        AnalysisError::UpstreamFetch { operation, .. } => {
            assert_eq!(operation, "fetch content of src/main.rs")
        }
        other => panic!("expected UpstreamFetch, got {:?}", other),
    }
    assert_eq!(err.stage_label(), "fetch content of src/main.rs");
    assert_eq!(h.llm.call_count(), 2);
}

#[tokio::test]
async fn test_markdown_candidates_when_enabled() {
    let config = PipelineConfig::default().with_markdown(true);
    let h = harness(demo_host(), config);
    h.llm.add_responses(vec![
        MockResponse::text("A Rust CLI"),
        MockResponse::text(r#"["README.md"]"#),
        MockResponse::text("Docs"),
        MockResponse::text("{}"),
        MockResponse::text("hierarchy"),
        MockResponse::text("summary"),
    ]);

    let result = h
        .orchestrator
        .run_analysis(&h.url, "session-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.candidate_count, 4);
    assert_eq!(result.files[0].path, "README.md");
}
