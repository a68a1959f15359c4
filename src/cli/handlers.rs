use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::commands::{AnalyzeArgs, ConfigArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::config::{ConfigFile, ReposageConfig};
use crate::llm::select_llm_client;
use crate::pipeline::{AnalysisOrchestrator, AnalysisResult, SessionRegistry};

/// Exit code of a run stopped with Ctrl-C
const EXIT_CANCELED: i32 = 130;

pub async fn handle_analyze(args: &AnalyzeArgs, quiet: bool) -> i32 {
    match run_analyze(args, quiet).await {
        Ok(Some(_)) => 0,
        Ok(None) => {
            if !quiet {
                eprintln!("Analysis canceled");
            }
            EXIT_CANCELED
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    match ReposageConfig::load(args.config.as_deref()) {
        Ok(config) => {
            print!("{}", config);
            0
        }
        Err(e) => {
            error!("Configuration error: {}", e);
            1
        }
    }
}

/// Loads the configuration and lays the command-line flags on top
pub fn resolve_config(args: &AnalyzeArgs) -> Result<ReposageConfig> {
    let mut config =
        ReposageConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(provider) = args.backend {
        debug!("Provider explicitly set to: {}", provider);
        config.provider = provider;
    }
    if let Some(model) = &args.model {
        debug!("Model overridden to: {}", model);
        config.apply_file(ConfigFile {
            model: Some(model.clone()),
            ..ConfigFile::default()
        })?;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens_per_request = max_tokens;
    }
    if args.include_markdown {
        config.include_markdown = true;
    }
    if args.no_structured_output {
        config.structured_output = false;
    }

    config
        .validate()
        .context("Invalid configuration after applying command-line flags")?;
    Ok(config)
}

async fn run_analyze(args: &AnalyzeArgs, quiet: bool) -> Result<Option<AnalysisResult>> {
    let config = resolve_config(args)?;
    debug!("{}", config);

    let selected = select_llm_client(&config).await?;
    let host = config
        .github_client()
        .context("Failed to create GitHub client")?;

    let orchestrator = AnalysisOrchestrator::new(
        selected.client,
        Arc::new(host),
        Arc::new(SessionRegistry::new()),
        config.to_pipeline_config(),
    );

    let session_id = args
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!(session = %session_id, llm = %selected.description, "Analyzing {}", args.url);

    let signal = CancellationToken::new();
    let ctrl_c = {
        let signal = signal.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, canceling analysis");
                signal.cancel();
            }
        })
    };

    let outcome = orchestrator
        .run_analysis_with_signal(&args.url, &session_id, &signal)
        .await;
    ctrl_c.abort();

    let Some(result) = outcome? else {
        return Ok(None);
    };

    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    match &args.output {
        Some(path) => {
            for written in formatter.write(&result, path)? {
                info!("Report written to {}", written.display());
                if !quiet {
                    eprintln!("Wrote {}", written.display());
                }
            }
        }
        None => println!("{}", formatter.format(&result)?),
    }

    info!(
        files = result.files.len(),
        tokens = result.total_tokens,
        elapsed = ?result.duration,
        "Analysis complete"
    );
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::{CliArgs, Commands};
    use crate::pipeline::Stage;
    use clap::Parser;
    use serial_test::serial;

    fn analyze_args(extra: &[&str]) -> AnalyzeArgs {
        let mut argv = vec!["reposage", "analyze", "https://github.com/o/r"];
        argv.extend_from_slice(extra);
        match CliArgs::parse_from(argv).command {
            Commands::Analyze(args) => args,
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    #[serial]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, r#"{ "max_tokens_per_request": 8000 }"#).unwrap();
        let file_arg = file.to_string_lossy().to_string();

        let args = analyze_args(&[
            "--config",
            &file_arg,
            "--model",
            "llama3",
            "--backend",
            "ollama",
            "--max-tokens",
            "1234",
            "--no-structured-output",
        ]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.provider, genai::adapter::AdapterKind::Ollama);
        assert_eq!(config.max_tokens_per_request, 1234);
        assert!(!config.structured_output);
        assert_eq!(config.stages.get(Stage::CodeAnalysis).model, "llama3");
    }

    #[test]
    #[serial]
    fn test_invalid_flag_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, "{}").unwrap();
        let file_arg = file.to_string_lossy().to_string();

        let args = analyze_args(&["--config", &file_arg, "--timeout", "0"]);
        assert!(resolve_config(&args).is_err());
    }
}
