use clap::{Parser, Subcommand, ValueEnum};
use genai::adapter::AdapterKind;
use std::path::PathBuf;

/// LLM-powered explanations of GitHub repositories
#[derive(Parser, Debug)]
#[command(
    name = "reposage",
    about = "LLM-powered explanations of GitHub repositories",
    version,
    author,
    long_about = "reposage reads a GitHub repository, picks the files that matter, analyzes \
                  each of them with an LLM and writes a report with a call hierarchy and a \
                  project summary. It supports multiple AI providers (OpenAI, Ollama, \
                  Anthropic, Gemini, xAI, Groq)."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Analyze a GitHub repository",
        long_about = "Fetches the repository tree, selects the important files, analyzes them \
                      and composes a call hierarchy and summary. Ctrl-C cancels the run.\n\n\
                      Examples:\n  \
                      reposage analyze https://github.com/owner/repo\n  \
                      reposage analyze https://github.com/owner/repo -o report.md\n  \
                      reposage analyze https://github.com/owner/repo --format json\n  \
                      reposage analyze https://github.com/owner/repo --backend ollama --model qwen2.5-coder:7b"
    )]
    Analyze(AnalyzeArgs),

    #[command(
        about = "Show the resolved configuration",
        long_about = "Prints the configuration after environment variables and the config \
                      file are applied, and validates it.\n\n\
                      Examples:\n  \
                      reposage config\n  \
                      reposage config --config ./reposage.json"
    )]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(value_name = "URL", help = "GitHub repository URL")]
    pub url: String,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the report to FILE (a .json sidecar is written next to a markdown report)"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "markdown",
        help = "Report format"
    )]
    pub format: ReportFormatArg,

    #[arg(long, value_name = "ID", help = "Session id (random when omitted)")]
    pub session_id: Option<String>,

    #[arg(long, value_name = "FILE", help = "Path to a JSON config file")]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'b',
        long,
        value_parser = parse_adapter_kind,
        help = "LLM provider, overriding REPOSAGE_PROVIDER"
    )]
    pub backend: Option<AdapterKind>,

    #[arg(
        short = 'm',
        long,
        value_name = "MODEL",
        help = "Model for every stage, overriding REPOSAGE_MODEL"
    )]
    pub model: Option<String>,

    #[arg(long, value_name = "SECONDS", help = "Request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(
        long,
        value_name = "TOKENS",
        help = "Token ceiling before file contents get summarized"
    )]
    pub max_tokens: Option<usize>,

    #[arg(long, help = "Analyze markdown files too")]
    pub include_markdown: bool,

    #[arg(long, help = "Do not request JSON-schema constrained output")]
    pub no_structured_output: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(long, value_name = "FILE", help = "Path to a JSON config file")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormatArg {
    Markdown,
    Json,
}

fn parse_adapter_kind(s: &str) -> Result<AdapterKind, String> {
    crate::config::parse_provider(s).map_err(|e| e.to_string())
}
