use crate::config::ReposageConfig;
use crate::llm::{GenAIClient, LLMClient};
use anyhow::{bail, Result};
use genai::adapter::AdapterKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct SelectedClient {
    pub client: Arc<dyn LLMClient>,
    pub provider: AdapterKind,
    pub description: String,
}

/// Builds the completion client named by the configuration.
///
/// Cloud providers need their API key in the environment; Ollama needs a
/// reachable local server.
pub async fn select_llm_client(config: &ReposageConfig) -> Result<SelectedClient> {
    let provider = config.provider;

    if provider == AdapterKind::Ollama {
        if config.llm_endpoint.is_none() && !is_ollama_available().await {
            bail!("Ollama is not reachable. Start it with `ollama serve` or set OLLAMA_HOST");
        }
    } else if !provider_has_credentials(provider) {
        let key = provider.default_key_env_name().unwrap_or("API key");
        bail!(
            "No credentials for {}. Set {} or choose another provider with REPOSAGE_PROVIDER",
            provider,
            key
        );
    }

    let client = GenAIClient::new(
        provider,
        config.model.clone(),
        Duration::from_secs(config.request_timeout_secs),
        config.llm_endpoint.clone(),
    )?;

    let description = format!("{} ({})", provider, config.model);
    info!("Using LLM provider: {}", description);

    Ok(SelectedClient {
        client: Arc::new(client),
        provider,
        description,
    })
}

fn provider_has_credentials(provider: AdapterKind) -> bool {
    match provider.default_key_env_name() {
        None => true,
        Some(env_var) => std::env::var(env_var).is_ok(),
    }
}

async fn is_ollama_available() -> bool {
    let base_url =
        std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));

    match reqwest::Client::new()
        .get(&url)
        .timeout(Duration::from_secs(2))
        .send()
        .await
    {
        Ok(resp) => {
            let available = resp.status().is_success();
            debug!("Ollama availability check: {}", available);
            available
        }
        Err(e) => {
            debug!("Ollama not available: {}", e);
            false
        }
    }
}
