//! LLM client abstraction layer
//!
//! The pipeline talks to [`LLMClient`]; [`GenAIClient`] reaches the hosted
//! providers and [`MockLLMClient`] replays scripted responses in tests.

mod client;
mod error;
mod genai;
mod mock;
mod selector;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse};
pub use selector::{select_llm_client, SelectedClient};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole, ResponseSchema};
