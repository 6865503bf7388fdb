//! Free-form reply generation for assistant mode.
//!
//! Supports:
//! - **Echo**: `Echo: <message>`, no model involved
//! - **Anthropic** / **OpenAI**: a rig-core agent with a clinic receptionist preamble
//!
//! `FallbackReply` wraps any generator so a failed or slow model call turns
//! into a fixed "please repeat" reply instead of an HTTP error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::{CompletionModel, Prompt};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::error::LlmError;
use crate::intake::model::Locale;
use crate::intake::prompts;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl LlmBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }

    /// Model used when `LLM_MODEL` is unset.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
        }
    }
}

/// Configuration for creating an LLM-backed reply generator.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Per-call context handed to a generator.
#[derive(Debug, Clone, Copy)]
pub struct ReplyContext<'a> {
    pub session_id: &'a str,
    pub locale: Locale,
}

/// Produces one reply for one inbound message.
#[async_trait]
pub trait FreeformReply: Send + Sync {
    async fn generate(&self, message: &str, ctx: ReplyContext<'_>) -> Result<String, LlmError>;
}

/// Replies `Echo: <message>`.
pub struct EchoReply;

#[async_trait]
impl FreeformReply for EchoReply {
    async fn generate(&self, message: &str, _ctx: ReplyContext<'_>) -> Result<String, LlmError> {
        Ok(format!("Echo: {message}"))
    }
}

/// Stand-in when assistant mode runs without an API key. Every call fails,
/// so callers see the fallback reply.
pub struct UnconfiguredReply;

#[async_trait]
impl FreeformReply for UnconfiguredReply {
    async fn generate(&self, _message: &str, _ctx: ReplyContext<'_>) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured {
            provider: "llm".to_string(),
        })
    }
}

const PREAMBLE: &str = "You are the front-desk assistant of a dental clinic. \
Answer briefly and kindly. Do not diagnose; suggest booking a visit when \
the patient describes a problem.";

const MAX_TOKENS: u64 = 512;

/// rig-core agent wrapped as a reply generator.
pub struct RigReply<M: CompletionModel> {
    agent: Agent<M>,
    provider: &'static str,
    timeout: Duration,
}

impl<M: CompletionModel> RigReply<M> {
    pub fn new(agent: Agent<M>, provider: &'static str, timeout: Duration) -> Self {
        Self {
            agent,
            provider,
            timeout,
        }
    }
}

#[async_trait]
impl<M> FreeformReply for RigReply<M>
where
    M: CompletionModel + 'static,
{
    async fn generate(&self, message: &str, ctx: ReplyContext<'_>) -> Result<String, LlmError> {
        let prompt = match ctx.locale {
            Locale::En => message.to_string(),
            Locale::Ar => format!("Reply in Arabic.\n\n{message}"),
        };

        match tokio::time::timeout(self.timeout, self.agent.prompt(prompt)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(LlmError::RequestFailed {
                provider: self.provider.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(LlmError::Timeout {
                provider: self.provider.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

/// Maps any generator error to the fixed "please repeat" reply.
pub struct FallbackReply {
    inner: Arc<dyn FreeformReply>,
}

impl FallbackReply {
    pub fn new(inner: Arc<dyn FreeformReply>) -> Self {
        Self { inner }
    }

    /// Always yields a reply.
    pub async fn reply(&self, message: &str, ctx: ReplyContext<'_>) -> String {
        match self.inner.generate(message, ctx).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session_id = %ctx.session_id, error = %e, "Free-form reply failed");
                prompts::please_repeat(ctx.locale).to_string()
            }
        }
    }
}

/// Create a reply generator from configuration.
pub fn create_reply(
    config: &LlmConfig,
    timeout: Duration,
) -> Result<Arc<dyn FreeformReply>, LlmError> {
    match config.backend {
        LlmBackend::Anthropic => create_anthropic_reply(config, timeout),
        LlmBackend::OpenAi => create_openai_reply(config, timeout),
    }
}

fn create_anthropic_reply(
    config: &LlmConfig,
    timeout: Duration,
) -> Result<Arc<dyn FreeformReply>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let agent = client
        .agent(&config.model)
        .preamble(PREAMBLE)
        .max_tokens(MAX_TOKENS)
        .build();
    info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(RigReply::new(agent, "anthropic", timeout)))
}

fn create_openai_reply(
    config: &LlmConfig,
    timeout: Duration,
) -> Result<Arc<dyn FreeformReply>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let agent = client
        .agent(&config.model)
        .preamble(PREAMBLE)
        .max_tokens(MAX_TOKENS)
        .build();
    info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(RigReply::new(agent, "openai", timeout)))
}
