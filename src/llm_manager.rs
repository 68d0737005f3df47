use crate::event_bus::{Event, EventBus, EventEmitter};
use crate::impl_event_emitter;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// Trait representing an LLM provider.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Name of the provider.
    fn name(&self) -> &str;

    /// Send a prompt to the provider and return the raw completion.
    async fn send_prompt(&self, prompt: &str) -> Result<String>;

    /// Model name of the provider.
    fn model_name(&self) -> &str {
        "Unknown"
    }
}

/// The intent resolver: every prompt the pipeline needs answered goes
/// through here. Built once at startup and shared read-only afterwards.
pub struct LLMManager {
    providers: Vec<Box<dyn LLMProvider>>,
    event_bus: Option<Arc<EventBus>>,
}

impl LLMManager {
    /// Create a new manager with the given providers.
    pub fn new(providers: Vec<Box<dyn LLMProvider>>) -> Self {
        Self {
            providers,
            event_bus: None,
        }
    }

    /// Name of the active provider, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.providers.first().map(|p| p.name())
    }

    /// Send a prompt to the first available provider.
    pub async fn send_prompt(&self, prompt: &str) -> Result<String> {
        let provider = self
            .providers
            .first()
            .ok_or_else(|| anyhow::anyhow!("No providers available"))?;

        self.emit_event(Event::ResolverCallStarted {
            provider: provider.name().to_string(),
            model: provider.model_name().to_string(),
        })
        .await?;

        debug!("Prompt to {}:\n{}", provider.name(), prompt);
        let result = provider.send_prompt(prompt).await;

        match &result {
            Ok(completion) => {
                debug!("Completion from {}:\n{}", provider.name(), completion);
                self.emit_event(Event::ResolverCallCompleted {
                    provider: provider.name().to_string(),
                    prompt_chars: prompt.chars().count(),
                    completion_chars: completion.chars().count(),
                })
                .await?;
            }
            Err(e) => {
                self.emit_event(Event::ResolverCallFailed {
                    provider: provider.name().to_string(),
                    error: e.to_string(),
                })
                .await?;
            }
        }

        result
    }
}

impl_event_emitter!(LLMManager);
