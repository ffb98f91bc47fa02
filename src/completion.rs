//! Chat-completion provider seam.
//!
//! The compression retriever and the answer synthesizer both call a completion
//! model through [`CompletionProvider`]. [`RigCompletionProvider`] adapts any
//! `rig` completion model; [`MockCompletionProvider`] scripts replies for
//! offline tests.

use async_trait::async_trait;
use rig::completion::{CompletionModel, Message};
use rig::message::AssistantContent;
use std::sync::Arc;

use crate::types::PipelineError;

/// Invokes a chat-completion model with a fully assembled prompt.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the raw model reply for `prompt` at the given sampling
    /// temperature. Implementations do not retry; retry policy belongs to the
    /// caller wrapping the boundary.
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, PipelineError>;
}

/// Adapter exposing any `rig` [`CompletionModel`] as a [`CompletionProvider`].
#[derive(Clone)]
pub struct RigCompletionProvider<M> {
    model: M,
    preamble: Option<String>,
}

impl<M> RigCompletionProvider<M>
where
    M: CompletionModel,
{
    pub fn new(model: M) -> Self {
        Self {
            model,
            preamble: None,
        }
    }

    /// Sets a system preamble sent with every request.
    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }
}

#[async_trait]
impl<M> CompletionProvider for RigCompletionProvider<M>
where
    M: CompletionModel + Sync,
{
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, PipelineError> {
        let mut builder = self
            .model
            .completion_request(Message::user(prompt.to_string()))
            .temperature(temperature);
        if let Some(preamble) = &self.preamble {
            builder = builder.preamble(preamble.clone());
        }
        let request = builder.build();

        let response = self
            .model
            .completion(request)
            .await
            .map_err(|err| PipelineError::Generation(err.to_string()))?;

        let text: String = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(PipelineError::Generation(
                "model returned no text content".into(),
            ));
        }
        Ok(text)
    }
}

/// Scripted completion provider for tests and demos.
///
/// The handler receives the prompt and temperature and returns the reply.
#[derive(Clone)]
pub struct MockCompletionProvider {
    handler: Arc<dyn Fn(&str, f64) -> Result<String, PipelineError> + Send + Sync>,
}

impl MockCompletionProvider {
    pub fn new(
        handler: impl Fn(&str, f64) -> Result<String, PipelineError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Always replies with `response`, whatever the prompt.
    pub fn fixed(response: impl Into<String>) -> Self {
        let response = response.into();
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// Always fails with a generation error.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_, _| Err(PipelineError::Generation(message.clone())))
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, PipelineError> {
        (self.handler)(prompt, temperature)
    }
}
