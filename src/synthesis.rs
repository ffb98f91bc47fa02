//! Answer synthesis: assembles a grounding prompt from compressed context and
//! invokes the chat-completion model at low temperature.

use std::sync::Arc;
use std::time::Duration;

use crate::completion::CompletionProvider;
use crate::retrieval::CompressedContext;
use crate::types::{PipelineError, bounded};

/// Fixed reply when no context survived compression. The model is never
/// invoked in that case, so the pipeline cannot hallucinate an answer.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I cannot answer that from the provided document content.";

/// Generates the final answer from question plus compressed context.
///
/// The model is instructed, not guaranteed, to refuse when context is
/// insufficient — callers should treat the answer as best-effort.
pub struct AnswerSynthesizer {
    model: Arc<dyn CompletionProvider>,
    temperature: f64,
    call_timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(
        model: Arc<dyn CompletionProvider>,
        temperature: f64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            model,
            temperature,
            call_timeout,
        }
    }

    pub async fn generate(
        &self,
        question: &str,
        context: &CompressedContext,
    ) -> Result<String, PipelineError> {
        if context.is_empty() {
            tracing::info!("no context survived compression, refusing to answer");
            return Ok(INSUFFICIENT_CONTEXT_ANSWER.to_string());
        }

        let grounding = context
            .chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = grounding_prompt(question, &grounding);

        let answer = bounded(
            self.call_timeout,
            self.model.complete(&prompt, self.temperature),
            || PipelineError::Generation("completion call timed out".into()),
        )
        .await?;
        Ok(answer.trim().to_string())
    }
}

fn grounding_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant. Use only the following retrieved documents to \
         answer the user's question. If the documents do not contain the answer, say so \
         instead of guessing.\n\n\
         Documents:\n\
         {context}\n\n\
         Question:\n\
         {question}\n\n\
         Answer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::MockCompletionProvider;
    use crate::retrieval::CompressedChunk;

    fn context_with(texts: &[&str]) -> CompressedContext {
        CompressedContext {
            chunks: texts
                .iter()
                .map(|text| CompressedChunk {
                    text: text.to_string(),
                    source_ref: "doc.pdf".to_string(),
                    page: None,
                    similarity: 0.9,
                })
                .collect(),
            failed_extractions: 0,
            total_candidates: texts.len(),
        }
    }

    #[tokio::test]
    async fn empty_context_short_circuits_without_model_call() {
        let model = MockCompletionProvider::failing("must not be called");
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(model), 0.2, Duration::from_secs(5));
        let answer = synthesizer
            .generate("anything", &CompressedContext::default())
            .await
            .unwrap();
        assert_eq!(answer, INSUFFICIENT_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn prompt_contains_question_and_blank_line_joined_context() {
        let model = MockCompletionProvider::new(|prompt, _| Ok(prompt.to_string()));
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(model), 0.2, Duration::from_secs(5));
        let echoed = synthesizer
            .generate("What methods?", &context_with(&["span one", "span two"]))
            .await
            .unwrap();
        assert!(echoed.contains("span one\n\nspan two"));
        assert!(echoed.contains("What methods?"));
        assert!(echoed.contains("Use only the following retrieved documents"));
    }

    #[tokio::test]
    async fn answer_is_trimmed() {
        let model = MockCompletionProvider::fixed("  the answer \n");
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(model), 0.2, Duration::from_secs(5));
        let answer = synthesizer
            .generate("q", &context_with(&["span"]))
            .await
            .unwrap();
        assert_eq!(answer, "the answer");
    }

    #[tokio::test]
    async fn generation_failure_propagates() {
        let model = MockCompletionProvider::failing("offline");
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(model), 0.2, Duration::from_secs(5));
        let result = synthesizer.generate("q", &context_with(&["span"])).await;
        assert!(matches!(result, Err(PipelineError::Generation(_))));
    }
}
