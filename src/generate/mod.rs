//! Answer synthesis
//!
//! Builds a grounded prompt from retrieved chunks and asks a generation
//! provider for an answer, falling back across providers like every other
//! external call. An empty context short-circuits before any provider is
//! invoked; the fixed no-answer text is the contract for "nothing matched".

mod http_chat;

pub use http_chat::*;

use crate::error::Result;
use crate::providers::{run_with_fallback, ProviderRegistry};
use tracing::info;

/// Answer returned when retrieval produced nothing to ground on
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant documents were found for this question.";

/// A retrieved chunk handed to the synthesizer
#[derive(Debug, Clone)]
pub struct ContextChunk {
    pub text: String,
    pub filename: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Source reference attached to a synthesized answer
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub filename: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Synthesized answer with its supporting sources
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Provider that generated the answer; `None` for the no-context path
    pub provider: Option<String>,
    /// Model the winning provider ran, for the query log
    pub model: Option<String>,
    pub citations: Vec<Citation>,
}

const SYSTEM_PROMPT: &str = "You are a document question-answering assistant. \
Answer the question using only the numbered context passages below. \
Cite passages inline as [1], [2] and so on. \
If the context does not contain the answer, say so plainly.";

fn build_prompt(question: &str, contexts: &[ContextChunk]) -> String {
    let mut prompt = String::from("Context passages:\n\n");
    for (i, chunk) in contexts.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] (from {}, chunk {})\n{}\n\n",
            i + 1,
            chunk.filename,
            chunk.chunk_index,
            chunk.text
        ));
    }
    prompt.push_str(&format!("Question: {}", question));
    prompt
}

/// Synthesize an answer from retrieved chunks.
///
/// With no chunks the fixed no-context answer is returned immediately and
/// no generation provider is called.
pub async fn synthesize_answer(
    registry: &ProviderRegistry,
    question: &str,
    contexts: &[ContextChunk],
    provider_hint: Option<&str>,
) -> Result<Answer> {
    if contexts.is_empty() {
        return Ok(Answer {
            text: NO_CONTEXT_ANSWER.to_string(),
            provider: None,
            model: None,
            citations: Vec::new(),
        });
    }

    let candidates = registry.generation_candidates(provider_hint);
    let messages = vec![
        ChatMessage {
            role: "system".to_string(),
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: build_prompt(question, contexts),
        },
    ];

    let outcome = run_with_fallback("generation", &candidates, |spec| {
        let endpoint = registry.endpoint(spec.id).map(str::to_string);
        let messages = messages.clone();
        async move {
            let endpoint = endpoint.ok_or_else(|| {
                crate::error::Error::Config(format!("No endpoint for provider {}", spec.id))
            })?;
            let client = ChatClient::new(&endpoint, &spec)?;
            client.complete(messages).await
        }
    })
    .await?;

    info!(
        provider = %outcome.provider,
        contexts = contexts.len(),
        "Answer synthesized"
    );

    let citations = contexts
        .iter()
        .map(|c| Citation {
            filename: c.filename.clone(),
            chunk_index: c.chunk_index,
            score: c.score,
        })
        .collect();

    let model = registry
        .get(&outcome.provider)
        .and_then(|s| s.model)
        .map(str::to_string);

    Ok(Answer {
        text: outcome.value,
        provider: Some(outcome.provider),
        model,
        citations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry(endpoints: &[(&str, String)]) -> ProviderRegistry {
        let map: HashMap<String, String> = endpoints
            .iter()
            .map(|(id, url)| (id.to_string(), url.clone()))
            .collect();
        ProviderRegistry::with_endpoints(map)
    }

    fn context(filename: &str, index: usize) -> ContextChunk {
        ContextChunk {
            text: "The warranty period is two years.".to_string(),
            filename: filename.to_string(),
            chunk_index: index,
            score: 0.82,
        }
    }

    #[tokio::test]
    async fn test_empty_context_short_circuits() {
        // No endpoints: any generation dispatch would fail, so the canned
        // answer proves no provider was called.
        let registry = registry(&[]);
        let answer = synthesize_answer(&registry, "what is the warranty?", &[], None)
            .await
            .unwrap();

        assert_eq!(answer.text, NO_CONTEXT_ANSWER);
        assert!(answer.provider.is_none());
        assert!(answer.model.is_none());
        assert!(answer.citations.is_empty());
    }

    #[tokio::test]
    async fn test_answer_carries_citations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "llama3.1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Two years [1]."}}]
            })))
            .mount(&server)
            .await;

        let registry = registry(&[("ollama", server.uri())]);
        let contexts = vec![context("warranty.pdf", 0), context("warranty.pdf", 3)];

        let answer = synthesize_answer(&registry, "what is the warranty?", &contexts, None)
            .await
            .unwrap();

        assert_eq!(answer.text, "Two years [1].");
        assert_eq!(answer.provider.as_deref(), Some("ollama"));
        assert_eq!(answer.model.as_deref(), Some("llama3.1"));
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(answer.citations[1].chunk_index, 3);
    }

    #[tokio::test]
    async fn test_prompt_numbers_contexts() {
        let prompt = build_prompt(
            "what is the warranty?",
            &[context("a.pdf", 0), context("b.pdf", 1)],
        );
        assert!(prompt.contains("[1] (from a.pdf, chunk 0)"));
        assert!(prompt.contains("[2] (from b.pdf, chunk 1)"));
        assert!(prompt.ends_with("Question: what is the warranty?"));
    }
}
