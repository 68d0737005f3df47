use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::llm_manager::LLMManager;

/// Produces the JSON template (`{"endpoint_url": .., "payload": {..}}`) for
/// an intent.
#[async_trait]
pub trait TemplateRetriever: Send + Sync {
    async fn retrieve_template(&self, intent_query: &str) -> PipelineResult<String>;
}

/// Read-only chunked copy of the endpoint document.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    chunks: Vec<String>,
}

impl DocumentStore {
    pub fn load<P: AsRef<Path>>(path: P, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read documents: {}", path.as_ref().display()))?;
        let store = Self::from_text(&text, chunk_size, chunk_overlap);
        info!(
            "Loaded {} chunk(s) from {}",
            store.len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    /// Split `text` into windows of `chunk_size` characters, each sharing
    /// `chunk_overlap` characters with the previous one.
    pub fn from_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let size = chunk_size.max(1);
        let step = if chunk_overlap < size { size - chunk_overlap } else { size };

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + size).min(chars.len());
            let chunk: String = chars[start..end].iter().collect();
            if !chunk.trim().is_empty() {
                chunks.push(chunk.trim().to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }

        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The chunk sharing the most words with `query`; ties go to the
    /// earlier chunk.
    pub fn best_chunk(&self, query: &str) -> Option<&str> {
        let wanted = words(query);
        let mut best: Option<(usize, &str)> = None;

        for chunk in &self.chunks {
            let score = words(chunk).intersection(&wanted).count();
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, chunk.as_str()));
            }
        }

        best.map(|(_, chunk)| chunk)
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Cut the outermost `{ ... }` out of a completion.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Retriever that asks the resolver to pick the endpoint from the best
/// matching document chunk.
pub struct DocumentTemplateRetriever {
    store: DocumentStore,
    llm: Arc<LLMManager>,
    retrieval_prompt_template: String,
}

impl DocumentTemplateRetriever {
    pub fn new(store: DocumentStore, llm: Arc<LLMManager>) -> Self {
        Self {
            store,
            llm,
            retrieval_prompt_template: Self::default_retrieval_prompt(),
        }
    }

    fn build_retrieval_prompt(&self, context: &str, query: &str) -> String {
        format!(
            "{}\n\nContext: {}\n\nQuery: {}\n",
            self.retrieval_prompt_template, context, query
        )
    }

    fn default_retrieval_prompt() -> String {
        r#"Retrieve the most relevant endpoint from the provided context based on the user's query.
Respond strictly in this format without deviation:

{
  "endpoint_url": "<URL>",
  "payload": {
    "field1": "<value>",
    "field2": "<value>"
  }
}

Leave a field blank when no value is given (e.g. "field1": "").
Replace <URL> with the actual endpoint URL and list every field the endpoint accepts.
Do not add text, explanations or comments outside the JSON."#
            .to_string()
    }
}

#[async_trait]
impl TemplateRetriever for DocumentTemplateRetriever {
    async fn retrieve_template(&self, intent_query: &str) -> PipelineResult<String> {
        let context = self
            .store
            .best_chunk(intent_query)
            .ok_or_else(|| PipelineError::Retrieval("document store is empty".to_string()))?;
        debug!("Retrieval context for '{}': {} chars", intent_query, context.len());

        let prompt = self.build_retrieval_prompt(context, intent_query);
        let completion = self
            .llm
            .send_prompt(&prompt)
            .await
            .map_err(|e| PipelineError::Resolver(format!("{:#}", e)))?;

        extract_json_object(&completion)
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::ResolverParse(format!(
                    "no JSON object in template completion: {}",
                    completion.trim()
                ))
            })
    }
}
