use log::debug;
use serde_json::{Map, Value, json};

use crate::error::{PipelineError, PipelineResult};
use crate::llm_manager::LLMManager;

/// Summary of an external API response, as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub fields: Map<String, Value>,
    /// True when the completion was not a JSON object and got wrapped.
    pub fallback: bool,
}

/// Parse the summary completion, wrapping anything that is not a JSON
/// object as `{"summary": <raw text>}`.
pub fn parse_summary(completion: &str) -> Summary {
    match serde_json::from_str::<Value>(completion) {
        Ok(Value::Object(fields)) => Summary {
            fields,
            fallback: false,
        },
        _ => {
            let mut fields = Map::new();
            fields.insert("summary".to_string(), json!(completion));
            Summary {
                fields,
                fallback: true,
            }
        }
    }
}

pub struct Summarizer {
    summary_prompt_template: String,
}

impl Summarizer {
    pub fn new() -> Self {
        Self {
            summary_prompt_template: Self::default_summary_prompt(),
        }
    }

    pub async fn summarize(&self, api_response: &Value, llm: &LLMManager) -> PipelineResult<Summary> {
        let prompt = format!(
            "{}\n\n{}\n\nSummary:",
            self.summary_prompt_template, api_response
        );
        let completion = llm
            .send_prompt(&prompt)
            .await
            .map_err(|e| PipelineError::Resolver(format!("{:#}", e)))?;

        let summary = parse_summary(&completion);
        debug!("Summary parsed (fallback: {})", summary.fallback);
        Ok(summary)
    }

    fn default_summary_prompt() -> String {
        "Summarize the following API response in a short summary that still covers all key details:"
            .to_string()
    }
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new()
    }
}
