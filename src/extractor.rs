use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{PipelineError, PipelineResult};
use crate::llm_manager::LLMManager;
use crate::pair_scanner;

pub const QUERY_INTENT: &str = "query_intent";

/// Misspellings fixed before anything else looks at the query.
const KNOWN_TYPOS: &[(&str, &str)] = &[("categoriy", "category")];

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:and|with|,|;|or|the)\b").unwrap());

/// A single extracted fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Output of [`Extractor::extract`].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Query after typo correction.
    pub query: String,
    /// Free-text intent, never contains underscores.
    pub intent: String,
    pub details: String,
    /// Always non-empty values, with exactly one `query_intent` pair.
    pub pairs: Vec<Pair>,
}

impl Extraction {
    /// Value of the `query_intent` pair.
    pub fn query_intent(&self) -> &str {
        self.pairs
            .iter()
            .find(|p| p.key == QUERY_INTENT)
            .map(|p| p.value.as_str())
            .unwrap_or(&self.intent)
    }
}

pub fn fix_typos(query: &str) -> String {
    KNOWN_TYPOS
        .iter()
        .fold(query.to_string(), |q, (typo, fix)| q.replace(typo, fix))
}

/// Split on the first separator word. Returns `(intent, details)`, both
/// trimmed. Underscores in the intent are turned into spaces.
pub fn split_intent(query: &str) -> (String, String) {
    let (intent, details) = match SEPARATOR_RE.find(query) {
        Some(m) => (&query[..m.start()], &query[m.end()..]),
        None => (query, ""),
    };
    (intent.trim().replace('_', " "), details.trim().to_string())
}

/// Turn a raw completion into the final pair list.
///
/// Empty values are dropped, only the first `query_intent` survives, and
/// `intent` is put in front when the completion produced none.
pub fn pairs_from_completion(intent: &str, completion: &str) -> Vec<Pair> {
    let scanned = match pair_scanner::parse_pairs(completion) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!("{}", e);
            Vec::new()
        }
    };

    let mut seen_intent = false;
    let mut pairs: Vec<Pair> = scanned
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .filter(|(key, _)| {
            if key != QUERY_INTENT {
                return true;
            }
            !std::mem::replace(&mut seen_intent, true)
        })
        .map(|(key, value)| Pair::new(key, value))
        .collect();

    if !seen_intent {
        pairs.insert(0, Pair::new(QUERY_INTENT, intent));
    }
    pairs
}

pub struct Extractor {
    extraction_prompt_template: String,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            extraction_prompt_template: Self::default_extraction_prompt(),
        }
    }

    /// Extract the intent and pairs from `raw` using the resolver.
    pub async fn extract(&self, raw: &str, llm: &LLMManager) -> PipelineResult<Extraction> {
        let query = fix_typos(raw.trim());
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let (mut intent, details) = split_intent(&query);
        if intent.is_empty() {
            // query starts with a separator word
            intent = if details.is_empty() {
                query.replace('_', " ")
            } else {
                details.replace('_', " ")
            };
        }

        let prompt = self.build_extraction_prompt(&intent, &details);
        let completion = llm
            .send_prompt(&prompt)
            .await
            .map_err(|e| PipelineError::Resolver(format!("{:#}", e)))?;
        if completion.trim().is_empty() {
            return Err(PipelineError::ResolverParse(
                "empty completion for key-value extraction".to_string(),
            ));
        }

        let pairs = pairs_from_completion(&intent, completion.trim());
        info!("Extracted {} pair(s) for intent '{}'", pairs.len(), intent);

        Ok(Extraction {
            query,
            intent,
            details,
            pairs,
        })
    }

    fn build_extraction_prompt(&self, intent: &str, details: &str) -> String {
        format!(
            "{}\n\nQuery Intent: {}\nDetails: {}\n",
            self.extraction_prompt_template, intent, details
        )
    }

    fn default_extraction_prompt() -> String {
        r#"Extract key-value pairs from the following details. Keys use underscores between words.
Respond strictly in this format without deviation:

{
  "key_value_pairs": {
    "query_intent": "<intent>",
    "additional_keys": {<additional_key_value_pairs>},
    "requested_by": "<email>",
    "assigned_to": "<email>",
    "assigned_by": "<email>",
    "assigner_name": "<value>",
    "assignee_name": "<value>",
    "requestor_name": "<value>"
  }
}

Leave a field blank when its value is not given (e.g. "field1": "").
"query_intent" is the main request in free text, without underscores between words.
Put every other detail in additional key-value pairs and ignore filler words such as "is", "and", "are".
Keys must not start with an underscore unless the query says so (e.g. "_id")."#
            .to_string()
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_manager::testing::{ScriptedProvider, manager};

    fn intent_count(pairs: &[Pair]) -> usize {
        pairs.iter().filter(|p| p.key == QUERY_INTENT).count()
    }

    #[test]
    fn test_split_on_first_separator_word() {
        let (intent, details) =
            split_intent("Create task, assigned to bob@x.com, the status is closed");
        // a comma followed by a space is not on a word boundary
        assert_eq!(intent, "Create task, assigned to bob@x.com,");
        assert_eq!(details, "status is closed");

        let (intent, details) = split_intent("List open tasks with category Supplies");
        assert_eq!(intent, "List open tasks");
        assert_eq!(details, "category Supplies");
    }

    #[test]
    fn test_separator_must_be_a_whole_word() {
        let (intent, details) = split_intent("Show orders for brand");
        assert_eq!(intent, "Show orders for brand");
        assert_eq!(details, "");
    }

    #[test]
    fn test_intent_has_no_underscores() {
        let (intent, _) = split_intent("create_new_task and title is X");
        assert_eq!(intent, "create new task");
    }

    #[test]
    fn test_typo_correction() {
        assert_eq!(fix_typos("the categoriy is food"), "the category is food");
    }

    #[test]
    fn test_intent_is_synthesized_when_missing() {
        let pairs = pairs_from_completion("Create task", r#"{"title": "Fix bug", "status": ""}"#);
        assert_eq!(
            pairs,
            vec![Pair::new(QUERY_INTENT, "Create task"), Pair::new("title", "Fix bug")]
        );
    }

    #[test]
    fn test_only_first_intent_is_kept() {
        let completion = r#""query_intent": "create a task", "query_intent": "again""#;
        let pairs = pairs_from_completion("Create task", completion);
        assert_eq!(pairs, vec![Pair::new(QUERY_INTENT, "create a task")]);
    }

    #[test]
    fn test_blank_intent_in_completion_is_replaced() {
        let completion = r#"{"query_intent": "", "title": "X"}"#;
        let pairs = pairs_from_completion("Create task", completion);
        assert_eq!(intent_count(&pairs), 1);
        assert_eq!(pairs[0], Pair::new(QUERY_INTENT, "Create task"));
    }

    #[test]
    fn test_unparseable_completion_degrades_to_intent_only() {
        let pairs = pairs_from_completion("Create task", "I could not understand that.");
        assert_eq!(pairs, vec![Pair::new(QUERY_INTENT, "Create task")]);
    }

    #[tokio::test]
    async fn test_extract_uses_resolver_completion() {
        let provider = ScriptedProvider::new().reply(
            "Extract key-value pairs",
            r#"{"key_value_pairs": {"query_intent": "Create a task", "assigned_to": "bob@x.com", "status": "closed", "requested_by": ""}}"#,
        );
        let prompts = provider.prompts.clone();
        let llm = manager(provider);

        let extraction = Extractor::new()
            .extract("Create a task with categoriy Tools and status closed", &llm)
            .await
            .unwrap();

        assert_eq!(extraction.intent, "Create a task");
        assert_eq!(extraction.details, "category Tools and status closed");
        assert_eq!(extraction.query_intent(), "Create a task");
        assert_eq!(extraction.pairs.len(), 3);
        assert!(extraction.pairs.iter().all(|p| !p.value.is_empty()));

        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Query Intent: Create a task"));
        assert!(prompt.contains("Details: category Tools and status closed"));
    }

    #[tokio::test]
    async fn test_extract_rejects_blank_query() {
        let llm = manager(ScriptedProvider::new());
        let err = Extractor::new().extract("   ", &llm).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_resolver_failure_is_propagated() {
        let llm = manager(ScriptedProvider::new());
        let err = Extractor::new().extract("Create task", &llm).await.unwrap_err();
        assert!(matches!(err, PipelineError::Resolver(_)));
    }

    #[tokio::test]
    async fn test_empty_completion_is_a_parse_error() {
        let llm = manager(ScriptedProvider::new().reply("Extract", "  \n"));
        let err = Extractor::new().extract("Create task", &llm).await.unwrap_err();
        assert!(matches!(err, PipelineError::ResolverParse(_)));
    }

    #[tokio::test]
    async fn test_leading_separator_falls_back_to_details() {
        let llm = manager(ScriptedProvider::new().reply("Extract", "no pairs"));
        let extraction = Extractor::new().extract("and close ticket 7", &llm).await.unwrap();
        assert_eq!(extraction.intent, "close ticket 7");
        assert_eq!(extraction.pairs, vec![Pair::new(QUERY_INTENT, "close ticket 7")]);
    }
}
