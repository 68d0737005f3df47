use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use uuid::Uuid;

use crate::classifier::{Completeness, classify, is_truthy};
use crate::disambiguator::disambiguate;
use crate::error::{PipelineError, PipelineResult};
use crate::event_bus::{Event, EventBus};
use crate::extractor::{Extractor, Pair, QUERY_INTENT};
use crate::invoker::ApiInvoker;
use crate::llm_manager::LLMManager;
use crate::normalizer::normalize;
use crate::reconciler::{ENDPOINT_URL, PAYLOAD, PayloadTemplate, reconcile};
use crate::status::{STATUS_KEY, TaskStatus, resolve_status};
use crate::summarizer::Summarizer;
use crate::template_store::TemplateRetriever;

/// Everything a caller gets back for one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub request_id: String,
    pub query_intent: String,
    pub status: TaskStatus,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// The template after reconciliation, `endpoint_url` included.
    pub reconciled_template: Value,
    pub external_api_response: Option<Value>,
    pub missing_keys: Vec<String>,
    pub populated_keys: Vec<String>,
    pub empty_keys: Vec<String>,
    pub summary: Option<Map<String, Value>>,
}

/// Runs one query from free text to (maybe) an external call.
///
/// All collaborators are created once at startup and only read here, so a
/// single pipeline can serve any number of concurrent requests.
pub struct QueryPipeline {
    llm: Arc<LLMManager>,
    retriever: Arc<dyn TemplateRetriever>,
    invoker: Arc<dyn ApiInvoker>,
    create_task_url: String,
    extractor: Extractor,
    summarizer: Summarizer,
    event_bus: Option<Arc<EventBus>>,
}

impl QueryPipeline {
    pub fn new(
        llm: Arc<LLMManager>,
        retriever: Arc<dyn TemplateRetriever>,
        invoker: Arc<dyn ApiInvoker>,
        create_task_url: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            retriever,
            invoker,
            create_task_url: create_task_url.into(),
            extractor: Extractor::new(),
            summarizer: Summarizer::new(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    async fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(event).await;
        }
    }

    /// Process a query. Resolver, retriever and template failures fail the
    /// whole request; nothing partial is returned.
    pub async fn process(&self, query: &str) -> PipelineResult<QueryOutcome> {
        let request_id = Uuid::new_v4().to_string();
        self.emit(Event::QueryReceived {
            request_id: request_id.clone(),
            query: query.to_string(),
        })
        .await;

        match self.run(&request_id, query).await {
            Ok(outcome) => {
                self.emit(Event::RequestCompleted {
                    request_id,
                    status: outcome.status.to_string(),
                    external_call_made: outcome.external_api_response.is_some(),
                })
                .await;
                Ok(outcome)
            }
            Err(e) => {
                error!("[{}] Request failed: {}", request_id, e);
                self.emit(Event::RequestFailed {
                    request_id,
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    async fn run(&self, request_id: &str, query: &str) -> PipelineResult<QueryOutcome> {
        let extraction = self.extractor.extract(query, &self.llm).await?;
        let pairs = normalize(disambiguate(
            extraction.pairs.clone(),
            &extraction.query.to_lowercase(),
        ));
        let query_intent = first_intent(&pairs).unwrap_or(extraction.query_intent()).to_string();
        info!("[{}] Intent: {}", request_id, query_intent);
        debug!("[{}] Details: {}", request_id, extraction.details);
        self.emit(Event::PairsExtracted {
            request_id: request_id.to_string(),
            intent: query_intent.clone(),
            pair_count: pairs.len(),
        })
        .await;

        let template_json = self.retriever.retrieve_template(&query_intent).await?;
        let template = PayloadTemplate::parse(&template_json)?;
        self.emit(Event::TemplateRetrieved {
            request_id: request_id.to_string(),
            endpoint_url: template.endpoint_url().map(str::to_string),
        })
        .await;

        let reconciliation = reconcile(template, &pairs);
        let mut template = reconciliation.template;
        let missing_keys = reconciliation.missing_keys;

        let decision = resolve_status(&pairs);
        for warning in &decision.warnings {
            warn!("[{}] {}", request_id, warning);
        }
        template.set_payload_field(STATUS_KEY, json!(decision.status.as_str()));

        let payload = template.payload();
        let completeness = classify(&payload);
        self.emit(Event::PayloadReconciled {
            request_id: request_id.to_string(),
            missing_keys: missing_keys.clone(),
            empty_keys: completeness.empty.clone(),
        })
        .await;

        let external_api_response = self
            .call_external(request_id, &template, payload, &completeness)
            .await?;

        let summary = match &external_api_response {
            Some(response) if is_truthy(response) => {
                let summary = self.summarizer.summarize(response, &self.llm).await?;
                self.emit(Event::SummaryProduced {
                    request_id: request_id.to_string(),
                    fallback: summary.fallback,
                })
                .await;
                Some(summary.fields)
            }
            _ => None,
        };

        let mut warnings = decision.warnings;
        if !missing_keys.is_empty() {
            warnings.push(format!("Missing keys in payload: {}", missing_keys.join(", ")));
        }

        Ok(QueryOutcome {
            request_id: request_id.to_string(),
            query_intent,
            status: decision.status,
            warnings,
            errors: Vec::new(),
            reconciled_template: template.to_value(),
            external_api_response,
            missing_keys,
            populated_keys: completeness.populated,
            empty_keys: completeness.empty,
            summary,
        })
    }

    /// Call the external API only when every payload field has a value.
    async fn call_external(
        &self,
        request_id: &str,
        template: &PayloadTemplate,
        payload: Map<String, Value>,
        completeness: &Completeness,
    ) -> PipelineResult<Option<Value>> {
        if !completeness.is_complete() {
            info!(
                "[{}] Skipping external call, empty fields: {}",
                request_id,
                completeness.empty.join(", ")
            );
            self.emit(Event::ExternalCallSkipped {
                request_id: request_id.to_string(),
                empty_keys: completeness.empty.clone(),
            })
            .await;
            return Ok(None);
        }

        let endpoint_url = match (template.endpoint_url(), payload.is_empty()) {
            (Some(url), false) => url,
            (url, payload_empty) => {
                let mut absent = Vec::new();
                if url.is_none() {
                    absent.push(ENDPOINT_URL.to_string());
                }
                if payload_empty {
                    absent.push(PAYLOAD.to_string());
                }
                return Err(PipelineError::MissingTemplateFields(absent));
            }
        };

        let payload = Value::Object(payload);
        let response = if endpoint_url == self.create_task_url {
            info!("[{}] Creating task via {}", request_id, endpoint_url);
            self.invoker.create_task(endpoint_url, &payload).await
        } else {
            info!("[{}] Calling {}", request_id, endpoint_url);
            self.invoker.invoke(endpoint_url, &payload).await
        };

        self.emit(Event::ExternalCallCompleted {
            request_id: request_id.to_string(),
            endpoint_url: endpoint_url.to_string(),
            failed: response.get("error").is_some(),
        })
        .await;
        Ok(Some(response))
    }
}

fn first_intent(pairs: &[Pair]) -> Option<&str> {
    pairs
        .iter()
        .find(|p| p.key == QUERY_INTENT)
        .map(|p| p.value.as_str())
}
