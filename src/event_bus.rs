use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Events emitted while a query moves through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Request lifecycle
    QueryReceived {
        request_id: String,
        query: String,
    },
    RequestCompleted {
        request_id: String,
        status: String,
        external_call_made: bool,
    },
    RequestFailed {
        request_id: String,
        kind: String,
        error: String,
    },

    // Intent resolver
    ResolverCallStarted {
        provider: String,
        model: String,
    },
    ResolverCallCompleted {
        provider: String,
        prompt_chars: usize,
        completion_chars: usize,
    },
    ResolverCallFailed {
        provider: String,
        error: String,
    },

    // Extraction and reconciliation
    PairsExtracted {
        request_id: String,
        intent: String,
        pair_count: usize,
    },
    TemplateRetrieved {
        request_id: String,
        endpoint_url: Option<String>,
    },
    PayloadReconciled {
        request_id: String,
        missing_keys: Vec<String>,
        empty_keys: Vec<String>,
    },

    // External API
    ExternalCallSkipped {
        request_id: String,
        empty_keys: Vec<String>,
    },
    ExternalCallCompleted {
        request_id: String,
        endpoint_url: String,
        failed: bool,
    },
    SummaryProduced {
        request_id: String,
        fallback: bool,
    },
}

/// Event bus for component communication
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    metrics: Arc<RwLock<Metrics>>,
}

/// Accumulated metrics from events
#[derive(Debug, Default, Clone)]
pub struct Metrics {
    pub requests: usize,
    pub failed_requests: usize,
    pub resolver_calls: usize,
    pub resolver_errors: usize,
    pub external_calls: usize,
    pub external_failures: usize,
    pub skipped_calls: usize,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            metrics: Arc::new(RwLock::new(Metrics::default())),
        }
    }

    /// Subscribe to events
    #[allow(dead_code)]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    pub async fn emit(&self, event: Event) -> Result<()> {
        self.update_metrics(&event).await;

        // no receivers is fine
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Get current metrics
    pub async fn get_metrics(&self) -> Metrics {
        self.metrics.read().await.clone()
    }

    async fn update_metrics(&self, event: &Event) {
        let mut metrics = self.metrics.write().await;

        match event {
            Event::QueryReceived { .. } => metrics.requests += 1,
            Event::RequestFailed { .. } => metrics.failed_requests += 1,
            Event::ResolverCallCompleted { .. } => metrics.resolver_calls += 1,
            Event::ResolverCallFailed { .. } => {
                metrics.resolver_calls += 1;
                metrics.resolver_errors += 1;
            }
            Event::ExternalCallSkipped { .. } => metrics.skipped_calls += 1,
            Event::ExternalCallCompleted { failed, .. } => {
                metrics.external_calls += 1;
                if *failed {
                    metrics.external_failures += 1;
                }
            }
            _ => {}
        }
    }
}

/// Trait for components that can emit events
#[async_trait::async_trait]
pub trait EventEmitter {
    fn set_event_bus(&mut self, bus: Arc<EventBus>);

    async fn emit_event(&self, event: Event) -> Result<()>;
}

/// Helper macro to implement EventEmitter trait
#[macro_export]
macro_rules! impl_event_emitter {
    ($type:ty) => {
        #[async_trait::async_trait]
        impl EventEmitter for $type {
            fn set_event_bus(&mut self, bus: Arc<EventBus>) {
                self.event_bus = Some(bus);
            }

            async fn emit_event(&self, event: Event) -> anyhow::Result<()> {
                if let Some(bus) = &self.event_bus {
                    bus.emit(event).await
                } else {
                    Ok(())
                }
            }
        }
    };
}
