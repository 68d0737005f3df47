use async_trait::async_trait;
use log::{info, warn};
use serde_json::{Map, Value, json};
use std::env;

use crate::config::InvokerConfig;

/// Calls the external task-management API.
///
/// Never fails: transport and HTTP errors come back as an error object
/// (`{"error": ..., "status_code"?: ..., "response"?|"message"?: ...}`).
#[async_trait]
pub trait ApiInvoker: Send + Sync {
    async fn invoke(&self, endpoint_url: &str, payload: &Value) -> Value;

    /// Dedicated path for the create-task endpoint.
    async fn create_task(&self, endpoint_url: &str, payload: &Value) -> Value {
        self.invoke(endpoint_url, payload).await
    }
}

pub fn invalid_payload() -> Value {
    json!({"error": "Invalid payload", "message": "Payload must be a dictionary."})
}

pub fn call_failed(status_code: u16, body: &str) -> Value {
    json!({"error": "API call failed", "status_code": status_code, "response": body})
}

pub fn exception(message: impl std::fmt::Display) -> Value {
    json!({"error": "Exception occurred", "message": message.to_string()})
}

/// Stringify every payload value for form encoding. Null and booleans are
/// spelled `None`, `True` and `False`.
pub fn form_fields(payload: &Map<String, Value>) -> Vec<(String, String)> {
    payload
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => "None".to_string(),
                Value::Bool(true) => "True".to_string(),
                Value::Bool(false) => "False".to_string(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

enum Body<'a> {
    Form(&'a Map<String, Value>),
    Json(&'a Map<String, Value>),
}

/// reqwest-backed invoker using bearer-token auth.
pub struct HttpInvoker {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpInvoker {
    pub fn from_config(config: &InvokerConfig) -> Self {
        let bearer_token = env::var(&config.bearer_token_env).ok();
        if bearer_token.is_none() {
            warn!(
                "{} not set, external calls will be unauthenticated",
                config.bearer_token_env
            );
        }
        Self::new(bearer_token)
    }

    pub fn new(bearer_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bearer_token,
        }
    }

    async fn post(&self, endpoint_url: &str, body: Body<'_>) -> Value {
        info!("Sending API request to: {}", endpoint_url);

        let mut request = self.client.post(endpoint_url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        request = match body {
            Body::Form(payload) => request.form(&form_fields(payload)),
            Body::Json(payload) => request.json(payload),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("API call to {} failed: {}", endpoint_url, e);
                return exception(e);
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            warn!("API call failed with status code {}", status.as_u16());
            return call_failed(status.as_u16(), &text);
        }

        match response.json::<Value>().await {
            Ok(parsed) => {
                info!("API call successful");
                parsed
            }
            Err(e) => exception(e),
        }
    }
}

#[async_trait]
impl ApiInvoker for HttpInvoker {
    async fn invoke(&self, endpoint_url: &str, payload: &Value) -> Value {
        match payload.as_object() {
            Some(fields) => self.post(endpoint_url, Body::Form(fields)).await,
            None => invalid_payload(),
        }
    }

    async fn create_task(&self, endpoint_url: &str, payload: &Value) -> Value {
        match payload.as_object() {
            Some(fields) => self.post(endpoint_url, Body::Json(fields)).await,
            None => invalid_payload(),
        }
    }
}
