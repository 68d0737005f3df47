use anyhow::{Result, bail};
use colored::*;
use serde_json::Value;

use crate::pipeline::QueryOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Plain,
}

impl OutputFormat {
    pub fn parse(format: &str) -> Result<Self> {
        match format.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "plain" | "text" => Ok(OutputFormat::Plain),
            other => bail!("Unknown output format '{}' (expected json or plain)", other),
        }
    }
}

pub fn render(outcome: &QueryOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
        OutputFormat::Plain => Ok(render_plain(outcome)),
    }
}

fn render_plain(outcome: &QueryOutcome) -> String {
    let rule = "=".repeat(60).bright_blue().to_string();
    let mut lines = vec![
        rule.clone(),
        format!("{} {}", "Intent:".cyan().bold(), outcome.query_intent),
        rule,
        format!("Status: {}", outcome.status.to_string().bright_green()),
    ];

    if let Some(url) = outcome
        .reconciled_template
        .get("endpoint_url")
        .and_then(Value::as_str)
    {
        lines.push(format!("Endpoint: {}", url));
    }
    if !outcome.populated_keys.is_empty() {
        lines.push(format!("Filled: {}", outcome.populated_keys.join(", ")));
    }
    if !outcome.empty_keys.is_empty() {
        lines.push(format!(
            "Empty: {}",
            outcome.empty_keys.join(", ").bright_yellow()
        ));
    }
    for warning in &outcome.warnings {
        lines.push(format!("{} {}", "⚠ Warning:".yellow().bold(), warning));
    }

    match &outcome.external_api_response {
        Some(response) if response.get("error").is_some() => {
            lines.push(format!("{} {}", "✗ API:".red().bold(), response));
        }
        Some(response) => lines.push(format!("{} {}", "✓ API:".green().bold(), response)),
        None => lines.push(format!("{}", "API call skipped (empty fields)".dimmed())),
    }

    if let Some(summary) = &outcome.summary {
        match summary.get("summary").and_then(Value::as_str) {
            Some(text) => lines.push(format!("Summary: {}", text)),
            None => lines.push(format!("Summary: {}", Value::Object(summary.clone()))),
        }
    }

    lines.join("\n")
}
