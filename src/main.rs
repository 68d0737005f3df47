use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::sync::Arc;

mod classifier;
mod config;
mod disambiguator;
mod error;
mod event_bus;
mod extractor;
mod invoker;
mod llm_manager;
mod logger;
mod normalizer;
mod output;
mod pair_scanner;
mod pipeline;
mod providers;
mod reconciler;
mod status;
mod summarizer;
mod template_store;

use config::Config;
use event_bus::{EventBus, EventEmitter};
use invoker::HttpInvoker;
use llm_manager::LLMManager;
use output::OutputFormat;
use pipeline::QueryPipeline;
use providers::GroqProvider;
use template_store::{DocumentStore, DocumentTemplateRetriever};

#[derive(Parser)]
#[command(name = "intent_bridge")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<String>,
    /// Endpoint document used for template retrieval
    #[arg(short, long)]
    documents: Option<String>,
    /// Output format (json or plain)
    #[arg(short, long)]
    format: Option<String>,
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
    /// Natural language query
    #[arg(last = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();
    logger::init(args.verbose);

    let mut config = Config::load(&args.config)?;
    config.merge_with_args(args.documents, args.format);
    let format = OutputFormat::parse(&config.output.format)?;

    let query = args.command.join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("No query given. Usage: intent_bridge [OPTIONS] -- <query>");
    }

    let event_bus = Arc::new(EventBus::new(256));

    let provider = GroqProvider::from_config(&config.resolver)?;
    let mut llm_manager = LLMManager::new(vec![Box::new(provider)]);
    llm_manager.set_event_bus(event_bus.clone());
    info!(
        "Using resolver provider: {}",
        llm_manager.provider_name().unwrap_or("none")
    );
    let llm_manager = Arc::new(llm_manager);

    let store = DocumentStore::load(
        &config.templates.documents,
        config.templates.chunk_size,
        config.templates.chunk_overlap,
    )?;
    if store.is_empty() {
        warn!("{} has no content, template retrieval will fail", config.templates.documents);
    }
    let retriever = Arc::new(DocumentTemplateRetriever::new(store, llm_manager.clone()));
    let invoker = Arc::new(HttpInvoker::from_config(&config.invoker));

    let pipeline = QueryPipeline::new(
        llm_manager,
        retriever,
        invoker,
        config.invoker.create_task_url.clone(),
    )
    .with_event_bus(event_bus.clone());

    let outcome = pipeline
        .process(&query)
        .await
        .context("Failed to process query")?;
    println!("{}", output::render(&outcome, format)?);

    let metrics = event_bus.get_metrics().await;
    info!(
        "Resolver calls: {} ({} failed), external calls: {} ({} failed), skipped: {}",
        metrics.resolver_calls,
        metrics.resolver_errors,
        metrics.external_calls,
        metrics.external_failures,
        metrics.skipped_calls
    );
    Ok(())
}
