//! Standalone daemon entry point.
//!
//! Loads configuration from the environment, installs the rule document,
//! and keeps the engine resident until interrupted. Embedding applications
//! use the library API instead.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rag_policy_engine::{Config, PolicyEngine, RuleSetDocument};

#[derive(Parser, Debug)]
#[command(name = "rag-policy-engine", version, about = "RAG policy decision engine daemon")]
struct Args {
    /// Rule document to load (YAML or JSON)
    #[arg(long, env = "RAG_POLICY_RULES")]
    rules: Option<PathBuf>,

    /// Skip installing the built-in prompt firewall catalog
    #[arg(long)]
    no_default_firewall: bool,

    /// Log filter, e.g. "info" or "rag_policy_engine=debug"
    #[arg(long, env = "RAG_POLICY_LOG", default_value = "info")]
    log: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> rag_policy_engine::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let config = Config::from_env()?;
    let mut builder = PolicyEngine::builder().config(config);
    if !args.no_default_firewall {
        builder = builder.with_default_firewall_rules();
    }
    if let Some(path) = &args.rules {
        info!(path = %path.display(), "loading rule document");
        builder = builder.document(RuleSetDocument::from_file(path)?);
    }
    let engine = builder.build()?;

    info!(
        version = rag_policy_engine::VERSION,
        canaries = engine.list_canaries(None).len(),
        "engine started"
    );

    tokio::signal::ctrl_c().await?;
    let metrics = engine.metrics();
    info!(
        allowed = metrics.allowed,
        denied = metrics.denied,
        redacted = metrics.redacted,
        refused = metrics.refused,
        canary_triggers = metrics.canary_triggers,
        "shutting down"
    );
    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_new(&args.log).unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
