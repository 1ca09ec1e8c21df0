use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use policy_navigator::core::logging;
use policy_navigator::rag::Document;
use policy_navigator::{AppPaths, ConfigService, PolicyNavigator};

/// Answer policy questions from stored documents and regulatory sources.
#[derive(Parser)]
#[command(name = "policy-navigator", version, about)]
struct Cli {
    /// Print the configuration (secrets redacted) before running
    #[arg(long)]
    show_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify, retrieve, look up and answer a question
    Query {
        /// Question text
        text: Vec<String>,
    },
    /// Check whether a policy is still in effect
    Status {
        /// Policy identifier, e.g. "Executive Order 14008"
        identifier: Vec<String>,
    },
    /// Find court cases related to a regulation
    Cases {
        /// Regulation or topic
        term: Vec<String>,
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },
    /// List recent Federal Register documents
    Recent {
        /// Document type, e.g. RULE or PRORULE
        #[arg(short = 't', long)]
        doc_type: Option<String>,
        #[arg(short, long, default_value = "30")]
        days: u32,
    },
    /// Index one document from a text file
    Add {
        id: String,
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Index a JSON array of `{id, content, metadata}` documents
    Ingest { file: PathBuf },
    /// Show index and session statistics
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("fatal: {:#}", err);
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    let config_service = ConfigService::new(paths.clone());
    let raw_config = config_service
        .load_config()
        .with_context(|| format!("Failed to load {}", config_service.config_path().display()))?;
    let config = policy_navigator::core::config::service::parse_config(raw_config.clone())?;

    logging::init(&paths, &config.app.log_level);
    if cli.show_config {
        print_json(&config_service.redact_sensitive_values(&raw_config))?;
    }

    let mut navigator = PolicyNavigator::connect(&config, &paths)
        .await
        .context("Failed to start the policy navigator")?;

    match cli.command {
        Command::Query { text } => {
            let response = navigator.process_query(&text.join(" ")).await?;
            print_json(&PolicyNavigator::format_for_display(&response))?;
        }
        Command::Status { identifier } => {
            let response = navigator.check_policy_status(&identifier.join(" ")).await?;
            print_json(&PolicyNavigator::format_for_display(&response))?;
        }
        Command::Cases { term, limit } => {
            let response = navigator.search_cases(&term.join(" "), limit).await?;
            print_json(&PolicyNavigator::format_for_display(&response))?;
        }
        Command::Recent { doc_type, days } => {
            let result = navigator.recent_documents(doc_type.as_deref(), days).await?;
            print_json(&result)?;
        }
        Command::Add {
            id,
            file,
            title,
            source,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut metadata = BTreeMap::new();
            if let Some(title) = title {
                metadata.insert("title".to_string(), title.into());
            }
            if let Some(source) = source {
                metadata.insert("source".to_string(), source.into());
            }
            let stored = navigator.add_document(&id, &content, metadata).await?;
            println!("{}", if stored { "stored" } else { "not stored" });
        }
        Command::Ingest { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let documents: Vec<Document> =
                serde_json::from_str(&raw).context("Expected a JSON array of documents")?;
            print_json(&navigator.add_documents_batch(&documents).await)?;
        }
        Command::Stats => {
            print_json(&navigator.get_stats().await)?;
        }
    }

    Ok(())
}
