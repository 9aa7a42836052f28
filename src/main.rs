use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use trial_outreach::app::ports::MessageGenerator;
use trial_outreach::config::{Config, GeneratorKind};
use trial_outreach::export::persist_to_json;
use trial_outreach::infra::{ChatCompletionGenerator, HttpRegistryClient, SqliteLedger, TemplateGenerator};
use trial_outreach::pipeline::ingestion::{Interrupt, PaginatedFetcher, RateLimiter};
use trial_outreach::pipeline::{Pipeline, RecordPreview, RunSummary};
use trial_outreach::storage::{ContactLedger, InMemoryLedger};
use trial_outreach::{logging, metrics};

#[derive(Parser)]
#[command(name = "trial_outreach")]
#[command(about = "Clinical trial registry ingestion and deduplicated outreach")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to ./trial_outreach.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct QueryArgs {
    /// Condition keyword sent to the registry; repeat for several (overrides config)
    #[arg(long = "query")]
    queries: Vec<String>,
    /// Stop after this many studies
    #[arg(long)]
    limit: Option<usize>,
    /// Registry fields to request, comma-separated (overrides config)
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, score, dedup and generate outreach messages once
    Run {
        #[command(flatten)]
        query: QueryArgs,
        /// Use the template generator and an in-memory ledger; nothing is persisted
        #[arg(long)]
        dry_run: bool,
    },
    /// Fetch and print scored contacts without generating or recording anything
    Contacts {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Inspect the contact ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
    /// Run the pipeline repeatedly, one pass at a time
    Watch {
        #[command(flatten)]
        query: QueryArgs,
        /// Seconds between the end of one pass and the start of the next
        #[arg(long, default_value_t = 86_400)]
        every_secs: u64,
        /// Serve Prometheus metrics on this port
        #[arg(long)]
        metrics_port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// List every recorded contact
    List,
    /// Check whether a (record, email) pair was already contacted
    Check {
        #[arg(long)]
        record: String,
        #[arg(long)]
        email: String,
    },
}

fn build_pipeline(
    config: &Config,
    ledger: Arc<dyn ContactLedger>,
    force_template: bool,
) -> anyhow::Result<Pipeline> {
    let client = HttpRegistryClient::new(
        &config.registry.base_url,
        Duration::from_secs(config.registry.timeout_seconds),
    )?;
    let fetcher = PaginatedFetcher::new(
        Arc::new(client),
        RateLimiter::new(config.registry.calls_per_second),
        config.registry.page_size,
    );

    let generator: Arc<dyn MessageGenerator> = match config.generator.kind {
        GeneratorKind::Chat if !force_template => {
            Arc::new(ChatCompletionGenerator::from_config(&config.generator)?)
        }
        _ => Arc::new(TemplateGenerator::new(&config.generator.sender_signature)),
    };

    Ok(Pipeline::new(fetcher, ledger, generator).with_min_body_chars(config.generator.min_body_chars))
}

fn open_ledger(config: &Config) -> anyhow::Result<Arc<dyn ContactLedger>> {
    let ledger = SqliteLedger::open(&config.ledger.path)
        .with_context(|| format!("opening ledger at {}", config.ledger.path.display()))?;
    Ok(Arc::new(ledger))
}

fn resolve_queries(config: &Config, args: &QueryArgs) -> (Vec<String>, Vec<String>) {
    let given: Vec<String> = args
        .queries
        .iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    let queries = if given.is_empty() {
        config.registry.queries.clone()
    } else {
        given
    };
    let fields = args
        .fields
        .clone()
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| config.registry.fields.clone());
    (queries, fields)
}

fn report(summary: &RunSummary, config: &Config) -> anyhow::Result<()> {
    println!("\n📊 Outreach run {} for '{}':", summary.run_id, summary.query);
    println!("   Records fetched: {}", summary.records_fetched);
    println!("   Records processed: {}", summary.records_processed);
    println!("   Malformed records skipped: {}", summary.records_skipped);
    println!("   Contacts extracted: {}", summary.contacts_extracted);
    println!("   Contacts qualified: {}", summary.contacts_qualified);
    println!("   Already contacted: {}", summary.duplicates_skipped);
    println!("   Messages generated: {}", summary.generated);
    println!("   Generation failures: {}", summary.generation_failures);
    if summary.interrupted {
        println!("   ⚠️  Fetch was interrupted; results are partial");
    }

    if !summary.messages.is_empty() {
        let path = persist_to_json(
            &summary.messages,
            &format!("{}_outreach", summary.query),
            &config.output.dir,
        )?;
        println!("   Output file: {}", path.display());
    }
    if !summary.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("   - {}", error);
        }
    }
    Ok(())
}

fn print_previews(previews: &[RecordPreview]) {
    for preview in previews {
        println!(
            "\n{} - {}",
            preview.record.nct_id,
            preview.record.brief_title.as_deref().unwrap_or("N/A")
        );
        if preview.contacts.is_empty() {
            println!("   (no outreach-worthy contacts)");
        }
        for evaluated in &preview.contacts {
            let contact = &evaluated.contact;
            println!(
                "   [{}] {}: {} <{}> {}",
                evaluated.priority,
                contact.kind(),
                contact.name(),
                contact.email_or_sentinel(),
                evaluated.rationale.join("; ")
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    let interrupt = Interrupt::new();
    interrupt.listen_for_ctrl_c();

    match cli.command {
        Commands::Run { query, dry_run } => {
            let (queries, fields) = resolve_queries(&config, &query);
            let ledger: Arc<dyn ContactLedger> = if dry_run {
                Arc::new(InMemoryLedger::new())
            } else {
                open_ledger(&config)?
            };
            let pipeline = build_pipeline(&config, ledger, dry_run)?;
            // One pass per keyword, in order, so the ledger sees earlier keywords' contacts
            for q in &queries {
                let summary = pipeline.run(q, &fields, query.limit, &interrupt).await?;
                report(&summary, &config)?;
                if summary.interrupted {
                    warn!("Interrupted, skipping remaining keywords");
                    break;
                }
            }
        }
        Commands::Contacts { query } => {
            let (queries, fields) = resolve_queries(&config, &query);
            let pipeline = build_pipeline(&config, Arc::new(InMemoryLedger::new()), true)?;
            for q in &queries {
                if interrupt.is_triggered() {
                    break;
                }
                println!("\n🔎 {}", q);
                let previews = pipeline.preview(q, &fields, query.limit, &interrupt).await?;
                print_previews(&previews);
                let path = persist_to_json(&previews, &format!("{q}_contacts"), &config.output.dir)?;
                println!("\nContact information saved to {}", path.display());
            }
        }
        Commands::Ledger { action } => {
            let ledger = open_ledger(&config)?;
            match action {
                LedgerAction::List => {
                    let entries = ledger.entries().await?;
                    for entry in &entries {
                        println!(
                            "{}  {}  {}  run={}",
                            entry.contacted_at.to_rfc3339(),
                            entry.record_id,
                            entry.contact_email,
                            entry.run_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into())
                        );
                    }
                    println!("{} ledger entries", entries.len());
                }
                LedgerAction::Check { record, email } => {
                    let contacted = ledger.was_contacted(&record, &email.to_lowercase()).await?;
                    println!(
                        "{} / {}: {}",
                        record,
                        email,
                        if contacted { "already contacted" } else { "not contacted" }
                    );
                }
            }
        }
        Commands::Watch {
            query,
            every_secs,
            metrics_port,
        } => {
            if let Some(port) = metrics_port {
                metrics::init_metrics(port);
            }
            let (queries, fields) = resolve_queries(&config, &query);
            let pipeline = build_pipeline(&config, open_ledger(&config)?, false)?;
            loop {
                for q in &queries {
                    if interrupt.is_triggered() {
                        break;
                    }
                    match pipeline.run(q, &fields, query.limit, &interrupt).await {
                        Ok(summary) => report(&summary, &config)?,
                        // Fetch errors end this keyword only; the next pass retries
                        Err(e) => error!("Outreach pass for '{}' failed: {}", q, e),
                    }
                }
                if interrupt.is_triggered() {
                    warn!("Interrupted, leaving watch loop");
                    break;
                }
                info!("Next pass in {}s", every_secs);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(every_secs)) => {}
                    _ = tokio::signal::ctrl_c() => {
                        warn!("Interrupted while idle, leaving watch loop");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
