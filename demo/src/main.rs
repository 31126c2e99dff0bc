//! PREAUTH Prior Authorization Pipeline demo CLI
//!
//! Runs requests from the sample queue through the full pipeline: Sensing,
//! Planning, Orchestration over the six review tools, and Decision. All
//! members, claims, and requests are hardcoded and fictional.
//!
//! Usage:
//!   cargo run -p demo -- process PA-2026-0409
//!   cargo run -p demo -- run-all --fast
//!   cargo run -p demo -- tools
//!   cargo run -p demo -- stats --seed 42

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use preauth_config::{CoverageCatalog, PipelineConfig};
use preauth_contracts::{
    error::PreauthResult,
    progress::{PipelineEvent, TraceLevel},
    stage::DecisionOutput,
};
use preauth_core::{ChannelUpdates, PipelineProcessor};
use preauth_registry::ToolRegistry;
use preauth_store::InMemoryStore;
use preauth_tools::{register_default_tools, sample_requests, MockReferenceData, ToolContext};

// ── CLI definition ────────────────────────────────────────────────────────────

/// PREAUTH: prior authorization review pipeline demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "PREAUTH prior authorization pipeline demo",
    long_about = "Runs prior authorization requests through the Sensing, Planning,\n\
                  Orchestration, and Decision agents using mock member, claims,\n\
                  and coverage policy data."
)]
struct Cli {
    /// Pipeline configuration TOML. Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Coverage policy catalog TOML. The bundled catalog when omitted.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Seed for the pipeline's random source (overrides the config file).
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Skip the simulated backend latency.
    #[arg(long, global = true)]
    fast: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one request, streaming steps and traces as they happen.
    Process {
        /// Request id, e.g. PA-2026-0409.
        request_id: String,
    },
    /// Process every request in the sample queue.
    RunAll,
    /// List the registered tools and their required parameters.
    Tools,
    /// Process the sample queue quietly and print tool call statistics.
    Stats,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match Demo::build(&cli) {
        Ok(demo) => match cli.command {
            Command::Process { ref request_id } => demo.process(request_id).await,
            Command::RunAll => demo.run_all().await,
            Command::Tools => {
                demo.print_tools();
                Ok(())
            }
            Command::Stats => demo.stats().await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

struct Demo {
    store: InMemoryStore,
    registry: Arc<ToolRegistry>,
    processor: PipelineProcessor,
}

impl Demo {
    fn build(cli: &Cli) -> PreauthResult<Self> {
        let mut config = match &cli.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(seed) = cli.seed {
            config = config.with_seed(seed);
        }
        if cli.fast {
            config = config.without_latency();
        }

        let catalog = match &cli.catalog {
            Some(path) => CoverageCatalog::from_file(path)?,
            None => CoverageCatalog::bundled()?,
        };

        let registry = Arc::new(ToolRegistry::with_config(config.registry_config()));
        let ctx = ToolContext::from_config(
            &config,
            Arc::new(catalog),
            Arc::new(MockReferenceData::default()),
        );
        register_default_tools(&registry, &ctx)?;

        let store = InMemoryStore::with_requests(sample_requests());
        let processor = PipelineProcessor::new(
            registry.clone(),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            ctx.rng.clone(),
        )
        .with_sensing_rules(config.sensing_rules());

        Ok(Self {
            store,
            registry,
            processor,
        })
    }

    async fn process(&self, request_id: &str) -> PreauthResult<()> {
        if let Some(request) = self.store.request(request_id) {
            println!("=== {} ===", request.request_id);
            println!();
            println!("  Patient:    {} ({})", request.patient_name, request.member_id);
            println!("  Procedure:  {} {}", request.procedure_code, request.procedure_name);
            println!("  Diagnoses:  {}", request.diagnosis_codes.join(", "));
            println!("  Provider:   {}", request.provider);
            println!();
        }

        let (updates, rx) = ChannelUpdates::new();
        let printer = tokio::spawn(print_events(rx));
        let result = self
            .processor
            .process_with_updates(request_id, Arc::new(updates))
            .await;
        // The sender is gone once the run returns, so the printer drains and exits.
        if let Err(e) = printer.await {
            warn!(error = %e, "event printer stopped early");
        }

        let decision = result?;
        println!();
        print_decision(&decision);
        Ok(())
    }

    async fn run_all(&self) -> PreauthResult<()> {
        println!("=== Sample queue ===");
        println!();
        let mut failures = 0;
        for request in sample_requests() {
            match self.processor.process(&request.request_id).await {
                Ok(decision) => println!(
                    "  {:<13} {:<20} {:<12} {:<8} {:.2}",
                    request.request_id,
                    request.patient_name,
                    request.procedure_code,
                    decision.decision.as_str().to_uppercase(),
                    decision.confidence,
                ),
                Err(e) => {
                    failures += 1;
                    println!("  {:<13} FAILED: {}", request.request_id, e);
                }
            }
        }
        println!();
        println!(
            "  {} requests processed, {} failed.",
            sample_requests().len(),
            failures
        );
        println!();
        Ok(())
    }

    async fn stats(&self) -> PreauthResult<()> {
        for request in sample_requests() {
            if let Err(e) = self.processor.process(&request.request_id).await {
                warn!(request_id = %request.request_id, error = %e, "request failed");
            }
        }

        let stats = self.registry.stats();
        println!("=== Tool call statistics ===");
        println!();
        println!("  Registered tools: {}", stats.registered_tools);
        println!("  Total calls:      {}", stats.total_calls);
        match stats.success_rate {
            Some(rate) => println!("  Success rate:     {rate:.1}%"),
            None => println!("  Success rate:     n/a"),
        }
        println!();
        for (tool, calls) in &stats.calls_by_tool {
            println!("  {:<34} {}", tool, calls);
        }
        println!();
        Ok(())
    }

    fn print_tools(&self) {
        println!("=== Registered tools ===");
        println!();
        for tool in self.registry.list_tools() {
            let required: Vec<&str> = tool
                .input_schema
                .get("required")
                .and_then(|r| r.as_array())
                .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            println!("  {}", tool.name);
            println!("    {}", tool.description);
            println!("    required: {}", required.join(", "));
            println!();
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

async fn print_events(mut rx: UnboundedReceiver<PipelineEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::Status { status, .. } => {
                println!("  status -> {}", status.as_str());
            }
            PipelineEvent::Step(step) => {
                println!(
                    "  [{}] {} ({} ms)",
                    step.step_number, step.name, step.duration_ms
                );
                for detail in &step.details {
                    println!("        - {}", detail);
                }
            }
            PipelineEvent::Trace(trace) => {
                let marker = match trace.level {
                    TraceLevel::Info => " ",
                    TraceLevel::Success => "+",
                    TraceLevel::Warning => "!",
                    TraceLevel::Error => "x",
                };
                println!(
                    "    {} {} {:<18} {}",
                    marker, trace.timestamp, trace.category, trace.message
                );
            }
            PipelineEvent::Complete { .. } => {}
            PipelineEvent::Error { error, .. } => {
                println!("  ERROR: {}", error);
            }
        }
    }
}

fn print_decision(decision: &DecisionOutput) {
    println!("  Decision:    {}", decision.decision.as_str().to_uppercase());
    println!("  Confidence:  {:.2}", decision.confidence);
    println!("  Status:      {}", decision.status.as_str());
    println!(
        "  Criteria:    {}/{} met ({}%)",
        decision.scoring.criteria_met,
        decision.scoring.total_criteria,
        decision.scoring.match_percentage
    );
    if !decision.flags.is_empty() {
        println!("  Flags:       {}", decision.flags.join(", "));
    }
    println!("  Rationale:   {}", decision.rationale);
    println!();
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("PREAUTH — Prior Authorization Review Pipeline");
    println!("=============================================");
    println!();
    println!("Per request:");
    println!("  [1] Sensing       classify priority, document type, and complexity");
    println!("  [2] Planning      lay out the six tool calls in five phases");
    println!("  [3] Orchestration run the tools; eligibility and claims in parallel");
    println!("  [4] Decision      final determination, inactive coverage always denied");
    println!();
}
