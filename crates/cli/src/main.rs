mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use capability::{Registry, cloud_registry};
use clap::{Parser, Subcommand};
use runtime::{
    Agent, Executor, GeminiBackend, ResponseEnvelope, ToolCall, ToolCallTrace, ToolHost,
    ToolOutcome,
};
use sources::{
    BigQueryBilling, BillingSource, CloudMetrics, CloudRecommender, GcpClient, MetricsSource,
    MtdCost, RecommendationSource,
};
use tracing::debug;

use config::Config;
use error::{Error, Result};

#[derive(Parser)]
#[command(name = "cloudlens")]
#[command(about = "Ask questions about Google Cloud spend and fleet health", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./cloudlens.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Print the response envelope as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the capabilities the model can call
    Tools,
    /// Run one capability directly
    Call {
        /// Capability name, e.g. get_daily_cost_trend
        name: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// Print a cost and health report
    Report {
        /// Trailing window for the trend and top services
        #[arg(short, long, default_value_t = 7)]
        days: u32,
        /// How many savings recommendations to list
        #[arg(short, long, default_value_t = 5)]
        recommendations: u32,
    },
}

/// Data sources wired to one GCP client.
struct Cloud {
    billing: Arc<BigQueryBilling>,
    metrics: Arc<CloudMetrics>,
    recommender: CloudRecommender,
}

impl Cloud {
    fn new(config: &Config) -> Self {
        let client = Arc::new(GcpClient::new(config.gcp.project.clone(), config.gcp_auth()));
        debug!(%client, "gcp client ready");
        Self {
            billing: Arc::new(BigQueryBilling::new(Arc::clone(&client))),
            metrics: Arc::new(CloudMetrics::new(Arc::clone(&client))),
            recommender: CloudRecommender::new(client),
        }
    }

    fn registry(&self) -> Result<Registry> {
        Ok(cloud_registry(
            Arc::clone(&self.billing),
            Arc::clone(&self.metrics),
        )?)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::discover(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Ask { query, json }) => cmd_ask(&config, &query.join(" "), json).await,
        Some(Commands::Tools) => cmd_tools(&config),
        Some(Commands::Call { name, args }) => cmd_call(&config, name, &args).await,
        Some(Commands::Report {
            days,
            recommendations,
        }) => cmd_report(&config, days, recommendations).await,
    }
}

fn executor(config: &Config, cloud: &Cloud) -> Result<Executor> {
    Ok(Executor::new(Arc::new(cloud.registry()?)).with_timeout(config.tool_timeout()))
}

fn build_agent(config: &Config) -> Result<Agent<GeminiBackend, Executor>> {
    config.gcp.project.validate()?;

    let mut builder = GeminiBackend::builder(config.api_key()?).model(&config.model.model);
    if let Some(url) = &config.model.base_url {
        builder = builder.base_url(url);
    }
    if let Some(temperature) = config.model.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(tokens) = config.model.max_output_tokens {
        builder = builder.max_output_tokens(tokens);
    }

    let cloud = Cloud::new(config);
    Ok(Agent::with_config(
        builder.build(),
        executor(config, &cloud)?,
        config.agent_config(),
    ))
}

async fn cmd_chat(config: &Config) -> Result<()> {
    println!("cloudlens v{}", env!("CARGO_PKG_VERSION"));

    let agent = build_agent(config)?;
    println!("Project: {}", config.gcp.project.project_id);
    println!("Model: {}", config.model.model);
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match agent.handle_chat(input).await {
            Ok(envelope) => print_envelope(&envelope),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    println!("\nBye.");
    Ok(())
}

async fn cmd_ask(config: &Config, query: &str, json: bool) -> Result<()> {
    let agent = build_agent(config)?;
    let envelope = agent.handle_chat(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        print_envelope(&envelope);
    }
    Ok(())
}

fn cmd_tools(config: &Config) -> Result<()> {
    let registry = Cloud::new(config).registry()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&registry.schema_for_model())?
    );
    Ok(())
}

async fn cmd_call(config: &Config, name: String, args: &str) -> Result<()> {
    config.gcp.project.validate()?;
    let input: serde_json::Value =
        serde_json::from_str(args).map_err(|e| Error::InvalidArgs(e.to_string()))?;
    if !input.is_object() {
        return Err(Error::InvalidArgs("expected a JSON object".into()));
    }

    let executor = executor(config, &Cloud::new(config))?;
    let execution = executor
        .execute(&ToolCall {
            id: "cli".into(),
            name,
            input,
            signature: None,
        })
        .await;

    eprintln!("args: {}", execution.arguments);
    match execution.outcome {
        ToolOutcome::Success { output } => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        ToolOutcome::Error { message } => Err(Error::CallFailed {
            name: execution.name,
            message,
        }),
    }
}

async fn cmd_report(config: &Config, days: u32, recommendations: u32) -> Result<()> {
    config.gcp.project.validate()?;
    let cloud = Cloud::new(config);

    let mtd = cloud.billing.mtd_costs().await?;
    println!("=== Google Cloud ({}) ===", config.gcp.project.project_id);
    println!("Month-to-date total: ${:.2}", MtdCost::total(&mtd));

    let top = cloud.billing.top_services(days, 5).await?;
    println!("\nTop services, last {days} days:");
    if top.is_empty() {
        println!("  (no billing data)");
    }
    for row in &top {
        println!("  {:<40} ${:>10.2}", row.service, row.cost);
    }

    let trend = cloud.billing.daily_cost_trend(days).await?;
    println!("\nDaily spend:");
    for row in &trend {
        println!("  {}  ${:>10.2}", row.day, row.daily_cost);
    }

    println!("\nFleet health:");
    match cloud.metrics.tiles_summary().await {
        Ok(tiles) => {
            println!("  CPU average:      {:.1}%", tiles.overall_cpu_avg);
            println!("  Network egress:   {:.1} Mbps", tiles.overall_network_mbps);
            if let Some(count) = tiles.active_instances {
                println!("  Active instances: {count}");
            }
            if let Some(pct) = tiles.unlabeled_assets_pct {
                println!("  Unlabeled assets: {pct:.1}%");
            }
            if let Some(at) = &tiles.updated_at {
                println!("  Updated:          {at}");
            }
        }
        Err(e) => println!("  unavailable: {e}"),
    }

    let recs = cloud.recommender.recommendations(recommendations).await?;
    println!("\nRecommendations:");
    if recs.is_empty() {
        println!("  (none)");
    }
    for rec in &recs {
        println!("  ${:>9.2}/mo  {}", rec.est_savings_monthly, rec.description);
        if let Some(resource) = &rec.resource {
            println!("{:17}{resource}", "");
        }
    }
    Ok(())
}

fn print_envelope(envelope: &ResponseEnvelope) {
    println!("\n{}\n", envelope.text);
    if envelope.calls.is_empty() {
        return;
    }
    println!("Tools used:");
    for trace in &envelope.calls {
        print_trace(trace);
    }
    println!();
}

fn print_trace(trace: &ToolCallTrace) {
    let status = if trace.ok { "ok" } else { "failed" };
    match &trace.error {
        Some(error) => println!("  [{status}] {} {} ({error})", trace.name, trace.args),
        None => println!("  [{status}] {} {}", trace.name, trace.args),
    }
}
