//! iconagent - find a valid logo image for a brand
//!
#![doc = "Main entry point for the iconagent application."]

use std::process::ExitCode;
use std::sync::Arc;

use clap::CommandFactory;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use iconagent::agent::{extract, Agent};
use iconagent::cli::Cli;
use iconagent::config::Config;
use iconagent::prompts::build_goal;
use iconagent::providers::create_provider;
use iconagent::tools::ToolRegistryBuilder;

const EXIT_USAGE: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.json_logs, cli.verbose);

    let Some(brand) = cli.brand_text() else {
        println!("{}", Cli::command().render_usage());
        println!("Please provide a brand name, e.g. iconagent \"Acme Corp\"");
        return ExitCode::from(EXIT_USAGE);
    };

    println!("Hello, Icon Agent here! Beginning processing for: ❰{}❱", brand);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = match Config::load(config_path, &cli).and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Icon Agent configuration error: {:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let agent = match build_agent(config) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Icon Agent configuration error: {:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    println!(
        "Using backend: {} ({})",
        agent.provider().name(),
        agent.provider().model()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let run = agent.run_with_cancel(build_goal(&brand), cancel).await;
    tracing::info!(
        model_turns = run.model_turns,
        backend_calls = run.backend_calls,
        retries_used = run.retries_used,
        total_tokens = run.usage.total_tokens,
        duration_ms = run.duration.as_millis() as u64,
        "Run finished"
    );

    match run.into_result().and_then(|turn| extract(&turn)) {
        Ok(answer) => {
            println!("{}", answer.to_html());
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Icon Agent failed: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Create the backend, the capability registry and the agent
fn build_agent(config: Config) -> anyhow::Result<Agent> {
    let provider = create_provider(&config.provider, None)?;
    let registry = ToolRegistryBuilder::new(Arc::clone(&provider))
        .with_tools_config(config.tools.clone())
        .build()?;
    Agent::new(provider, Arc::new(registry), config.agent, &config.tools)
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so stdout only carries the greeting and the result.
fn init_tracing(json: bool, verbose: bool) {
    let default_level = if verbose {
        "iconagent=debug"
    } else {
        "iconagent=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
