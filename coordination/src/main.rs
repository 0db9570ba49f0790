//! Command-line entry point for insight coordination
//!
//! # Usage
//!
//! ```bash
//! # Run one debate end to end and print the final record as JSON
//! insight-coordination run-debate --team finance --topic "Extend supplier payment terms?" \
//!     --context '{"dso": 47, "cash_position": 125000}'
//!
//! # Custom configuration
//! COORD_LLM_URL=http://gpu-node:8080/v1/chat/completions insight-coordination \
//!     run-debate --config coordination.toml --team sales --topic "Discount Q4 renewals?"
//!
//! # Print the effective configuration as TOML
//! insight-coordination show-config
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use insight_coordination::debate::ConfidenceThresholdReviewer;
use insight_coordination::{
    telemetry, CoordinationConfig, CoordinationContext, DebateRequest, DialecticOutcome,
    HttpGenerator,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults, then file, then COORD_* env)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one dialectical debate and print the final record
    RunDebate {
        /// Team whose trio debates (maps to a domain)
        #[arg(long)]
        team: String,

        /// Question under debate
        #[arg(long)]
        topic: String,

        /// Context data as a JSON object
        #[arg(long)]
        context: Option<String>,

        /// Concurrency cap (overrides COORD_MAX_ACTIVE_DEBATES)
        #[arg(long)]
        max_active: Option<usize>,

        /// Minimum synthesis confidence the governance reviewer approves
        #[arg(long, default_value_t = 0.6)]
        min_confidence: f64,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(None);

    let mut config = CoordinationConfig::load(args.config.as_deref())?;

    match args.command {
        Command::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Command::RunDebate {
            team,
            topic,
            context,
            max_active,
            min_confidence,
        } => {
            if let Some(n) = max_active {
                config.debate.max_active_debates = n;
            }
            let context = match context {
                Some(raw) => serde_json::from_str(&raw).context("--context must be valid JSON")?,
                None => serde_json::Value::Null,
            };

            tracing::info!(
                team = %team,
                endpoint = %config.generation.endpoint_url,
                model = %config.generation.model,
                "Starting debate"
            );

            let generator = Arc::new(HttpGenerator::new(config.generation.clone())?);
            let ctx = CoordinationContext::new(config);
            let runner = ctx
                .dialectic_runner(generator)
                .with_reviewer(Arc::new(ConfidenceThresholdReviewer::new(
                    "governance",
                    min_confidence,
                )))
                .shared();
            let _follow = runner.follow_queue();

            let request = DebateRequest::new(team, topic).with_context(context);
            match runner.run(request).await? {
                DialecticOutcome::Completed { record } => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                }
                DialecticOutcome::Queued { position } => {
                    println!("{}", serde_json::json!({"status": "queued", "position": position}));
                }
            }
        }
    }

    Ok(())
}
