//! Hybrid Parameter Optimizer Binary
//!
//! Runs a single PSO/GA pass (or scores one parameter vector) from the command line.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rustune::application::optimization::evaluation::install_quiet_panic_hook;
use rustune::application::optimization::reporting::PassReporter;
use rustune::application::optimization::{EngineSettings, FitnessEvaluator, HybridOptimizationEngine};
use rustune::config::OptimizerEnvConfig;
use rustune::domain::optimization::ParameterBounds;
use rustune::domain::repositories::{CheckpointRepository, HistoricalDataRepository};
use rustune::domain::trading::types::HistoricalDataSet;
use rustune::infrastructure::{
    CsvHistoricalDataStore, FileStrategyHost, InMemoryCheckpointRepository, JsonCheckpointStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Hybrid PSO/GA Parameter Optimizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one hybrid optimization pass
    Run {
        /// Directory containing trades.csv / candles.csv (synthetic scoring when omitted)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// TOML file overriding the parameter bounds
        #[arg(long)]
        bounds: Option<String>,

        /// Output JSON file for results
        #[arg(short, long, default_value = "optimization_results.json")]
        output: String,

        /// Checkpoint file to resume from and update
        #[arg(long)]
        checkpoints: Option<PathBuf>,

        /// PSO swarm size
        #[arg(long)]
        pso_population: Option<usize>,

        /// PSO iterations
        #[arg(long)]
        pso_iterations: Option<usize>,

        /// GA population size
        #[arg(long)]
        ga_population: Option<usize>,

        /// GA generations
        #[arg(long)]
        ga_generations: Option<usize>,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Score a single comma-separated parameter vector
    Score {
        /// Parameter values in bounds order
        #[arg(short, long)]
        params: String,

        /// Directory containing trades.csv / candles.csv
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    install_quiet_panic_hook();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            data_dir,
            bounds,
            output,
            checkpoints,
            pso_population,
            pso_iterations,
            ga_population,
            ga_generations,
            seed,
        } => {
            let reporter = PassReporter::default();
            let data_source = data_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "synthetic".to_string());
            reporter.print_header(&data_source, &output);

            let bounds = match bounds {
                Some(path) => {
                    info!("Loading parameter bounds from: {}", path);
                    load_bounds_from_toml(&path)?
                }
                None => ParameterBounds::strategy_default(),
            };
            reporter.print_bounds(&bounds);

            let optimizer = OptimizerEnvConfig::from_env()?;
            let mut settings = EngineSettings {
                pso: optimizer.pso,
                ga: optimizer.ga,
                seed: seed.or(optimizer.seed),
                ..EngineSettings::default()
            };
            if let Some(size) = pso_population {
                settings.pso.population_size = size;
            }
            if let Some(iterations) = pso_iterations {
                settings.pso.max_iterations = iterations;
            }
            if let Some(size) = ga_population {
                settings.ga.population_size = size;
            }
            if let Some(generations) = ga_generations {
                settings.ga.generations = generations;
            }

            let store: Arc<dyn CheckpointRepository> = match checkpoints {
                Some(path) => Arc::new(JsonCheckpointStore::new(path)),
                None => Arc::new(InMemoryCheckpointRepository::new()),
            };
            let host = Arc::new(FileStrategyHost::new(data_dir));
            let mut engine = HybridOptimizationEngine::new(host.clone(), store, settings)
                .with_bounds(bounds.clone());
            if let Some(data) = CsvHistoricalDataStore::from_host(host.as_ref()) {
                engine = engine.with_historical_data(Arc::new(data));
            }

            let resumed = engine.load_checkpoints().await;
            if resumed > 0 {
                info!("Resuming from {} checkpoints", resumed);
            }

            println!("Starting hybrid pass...\n");
            let report = engine
                .run_hybrid_pass()
                .await?
                .context("Engine was busy, no pass executed")?;
            engine.flush_checkpoints().await;

            reporter.print_pass_report(&report, &bounds);
            reporter.export_json(&report, &bounds, &output)?;
            println!("Optimization complete!\n");
        }
        Commands::Score { params, data_dir } => {
            let vector = parse_vector(&params)?;
            let data = match data_dir {
                Some(dir) => CsvHistoricalDataStore::new(dir).load_all().await?,
                None => HistoricalDataSet::default(),
            };
            let evaluator = FitnessEvaluator::new(data);
            let score = evaluator.try_evaluate(&vector)?;

            println!("{}", "=".repeat(80));
            println!("Fitness (lower is better): {:.6}", score);
            if evaluator.uses_historical_data() {
                let breakdown = evaluator.breakdown(&vector)?;
                let stats = &breakdown.statistics;
                println!("  Trades:            {}", stats.total_trades);
                println!("  Total Profit:      {:.2}", stats.total_profit);
                println!("  Win Rate:          {:.1}%", stats.win_rate * 100.0);
                println!("  Profit Factor:     {:.2}", stats.profit_factor);
                println!("  Consistency:       {:.2}", stats.consistency_bonus);
                println!("  Max Drawdown:      {:.2}", stats.max_drawdown);
                println!("  Indicator Quality: {:.4}", breakdown.indicator_quality);
            } else {
                println!("  (synthetic scoring, no historical data)");
            }
            println!("{}", "=".repeat(80));
        }
    }

    Ok(())
}

/// Loads parameter bounds from a TOML file (`[[bounds]]` tables with name/min/max).
///
/// The table must narrow the ranges of all 13 strategy parameters, listed in order.
fn load_bounds_from_toml(path: &str) -> Result<ParameterBounds> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read bounds file: {}", path))?;
    let bounds = ParameterBounds::from_toml_str(&content)
        .context(format!("Failed to parse bounds TOML: {}", path))?;
    bounds
        .ensure_strategy_layout()
        .context(format!("Bounds file does not match the strategy parameters: {}", path))?;
    Ok(bounds)
}

fn parse_vector(raw: &str) -> Result<Vec<f64>> {
    let vector = raw
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .context(format!("Invalid parameter value: {}", v))
        })
        .collect::<Result<Vec<_>>>()?;
    if vector.is_empty() {
        bail!("No parameter values given");
    }
    Ok(vector)
}
