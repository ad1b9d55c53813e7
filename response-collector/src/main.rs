//! Response Collector CLI

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use response_collector::{
    analysis::Leaderboard,
    backends::{build_backend, BackendRegistry, ConfigurationError},
    config::Config,
    reporting::{print_console_report, write_json_fallback, CsvReportWriter, JsonSummary},
    runner::{ConsoleProgress, Orchestrator},
    tasks::load_tasks_from_csv,
};

#[derive(Parser)]
#[command(name = "response-collector")]
#[command(about = "Collect answers from several AI assistants and score them against expected outputs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every task on every configured backend
    Run {
        /// CSV file with the tasks (default: from config)
        #[arg(short, long)]
        tasks: Option<PathBuf>,

        /// Comma-separated backend list (default: all enabled)
        #[arg(short, long)]
        backends: Option<String>,

        /// Output directory for the report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum concurrent backend calls per task
        #[arg(long)]
        fan_out: Option<usize>,

        /// Per-call timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Skip similarity scoring
        #[arg(long)]
        no_similarity: bool,

        /// Save each raw answer to its own text file
        #[arg(long)]
        save_responses: bool,
    },

    /// List configured backends and whether they can be built
    ListBackends,

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/collector.toml")]
        output: PathBuf,
    },
}

/// Overrides taken from `run` flags
struct RunArgs {
    tasks: Option<PathBuf>,
    backends: Option<String>,
    output: Option<PathBuf>,
    fan_out: Option<usize>,
    timeout_ms: Option<u64>,
    no_similarity: bool,
    save_responses: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Credentials may live in ./.env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("response_collector=debug,info")
    } else {
        EnvFilter::new("response_collector=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::Run {
            tasks,
            backends,
            output,
            fan_out,
            timeout_ms,
            no_similarity,
            save_responses,
        } => {
            let args = RunArgs {
                tasks,
                backends,
                output,
                fan_out,
                timeout_ms,
                no_similarity,
                save_responses,
            };
            run_collection(config, args).await?;
        }

        Commands::ListBackends => {
            list_backends(&config);
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) -> Result<(), ConfigurationError> {
    if let Some(names) = &args.backends {
        let names: Vec<&str> = names
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        config.retain_backends(&names)?;
    }
    if let Some(tasks) = &args.tasks {
        config.input.tasks_file = tasks.display().to_string();
    }
    if let Some(output) = &args.output {
        config.output.output_dir = output.display().to_string();
    }
    if let Some(fan_out) = args.fan_out {
        config.run.fan_out_limit = fan_out;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.run.timeout_ms = timeout_ms;
    }
    if args.no_similarity {
        config.run.similarity_enabled = false;
    }
    if args.save_responses {
        config.output.save_responses = true;
    }
    Ok(())
}

async fn run_collection(mut config: Config, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let started_at = Utc::now();
    let run_id = started_at.format("%Y%m%d-%H%M%S").to_string();

    apply_overrides(&mut config, &args)?;

    println!("=== Response Collector ===");
    println!("Run ID: {}", run_id);
    println!();

    // Input and output folders are created up front
    let tasks_path = PathBuf::from(&config.input.tasks_file);
    if let Some(parent) = tasks_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let output_dir = PathBuf::from(&config.output.output_dir);
    std::fs::create_dir_all(&output_dir)?;

    let built = BackendRegistry::from_config(&config).instantiate();
    for (name, error) in &built.failures {
        eprintln!("Warning: backend {} skipped: {}", name, error);
    }

    let orchestrator = Orchestrator::new(built.backends, config.orchestrator_settings())?
        .with_progress(Arc::new(ConsoleProgress));
    let backend_names = orchestrator.backend_names();
    println!("Backends: {}", backend_names.join(", "));

    if !tasks_path.exists() {
        eprintln!("Error: task file {} not found", tasks_path.display());
        eprintln!(
            "  Expected a CSV with a '{}' column and an optional '{}' column",
            config.input.task_column, config.input.expected_column
        );
        std::process::exit(1);
    }
    let tasks = load_tasks_from_csv(&tasks_path, &config.input)?;
    if tasks.is_empty() {
        eprintln!("Error: No tasks to run");
        std::process::exit(1);
    }

    println!("Tasks: {}", tasks.len());
    println!();

    let records = orchestrator.run(&tasks).await;

    let report_path = output_dir.join(&config.output.report_file);
    if let Err(e) = CsvReportWriter::write_records(&report_path, &backend_names, &records) {
        let fallback = output_dir.join(format!("records-{}.json", run_id));
        tracing::error!("Cannot write {}: {}", report_path.display(), e);
        match write_json_fallback(&records, &fallback) {
            Ok(()) => eprintln!("Records saved to {}", fallback.display()),
            Err(fallback_error) => eprintln!("Records could not be saved: {}", fallback_error),
        }
        return Err(e.into());
    }

    let leaderboard = Leaderboard::from_records(&records, &backend_names);
    if config.output.generate_json {
        let summary_path = output_dir.join("summary.json");
        JsonSummary::from_leaderboard(&run_id, &leaderboard, report_path.display().to_string())
            .write_to_file(&summary_path)?;
    }

    print_console_report(&leaderboard);

    let elapsed = Utc::now() - started_at;
    println!("Report: {}", report_path.display());
    println!("Elapsed: {}s", elapsed.num_seconds());

    Ok(())
}

fn list_backends(config: &Config) {
    println!("Configured backends:\n");
    for backend in &config.backends {
        let status = if !backend.enabled {
            "disabled".to_string()
        } else {
            match build_backend(backend) {
                Ok(_) => "ready".to_string(),
                Err(e) => format!("unavailable ({})", e),
            }
        };
        println!("  {:<10} {:<8} {}", backend.name, backend.kind.as_str(), status);
    }
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
