use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scale_bench::cli::Cli;
use scale_bench::config::Config;
use scale_bench::constants::validate_constants;
use scale_bench::dataset::HfDatasetSource;
use scale_bench::driver::{Driver, DriverConfig};
use scale_bench::error::BenchError;
use scale_bench::pipeline::PipelineConfig;
use scale_bench::transport::HttpTransport;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = validate_constants() {
        eprintln!("internal error: {e}");
        return ExitCode::FAILURE;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap defaults to exit code 2 for usage errors; this CLI's
            // convention is exit code 1 for any startup failure.
            eprint!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("scale-bench: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> scale_bench::error::Result<()> {
    if std::env::var("OPENAI_API_KEY").is_err() {
        return Err(BenchError::MissingApiKey { var: "OPENAI_API_KEY".to_string() });
    }

    let config = Config::load(&cli.config)?;
    tracing::info!(config = %cli.config.display(), base_url = %cli.base_url, "starting benchmark run");

    let client = reqwest::blocking::Client::new();
    let dataset = HfDatasetSource::download(&client, config, cli.n_samples)?;

    let timeout = cli.timeout.map(Duration::from_secs);
    let transport = HttpTransport::new(&cli.base_url, timeout)
        .map_err(|e| BenchError::invalid_cli_args(format!("could not build HTTP client: {e}")))?;

    let driver_config = DriverConfig {
        concurrency: cli.concurrency,
        n_samples: cli.n_samples,
        timeout,
        outfile: cli.outfile.to_string_lossy().to_string(),
    };

    let final_metrics = Driver::new(driver_config, PipelineConfig::default()).run(&dataset, &transport)?;
    println!("{final_metrics}");
    Ok(())
}
