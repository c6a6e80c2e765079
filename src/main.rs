use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use vocal_analyzer::analysis::AudioAnalyzer;
use vocal_analyzer::cli::{self, Cli, Invocation};
use vocal_analyzer::config::AnalysisConfig;
use vocal_analyzer::report;

fn main() -> ExitCode {
    init_tracing();

    let cli = match cli::parse_args(std::env::args_os()) {
        Invocation::Run(cli) => cli,
        Invocation::Informational(err) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Invocation::Invalid(message) => return fail(&message),
    };

    match run(&cli) {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(err) => fail(&format!("{err:#}")),
    }
}

fn run(cli: &Cli) -> Result<String> {
    let config =
        AnalysisConfig::from_override(cli.config.clone()).context("Failed to load configuration")?;
    let analyzer = AudioAnalyzer::new(config);
    let report = analyzer.analyze(&cli.audio_path, cli.reference_path.as_deref());
    report::render_line(&report)
}

fn fail(message: &str) -> ExitCode {
    println!("{}", report::failure_line(message));
    ExitCode::FAILURE
}

/// Diagnostics go to stderr and stay off unless `RUST_LOG` asks for them;
/// the caller reads stdout and stderr as one stream.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
