mod app;
mod terminal;
mod transport;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::App;

/// Masked-priming lexical-decision experiment in the terminal.
#[derive(Debug, Parser)]
#[command(name = "lexdec", version)]
struct Cli {
    /// JSON array of stimulus rows (prime, target, group, condition, expected, primetype).
    #[arg(long)]
    stimuli: PathBuf,

    /// JSON file overriding timing, keys and output settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the results (overrides the config file).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log file; `RUST_LOG` controls verbosity.
    #[arg(long, default_value = "lexdec.log")]
    log_file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let app = App::load(&cli.stimuli, cli.config.as_deref(), cli.output.as_deref())?;
    let report = app.run()?;
    println!("{report}");

    Ok(())
}

/// Logs go to a file so they never mix with the stimulus screen.
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let file = File::create(&cli.log_file)
        .with_context(|| format!("creating log file {}", cli.log_file.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
