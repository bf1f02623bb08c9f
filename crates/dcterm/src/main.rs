//! dcterm entry point.

use std::path::Path;
use std::time::Duration;

use clap::Parser;

use dcterm::app::App;
use dcterm::bench;
use dcterm::cli::{Cli, Commands, DEFAULT_TICK_MS};
use dcterm::{config, logging};

fn main() {
    let cli = Cli::parse();
    let state_dir = cli.state_dir();

    let result = match &cli.command {
        Some(Commands::Run { tick_ms }) => run_interactive(&cli, &state_dir, *tick_ms),
        Some(Commands::Bench {
            producers,
            emissions,
        }) => run_bench(&cli, *producers, *emissions),
        None => run_interactive(&cli, &state_dir, DEFAULT_TICK_MS),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_interactive(cli: &Cli, state_dir: &Path, tick_ms: u64) -> dcterm::Result<()> {
    let log_file = config::ensure_log_file(state_dir)?;
    logging::init_file(cli.log_level(), &log_file)?;

    App::new(cli.dispatcher_config(), Duration::from_millis(tick_ms))?.run()
}

fn run_bench(cli: &Cli, producers: usize, emissions: usize) -> dcterm::Result<()> {
    logging::init_stderr(cli.log_level());

    let report = bench::run_bench(cli.dispatcher_config(), producers, emissions)?;
    println!("{}", report);
    Ok(())
}
