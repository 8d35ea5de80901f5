//! wfx CLI: Make-like effect orchestrator.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "wfx",
    version,
    about = "Make-like effect orchestrator: fx targets, dependency scheduling, shell actions and pipelines"
)]
struct Cli {
    #[command(flatten)]
    global: wfx::cli::GlobalArgs,

    #[command(subcommand)]
    command: wfx::cli::Commands,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    if let Err(e) = wfx::cli::dispatch(cli.command, &cli.global) {
        eprintln!("error: {}", e);
        std::process::exit(wfx::cli::exit_code(&e));
    }
}
