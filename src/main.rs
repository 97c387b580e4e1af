mod cmd;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use universe_fixture::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => {
            let code = cmd::run::run(args)?;
            std::process::exit(code);
        }
        Command::List(args) => cmd::list::run(&args),
        Command::Gc => cmd::gc::run(),
        Command::Config(config_cmd) => cmd::config::run(config_cmd),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
