use std::ffi::OsString;
use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};

use crate::registrar::MAX_SUFFIX_LEN;

#[derive(Parser, Debug)]
#[command(name = "universe-fixture")]
#[command(version)]
#[command(about = "Stub universe registration and agent cleanup for framework test sessions")]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register stub universes, run a test command, then remove them again
    Run(RunArgs),
    /// Show the package repositories currently registered
    List(ListArgs),
    /// Reclaim framework sandboxes on every private agent
    Gc,
    /// Manage universe-fixture configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Space-separated repository URLs to register for the session
    #[arg(long, env = "STUB_UNIVERSE_URL", value_name = "URLS")]
    pub urls: Option<String>,

    /// Prefix for generated repository names (overrides config)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Length of the random name suffix (overrides config)
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_SUFFIX_LEN as u64))]
    pub suffix_len: Option<usize>,

    /// Reclaim agent framework sandboxes before running the command
    #[arg(long)]
    pub gc: bool,

    /// Test command to run while the repositories are registered
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit the listing as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a key in the config file (e.g. registrar.prefix)
    Set(ConfigSetArgs),
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Config key to set (e.g. tools.dcos.path)
    pub key: String,
    /// Value to assign to the key
    pub value: String,
    /// Override config file path (default: ~/.config/universe-fixture/config.toml)
    #[arg(long = "file")]
    pub file: Option<PathBuf>,
}
