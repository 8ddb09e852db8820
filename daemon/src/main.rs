//! WETH daemon: operator CLI over a persisted wrapped-native ledger.

mod commands;
mod config;
mod journal;
mod run;
mod state;

use std::path::PathBuf;

use clap::Parser;
use weth_utils::LogFormat;

use crate::commands::Command;
use crate::config::DaemonConfig;
use crate::journal::PayoutJournal;
use crate::state::FileStateStore;

#[derive(Parser)]
#[command(name = "weth-daemon", about = "Wrapped-native ledger operator CLI")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "WETH_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger snapshot file.
    #[arg(long, env = "WETH_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Payout journal written by withdrawals.
    #[arg(long, env = "WETH_PAYOUT_JOURNAL")]
    payout_journal: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "WETH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "WETH_LOG_FORMAT")]
    log_format: Option<String>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Merge the optional config file with flag and env overrides.
    fn resolve_config(&self) -> anyhow::Result<DaemonConfig> {
        let base = match &self.config {
            Some(path) => DaemonConfig::from_toml_file(path)?,
            None => DaemonConfig::default(),
        };
        Ok(DaemonConfig {
            state_file: self.state_file.clone().unwrap_or(base.state_file),
            payout_journal: self.payout_journal.clone().unwrap_or(base.payout_journal),
            log_format: self.log_format.clone().unwrap_or(base.log_format),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let format: LogFormat = config.log_format.parse()?;
    weth_utils::init_logging(format, &config.log_level);

    if cli.command == Command::ShowConfig {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    // Held until the command has finished, so runs sharing a state file
    // never interleave.
    let store = FileStateStore::open(&config.state_file)?;
    let journal = PayoutJournal::new(&config.payout_journal);
    let output = run::run(&store, &journal, &cli.command, cli.json).await?;
    println!("{output}");
    Ok(())
}
