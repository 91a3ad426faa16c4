// src/main.rs

use clap::Parser;
use cortex::cli::{self, CliArgs, Command};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// `search`/`status` print machine-consumable output on stdout, so their
/// default level stays quiet; the other subcommands are operator-driven and
/// default to `INFO`. `CORTEX_DEBUG` always wins.
fn default_level(command: &Command) -> Level {
    if std::env::var("CORTEX_DEBUG").map(|v| v == "1").unwrap_or(false) {
        return Level::DEBUG;
    }
    match command {
        Command::Status | Command::Search { .. } => Level::WARN,
        Command::Promote { .. } | Command::Consolidate { .. } | Command::Bootstrap { .. } => Level::INFO,
    }
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let subscriber =
        FmtSubscriber::builder().with_max_level(default_level(&args.command)).with_writer(std::io::stderr).with_ansi(false).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let code = cli::run(args).await;
    std::process::exit(code);
}
