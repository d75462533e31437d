//! trk - shipment tracker CLI

use anyhow::Result;
use clap::Parser;
use shipment_tracker_cli::{run, Cli};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = cli.config();
    run(cli.command, &config)
}

/// Diagnostics go to stderr so stdout stays parseable with `--format json`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
