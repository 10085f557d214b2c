//! repodeck: manage many local git repositories from one place

use anyhow::Result;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use repodeck::commands::{self, Cli};
use repodeck::core::Settings;
use repodeck::logging::init_logging;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.log = settings.log.clone().with_verbosity(cli.verbose);
    if cli.log_json {
        settings.log.json = true;
    }
    init_logging(&settings.log)?;
    debug!(?settings, "settings loaded");

    // First Ctrl-C stops batch work between commands, in-flight commands finish
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling remaining work");
            on_signal.cancel();
        }
    });

    let all_ok = commands::run(cli, settings, cancel).await?;
    Ok(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
