// Feflow - command-line entry point

use std::time::Duration;

use clap::Parser;
use feflow::cli::Cli;
use feflow::utils::logging::init_logging;
use feflow::Feflow;

/// How long a pending usage report may delay exit.
const REPORT_GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (verbosity, request) = Cli::parse().into_request();
    if let Err(e) = init_logging(verbosity) {
        eprintln!("{}", e);
    }

    let cwd = std::env::current_dir()?;
    let mut feflow = Feflow::bootstrap(cwd, env!("CARGO_PKG_VERSION")).await?;

    let result = feflow.dispatch(request).await;
    feflow.flush_report(REPORT_GRACE).await;

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}
