use std::path::Path;

use clap::Parser as _;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, filter::LevelFilter, layer::SubscriberExt as _,
};

mod app;
mod cli;
mod rpc_server;

const LOG_FILE_PREFIX: &str = "claim_markets.log";

/// Install the global subscriber. The returned guard flushes the log file
/// writer and must be held until exit.
fn set_tracing_subscriber(
    log_level: tracing::Level,
    log_dir: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stdout()))
        .with_file(true)
        .with_line_number(true);
    let (file_layer, guard) = match log_dir {
        Some(log_dir) => {
            let appender =
                tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.get_config()?;
    let _log_guard =
        set_tracing_subscriber(config.log_level, config.log_dir.as_deref())?;
    let app = app::App::new(&config)?;
    let addr = rpc_server::run_server(app, config.rpc_addr).await?;
    tracing::info!(%addr, "serving JSON-RPC");
    tokio::signal::ctrl_c().await?;
    tracing::info!("received interrupt, shutting down");
    Ok(())
}
