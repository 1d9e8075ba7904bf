// annotatord: local helper server for the plot annotator page.

use annotator_daemon::config::DaemonConfig;
use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = DaemonConfig::load();
    info!(port = config.port, "starting plot annotator daemon");
    annotator_daemon::runtime::run(config)
        .await
        .context("annotator daemon terminated unexpectedly")
}
