//! Bridge subcommand: serves the request protocol over stdio.

use std::sync::Arc;

use tracing::info;

use webreplay_api::{Bridge, Dispatcher, Framing};
use webreplay_config::Config;

use crate::cmd_instruction::build_executor;

pub(crate) async fn handle_bridge_command(
    config: &Config,
    framing: Framing,
    endpoint: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let executor = build_executor(config, endpoint).await?;
    let bridge = Bridge::new(Arc::new(Dispatcher::new(executor)), framing);

    bridge.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
    info!("Bridge input closed");
    Ok(())
}
