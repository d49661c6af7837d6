use std::sync::Arc;

use anyhow::Error;
use env_logger::Env;
use log::info;
use mesh_repeater::prelude::*;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config_path =
        std::env::var("MESH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let feed_socket =
        std::env::var("MESH_FEED_SOCKET").unwrap_or_else(|_| DEFAULT_FEED_SOCKET.to_string());

    // Load the config file
    info!("Loading config from {}", config_path);
    let store = RonFileStore::new(&config_path);
    let config = store.load_or_default()?;

    // Message queue
    let (mailbox, inbox) = mpsc::channel(MAILBOX_DEPTH);
    let latch = Arc::new(PinLatch::new(mailbox.clone()));

    let mut platform = HostPlatform::new(store);
    if let Ok(vdd_path) = std::env::var("MESH_VDD_PATH") {
        info!("Sampling Vdd from {}", vdd_path);
        platform = platform.with_vdd_source(vdd_path);
    }

    // Only touch GPIO if the Pi feature is enabled
    #[cfg(feature = "pi")]
    {
        info!("Starting GPIO...");
        platform = platform.with_board(PiBoard::init(&config, latch.clone())?);
    }

    let mut node = Node::new(platform, config).with_latch(latch);
    node.boot();

    info!("Starting radio feed...");
    let _feed = spawn_radio_feed(&feed_socket, mailbox)?;

    let mut supervisor = Supervisor::new(node, inbox);
    let cause = supervisor.run_until_reboot().await;

    supervisor.into_node().into_platform().hard_reset(cause)
}
