use std::{ops::ControlFlow, time::Duration};

use log::{info, warn};
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};

use super::Node;
use crate::{mesh::machine::RebootCause, platform::Platform, NodeMessage};

/// Capacity of the node mailbox.
pub const MAILBOX_DEPTH: usize = 100;

/// Delay between boot and the first supervisory tick.
pub const BOOT_DELAY: Duration = Duration::from_millis(500);

/// Drives a [`Node`]: mailbox messages and supervisory ticks are handled
/// one at a time on a single task, so the node never needs a lock.
pub struct Supervisor<P: Platform> {
    node: Node<P>,
    inbox: mpsc::Receiver<NodeMessage>,
}

impl<P: Platform> Supervisor<P> {
    pub fn new(node: Node<P>, inbox: mpsc::Receiver<NodeMessage>) -> Self {
        Self { node, inbox }
    }

    pub fn node(&self) -> &Node<P> {
        &self.node
    }

    pub fn into_node(self) -> Node<P> {
        self.node
    }

    /// Run until the node decides to restart. The caller is expected to
    /// hard reset with the returned cause.
    pub async fn run_until_reboot(&mut self) -> RebootCause {
        info!("Supervisor running, first tick in {:?}", BOOT_DELAY);
        let mut deadline = Instant::now() + BOOT_DELAY;
        let mut inbox_open = true;

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    match self.node.on_tick(Instant::now().into_std()) {
                        // Re-armed from now, like a one-shot timer
                        ControlFlow::Continue(wait) => deadline = Instant::now() + wait,
                        ControlFlow::Break(cause) => return cause,
                    }
                }
                message = self.inbox.recv(), if inbox_open => match message {
                    Some(message) => {
                        if let ControlFlow::Break(cause) = self.node.handle(message) {
                            return cause;
                        }
                    }
                    None => {
                        warn!("All mailbox senders are gone, running on ticks only");
                        inbox_open = false;
                    }
                },
            }
        }
    }
}
