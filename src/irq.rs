//! Edge capture for input lines.
//!
//! Interrupt callbacks only touch the atomic mask below. The node drains it
//! later from its own context.

use std::sync::atomic::{AtomicU32, Ordering};

use log::trace;
use tokio::sync::mpsc;

use crate::NodeMessage;

pub struct PinLatch {
    pending: AtomicU32,
    mailbox: mpsc::Sender<NodeMessage>,
}

impl PinLatch {
    pub fn new(mailbox: mpsc::Sender<NodeMessage>) -> Self {
        Self {
            pending: AtomicU32::new(0),
            mailbox,
        }
    }

    /// Called from interrupt context. Only the first edge of a batch posts a
    /// work item; the rest fold into the pending mask.
    pub fn capture(&self, mask: u32) {
        let before = self.pending.fetch_or(mask, Ordering::AcqRel);
        if before == 0 {
            // A full mailbox is fine, the supervisory tick drains the mask too
            if self.mailbox.try_send(NodeMessage::PinsChanged).is_err() {
                trace!("Mailbox busy, pin change left for the next tick");
            }
        }
    }

    /// Take every pending edge and re-arm the latch.
    pub fn take(&self) -> u32 {
        self.pending.swap(0, Ordering::AcqRel)
    }
}

/// Bit for `pin` in a capture mask, or `None` for lines above 31, which
/// the latch cannot hold.
pub fn pin_mask(pin: u8) -> Option<u32> {
    1u32.checked_shl(u32::from(pin))
}
