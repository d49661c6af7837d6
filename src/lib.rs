use common::{ConnectivityEvent, Direction, RadioReport, ScanRecord};
use tokio::sync::oneshot;

pub mod config;
pub mod error;
pub mod feed;
pub mod governor;
pub mod irq;
pub mod mesh;
pub mod node;
pub mod platform;

pub mod prelude {
    pub use crate::{
        config::*, error::*, feed::*, governor::*, irq::*, mesh::prelude::*, node::*,
        platform::*,
    };
    pub use common::*;
}

/// Work items processed by the node, one at a time
#[derive(Debug)]
pub enum NodeMessage {
    /// A scan finished with these networks in view
    ScanDone(Vec<ScanRecord>),
    /// The radio could not complete a scan
    ScanFailed,
    /// Link, address and AP membership changes
    Connectivity(ConnectivityEvent),
    /// Traffic moved through the packet engine
    Forwarded { direction: Direction, bytes: u64 },
    /// A shaper asks to spend tokens for a packet
    Admit {
        direction: Direction,
        bytes: u64,
        reply: oneshot::Sender<bool>,
    },
    /// An edge was latched on one of the input lines
    PinsChanged,
}

impl From<RadioReport> for NodeMessage {
    fn from(report: RadioReport) -> Self {
        match report {
            RadioReport::ScanDone { records } => NodeMessage::ScanDone(records),
            RadioReport::ScanFailed => NodeMessage::ScanFailed,
            RadioReport::Event { event } => NodeMessage::Connectivity(event),
            RadioReport::Forwarded { direction, bytes } => {
                NodeMessage::Forwarded { direction, bytes }
            }
        }
    }
}
