//! Radio feed: the radio driver connects over a local socket and writes one
//! JSON [`RadioReport`] per line. Reports are posted to the node mailbox in
//! the order they arrive.

use std::{
    io::{self, BufRead, BufReader},
    path::Path,
};

use common::RadioReport;
use interprocess::local_socket::{LocalSocketListener, LocalSocketStream};
use log::{debug, error, info, warn};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{error::MeshError, NodeMessage};

pub const DEFAULT_FEED_SOCKET: &str = "/tmp/mesh-radio.sock";

fn handle_error(conn: io::Result<LocalSocketStream>) -> Option<LocalSocketStream> {
    match conn {
        Ok(val) => Some(val),
        Err(error) => {
            error!("Incoming radio feed connection failed: {}", error);
            None
        }
    }
}

/// Listen on `socket` and forward every connection's reports to `mailbox`.
/// Each connection gets its own thread; the listener runs on the blocking
/// pool.
pub fn spawn_radio_feed(
    socket: &str,
    mailbox: mpsc::Sender<NodeMessage>,
) -> Result<JoinHandle<()>, MeshError> {
    // A socket left over from a previous run would make bind fail
    if Path::new(socket).exists() {
        std::fs::remove_file(socket)?;
    }

    let listener = LocalSocketListener::bind(socket)?;
    info!("Radio feed listening on {}", socket);

    Ok(tokio::task::spawn_blocking(move || {
        for conn in listener.incoming().filter_map(handle_error) {
            info!("Radio driver connected");
            let mailbox = mailbox.clone();
            std::thread::spawn(move || match forward_reports(BufReader::new(conn), &mailbox) {
                Ok(count) => info!("Radio driver disconnected after {} reports", count),
                Err(e) => warn!("Radio feed connection dropped: {}", e),
            });
        }
    }))
}

/// Decode reports from `reader` until it ends, posting each to `mailbox`.
/// Malformed lines are logged and skipped. Returns the number of reports
/// forwarded.
pub fn forward_reports<R: BufRead>(
    reader: R,
    mailbox: &mpsc::Sender<NodeMessage>,
) -> Result<usize, MeshError> {
    let mut forwarded = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let report = match RadioReport::from_json_line(&line) {
            Ok(report) => report,
            Err(e) => {
                warn!("Skipping malformed radio report ({}): {}", e, line);
                continue;
            }
        };

        if mailbox.blocking_send(report.into()).is_err() {
            debug!("Node mailbox closed, dropping the radio feed");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}
