//! Persisted automesh transitions.
//!
//! Every function here mutates the in-memory [`MeshConfig`] and returns a
//! [`Decision`] telling the node whether the record has to be written and
//! whether the node must restart afterwards. Nothing here performs I/O.

use common::{DisconnectReason, MacAddr};
use log::{info, warn};

use super::{identity::NodeIdentity, selector::Election};
use crate::config::{AutomeshMode, MeshConfig};

/// Disconnects tolerated before the failure is escalated.
pub const MAX_TRIES: u32 = 3;

/// Why the node is about to restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebootCause {
    /// A new uplink was elected and committed
    Elected,
    /// Retry the uplink from a clean start
    RetryUplink,
    /// A previously verified uplink keeps failing; back to learning
    UplinkUnstable,
    /// The initial credentials never worked; factory defaults written
    BadCredentials,
    /// Associated with a bssid other than the locked one
    RogueUplink,
    /// No traffic from the uplink access point in time
    ApWatchdog,
    /// No traffic from downstream clients in time
    ClientWatchdog,
    /// Factory reset line held down
    ResetButton,
}

#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to write
    Stay,
    /// Write the record and keep running
    Persist,
    /// Write the record, then restart
    Restart(RebootCause),
}

/// Outcome of an uplink disconnect.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisconnectOutcome {
    /// Drop the access point and run station-only until the restart
    pub station_only: bool,
    pub decision: Decision,
}

/// Whether `reason` means the uplink is gone from the air, which forces the
/// radio back to station-only mode.
pub fn forces_station_only(reason: DisconnectReason) -> bool {
    reason == DisconnectReason::NO_AP_FOUND
}

/// Commit an election. The node comes back `Operational` but unverified;
/// [`confirm_uplink`] completes the promotion once a lease arrives.
pub fn commit_election(
    config: &mut MeshConfig,
    election: &Election,
    identity: &NodeIdentity,
) -> Decision {
    if config.mode != AutomeshMode::Learning {
        return Decision::Stay;
    }

    config.locked_bssid = election.bssid;
    config.ap_mac = identity.ap_mac;
    config.network_addr = identity.network_addr;
    config.mode = AutomeshMode::Operational;
    config.checked = false;
    config.tries = 0;

    info!(
        "Elected uplink {} at depth {}, own AP {} on {}",
        election.bssid, election.uplink_depth, identity.ap_mac, identity.network_addr
    );

    Decision::Restart(RebootCause::Elected)
}

/// An association completed. Guards against a rogue access point sharing
/// the uplink ssid.
pub fn on_associated(config: &mut MeshConfig, bssid: MacAddr) -> Decision {
    let wrong_bssid = config.is_bssid_locked() && config.locked_bssid != bssid;
    if wrong_bssid {
        warn!(
            "Connected to non configured bssid {} (locked to {})",
            bssid, config.locked_bssid
        );
    }

    if config.mode == AutomeshMode::Operational && wrong_bssid {
        config.mode = AutomeshMode::Learning;
        return Decision::Restart(RebootCause::RogueUplink);
    }

    Decision::Stay
}

/// The uplink dropped. Only `Operational` nodes react; the severity of the
/// reaction depends on whether the credentials were ever verified.
pub fn on_disassociated(config: &mut MeshConfig, reason: DisconnectReason) -> DisconnectOutcome {
    if config.mode != AutomeshMode::Operational {
        return DisconnectOutcome {
            station_only: false,
            decision: Decision::Stay,
        };
    }

    let station_only = forces_station_only(reason);
    config.tries = config.tries.saturating_add(1);

    let decision = if config.tries > MAX_TRIES {
        if config.checked {
            warn!("Connect to known SSID {} failed, rogue AP?", config.ssid);
            config.locked_bssid = MacAddr::ZERO;
            config.mode = AutomeshMode::Learning;
            Decision::Restart(RebootCause::UplinkUnstable)
        } else {
            warn!(
                "Initial connect to SSID {} failed, check password - factory reset",
                config.ssid
            );
            config.factory_reset();
            Decision::Restart(RebootCause::BadCredentials)
        }
    } else if station_only || !config.checked {
        info!("Cannot connect to SSID {} - {}. trial", config.ssid, config.tries);
        Decision::Restart(RebootCause::RetryUplink)
    } else {
        Decision::Stay
    };

    DisconnectOutcome {
        station_only,
        decision,
    }
}

/// A lease arrived on the uplink. The first one after an election marks the
/// credentials as verified; later ones change nothing.
pub fn confirm_uplink(config: &mut MeshConfig) -> Decision {
    if config.mode != AutomeshMode::Operational || config.checked {
        return Decision::Stay;
    }

    config.checked = true;
    Decision::Persist
}

/// `Operational` nodes must have a locked uplink and a tagged AP MAC.
pub fn operational_invariant_holds(config: &MeshConfig) -> bool {
    if config.mode != AutomeshMode::Operational {
        return true;
    }
    let ap_mac = config.ap_mac.octets();
    config.is_bssid_locked() && ap_mac[..2] == super::MESH_TAG && ap_mac[2] != 0
}
