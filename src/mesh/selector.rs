use common::{MacAddr, ScanRecord};
use log::{debug, info};

use super::MESH_TAG;

/// The uplink chosen from one scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Election {
    pub bssid: MacAddr,
    pub channel: u8,
    pub rssi: i32,
    /// Depth of the chosen uplink, including any weak-signal handicap
    pub uplink_depth: u8,
    /// Depth this node takes on below that uplink
    pub own_depth: u8,
}

/// Depth advertised by a bssid. Repeaters tag their AP MAC with
/// `24:24:<depth>`; anything else is taken to be a root access point.
pub fn advertised_depth(bssid: MacAddr) -> u8 {
    let octets = bssid.octets();
    if octets[..2] == MESH_TAG {
        octets[2]
    } else {
        0
    }
}

/// Depth used for ranking: the advertised depth, one level worse when the
/// signal is below `-rssi_threshold` dBm.
pub fn ranked_depth(record: &ScanRecord, rssi_threshold: i32) -> u8 {
    let depth = advertised_depth(record.bssid);
    if record.rssi < -rssi_threshold {
        depth.saturating_add(1)
    } else {
        depth
    }
}

/// Elect an uplink among the records advertising `ssid`. The lowest ranked
/// depth wins, a strictly stronger signal breaks ties, otherwise the earlier
/// record is kept. Returns `None` when nothing matches; rescanning is up to
/// the caller.
pub fn elect(records: &[ScanRecord], ssid: &str, rssi_threshold: i32) -> Option<Election> {
    let mut best: Option<Election> = None;

    for record in records.iter().filter(|record| record.ssid == ssid) {
        let depth = ranked_depth(record, rssi_threshold);
        debug!(
            "Found: {:?},\"{}\",{},\"{}\",{}, mesh level: {}",
            record.authmode, record.ssid, record.rssi, record.bssid, record.channel, depth
        );

        // A node below depth 255 has no depth left to take on
        let Some(own_depth) = depth.checked_add(1) else {
            continue;
        };

        let better = match &best {
            None => true,
            Some(current) => {
                depth < current.uplink_depth
                    || (depth == current.uplink_depth && record.rssi > current.rssi)
            }
        };

        if better {
            best = Some(Election {
                bssid: record.bssid,
                channel: record.channel,
                rssi: record.rssi,
                uplink_depth: depth,
                own_depth,
            });
        }
    }

    if let Some(election) = &best {
        info!(
            "Using: {} (uplink depth {}, rssi {})",
            election.bssid, election.uplink_depth, election.rssi
        );
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ssid: &str, bssid: [u8; 6], rssi: i32) -> ScanRecord {
        ScanRecord {
            ssid: ssid.to_string(),
            bssid: MacAddr(bssid),
            rssi,
            authmode: Default::default(),
            channel: 6,
        }
    }

    #[test]
    fn untagged_root_beats_tagged_repeater() {
        let records = [
            record("X", [0x24, 0x24, 0x02, 0x10, 0x20, 0x30], -40),
            record("X", [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], -60),
        ];

        let election = elect(&records, "X", 70).unwrap();

        assert_eq!(election.bssid, MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        assert_eq!(election.uplink_depth, 0);
        assert_eq!(election.own_depth, 1);
    }

    #[test]
    fn weak_signal_costs_one_level() {
        let weak_root = record("X", [0xaa, 0, 0, 0, 0, 1], -80);
        assert_eq!(ranked_depth(&weak_root, 70), 1);

        // Exactly at the threshold is not weak
        let edge_root = record("X", [0xaa, 0, 0, 0, 0, 2], -70);
        assert_eq!(ranked_depth(&edge_root, 70), 0);

        let records = [weak_root, record("X", [0x24, 0x24, 0x01, 0, 0, 3], -50)];
        let election = elect(&records, "X", 70).unwrap();

        // Both rank at depth 1, the repeater is stronger
        assert_eq!(election.bssid, MacAddr([0x24, 0x24, 0x01, 0, 0, 3]));
        assert_eq!(election.own_depth, 2);
    }

    #[test]
    fn equal_depth_and_rssi_keeps_first_seen() {
        let records = [
            record("X", [0x24, 0x24, 0x01, 0, 0, 1], -55),
            record("X", [0x24, 0x24, 0x01, 0, 0, 2], -55),
        ];

        let election = elect(&records, "X", 90).unwrap();
        assert_eq!(election.bssid, MacAddr([0x24, 0x24, 0x01, 0, 0, 1]));
    }

    #[test]
    fn stronger_signal_breaks_ties() {
        let records = [
            record("X", [0x24, 0x24, 0x03, 0, 0, 1], -65),
            record("X", [0x24, 0x24, 0x03, 0, 0, 2], -45),
            record("X", [0x24, 0x24, 0x03, 0, 0, 3], -50),
        ];

        let election = elect(&records, "X", 90).unwrap();
        assert_eq!(election.bssid, MacAddr([0x24, 0x24, 0x03, 0, 0, 2]));
        assert_eq!(election.own_depth, 4);
    }

    #[test]
    fn other_ssids_are_ignored() {
        let records = [
            record("Neighbour", [0xaa, 0, 0, 0, 0, 1], -20),
            record("Home", [0x24, 0x24, 0x04, 0, 0, 1], -70),
        ];

        let election = elect(&records, "Home", 90).unwrap();
        assert_eq!(election.uplink_depth, 4);

        assert_eq!(elect(&records, "Office", 90), None);
        assert_eq!(elect(&[], "Home", 90), None);
    }

    #[test]
    fn exhausted_depth_is_never_elected() {
        let records = [record("X", [0x24, 0x24, 0xff, 0, 0, 1], -30)];
        assert_eq!(elect(&records, "X", 90), None);

        let records = [record("X", [0x24, 0x24, 0xfe, 0, 0, 1], -95)];
        assert_eq!(elect(&records, "X", 90), None);
    }

    #[test]
    fn half_tagged_bssid_is_a_root() {
        assert_eq!(advertised_depth(MacAddr([0x24, 0x25, 0x05, 0, 0, 0])), 0);
        assert_eq!(advertised_depth(MacAddr([0x24, 0x24, 0x05, 0, 0, 0])), 5);
    }
}
