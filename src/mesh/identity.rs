use std::net::Ipv4Addr;

use common::MacAddr;
use rand::Rng;

use super::MESH_TAG;

/// First two octets of every repeater's AP subnet; the third is the depth.
pub const NETWORK_PREFIX: [u8; 2] = [10, 24];

/// The AP-side identity a node derives from its elected depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeIdentity {
    /// `24:24:<depth>:<random>:<random>:<random>`
    pub ap_mac: MacAddr,
    /// `10.24.<depth>.1`, the node's own gateway address on its AP subnet
    pub network_addr: Ipv4Addr,
}

impl NodeIdentity {
    /// Derive the identity for `own_depth`. The low three MAC octets are
    /// drawn fresh on every election; siblings at the same depth are only
    /// kept apart by chance.
    pub fn assign<R: Rng + ?Sized>(own_depth: u8, rng: &mut R) -> Self {
        let mut low = [0u8; 3];
        rng.fill(&mut low[..]);
        Self::with_suffix(own_depth, low)
    }

    pub fn with_suffix(own_depth: u8, low: [u8; 3]) -> Self {
        let ap_mac = MacAddr([
            MESH_TAG[0],
            MESH_TAG[1],
            own_depth,
            low[0],
            low[1],
            low[2],
        ]);
        let network_addr = Ipv4Addr::new(NETWORK_PREFIX[0], NETWORK_PREFIX[1], own_depth, 1);

        Self {
            ap_mac,
            network_addr,
        }
    }

    pub fn depth(&self) -> u8 {
        self.ap_mac.octets()[2]
    }
}
