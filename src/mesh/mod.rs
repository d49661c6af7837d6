//! Automesh: picking an uplink, deriving this node's identity from its depth
//! and the persisted mode transitions that follow.

pub mod identity;
pub mod machine;
pub mod selector;

pub mod prelude {
    pub use super::identity::*;
    pub use super::machine::*;
    pub use super::selector::*;
}

/// First two octets of every repeater's access point MAC. The third octet
/// carries the repeater's depth below the root.
pub const MESH_TAG: [u8; 2] = [0x24, 0x24];
