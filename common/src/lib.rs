//! Vocabulary shared between the mesh node and the radio driver that feeds
//! it. Everything here is already-decoded data: the node never touches raw
//! frames or driver structures.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod wifi;

pub use wifi::*;
