//! Everything the node asks of the device around it.

use std::net::Ipv4Addr;

use common::{Interface, MacAddr};
use serde::Serialize;

use crate::{
    config::{with_host, DhcpReservation, MeshConfig, PortMap},
    error::MeshError,
    mesh::machine::RebootCause,
    node::UplinkIdentity,
};

mod host;
#[cfg(test)]
pub mod mock;
#[cfg(feature = "pi")]
mod pi;

pub use host::*;
#[cfg(feature = "pi")]
pub use pi::*;

/// Netmask of every AP subnet.
pub const AP_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
/// Host range handed out by the AP's DHCP server.
pub const DHCP_POOL: (u8, u8) = (2, 128);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioMode {
    StationOnly,
    StationAp,
}

/// Packet hook installed on an interface. `nat` selects address translation
/// over plain bridging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Intercept {
    pub nat: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StationSettings {
    pub ssid: String,
    pub password: String,
    /// Only join this bssid
    pub bssid: Option<MacAddr>,
    pub hostname: String,
    pub auto_connect: bool,
}

impl StationSettings {
    pub fn from_config(config: &MeshConfig) -> Self {
        Self {
            ssid: config.ssid.clone(),
            password: config.password.clone(),
            bssid: config.is_bssid_locked().then_some(config.locked_bssid),
            hostname: config.sta_hostname.clone(),
            auto_connect: config.auto_connect,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SoftApSettings {
    pub ssid: String,
    /// `None` for an open network
    pub password: Option<String>,
    /// Left to the radio when unset
    pub mac: Option<MacAddr>,
    pub hidden: bool,
    pub max_clients: u8,
}

impl SoftApSettings {
    pub fn from_config(config: &MeshConfig) -> Self {
        Self {
            ssid: config.ap_ssid.clone(),
            password: (!config.ap_open).then(|| config.ap_password.clone()),
            mac: (!config.ap_mac.is_zero()).then_some(config.ap_mac),
            hidden: config.ssid_hidden,
            max_clients: config.max_clients,
        }
    }
}

/// Addressing served on the access point side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApNetworkPlan {
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub dhcp_start: Ipv4Addr,
    pub dhcp_end: Ipv4Addr,
    pub dns: Ipv4Addr,
    pub reservations: Vec<DhcpReservation>,
}

impl ApNetworkPlan {
    pub fn for_config(config: &MeshConfig, dns: Ipv4Addr) -> Self {
        let gateway = config.ap_gateway();
        let subnet = u32::from(gateway) & u32::from(AP_NETMASK);

        let reservations = config
            .dhcp_reservations
            .iter()
            .filter(|reservation| u32::from(reservation.ip) & u32::from(AP_NETMASK) == subnet)
            .cloned()
            .collect();

        Self {
            gateway,
            netmask: AP_NETMASK,
            dhcp_start: with_host(gateway, DHCP_POOL.0),
            dhcp_end: with_host(gateway, DHCP_POOL.1),
            dns,
            reservations,
        }
    }
}

/// The node's collaborators: storage, radio, packet engine and I/O lines.
///
/// Calls are fire-and-forget requests. Results come back later as
/// [`NodeMessage`](crate::NodeMessage)s on the mailbox.
pub trait Platform {
    /// Write the whole config record.
    fn persist(&mut self, config: &MeshConfig) -> Result<(), MeshError>;

    /// Restart the device. Never returns.
    fn hard_reset(&mut self, cause: RebootCause) -> !;

    fn start_scan(&mut self);

    fn set_radio_mode(&mut self, mode: RadioMode);

    fn configure_station(&mut self, settings: &StationSettings);

    fn configure_soft_ap(&mut self, settings: &SoftApSettings);

    fn configure_ap_network(&mut self, plan: &ApNetworkPlan);

    fn set_downstream_dns(&mut self, dns: Ipv4Addr);

    /// The hook currently installed on `iface`, if any.
    fn installed_intercept(&self, iface: Interface) -> Option<Intercept>;

    fn install_intercept(&mut self, iface: Interface, intercept: Intercept);

    /// Re-register static port forwards after their mapped address changed.
    fn refresh_port_maps(&mut self, maps: &[PortMap]);

    /// The uplink is up and addressed.
    fn node_ready(&mut self, uplink: &UplinkIdentity);

    /// Level of an input line; `true` is high.
    fn input_level(&mut self, pin: u8) -> bool;

    fn set_output(&mut self, pin: u8, high: bool);

    fn sample_vdd_millivolts(&mut self) -> Option<u32>;

    /// Day of month from the wall clock, if the clock is known.
    fn calendar_day(&self) -> Option<u8>;
}
