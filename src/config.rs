use std::{
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use common::MacAddr;
use log::{info, warn};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use crate::error::MeshError;

pub const DEFAULT_CONFIG_PATH: &str = "mesh.ron";

/// Automesh state, persisted across restarts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomeshMode {
    /// Operator-controlled, no automatic transitions
    #[default]
    Off,
    /// Scanning for and electing an uplink
    Learning,
    /// Running with a previously elected uplink
    Operational,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// A static port forward from the uplink side to a downstream host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMap {
    pub proto: Protocol,
    pub external_port: u16,
    pub internal_addr: Ipv4Addr,
    pub internal_port: u16,
    /// The station address the forward listens on; follows every new lease
    #[serde(default = "unspecified")]
    pub mapped_addr: Ipv4Addr,
}

/// A fixed DHCP lease handed out on the access point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpReservation {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

fn unspecified() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

/// The persisted node configuration. Most fields only take effect after a
/// restart, so every committing change is written before rebooting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    // Uplink
    pub ssid: String,
    pub password: String,
    /// All-zero means "any bssid with the configured ssid"
    pub locked_bssid: MacAddr,
    pub sta_hostname: String,
    pub auto_connect: bool,

    // Automesh
    pub mode: AutomeshMode,
    pub tries: u32,
    /// Set once the current uplink credentials produced a lease
    pub checked: bool,
    /// Candidates weaker than `-rssi_threshold` dBm get a one level handicap
    pub rssi_threshold: i32,

    // Access point
    pub ap_on: bool,
    pub ap_ssid: String,
    pub ap_password: String,
    pub ap_open: bool,
    pub ap_mac: MacAddr,
    pub ssid_hidden: bool,
    pub max_clients: u8,
    /// The AP subnet, stored as the gateway address (host part `.1`)
    pub network_addr: Ipv4Addr,
    pub nat_enable: bool,
    pub dns_addr: Option<Ipv4Addr>,
    pub dhcp_reservations: Vec<DhcpReservation>,

    // Liveness; -1 disables a watchdog
    pub ap_watchdog: i32,
    pub client_watchdog: i32,
    pub reset_pin: Option<u8>,
    pub status_led: Option<u8>,

    // Traffic; 0 means unlimited
    pub kbps_up: u32,
    pub kbps_down: u32,
    pub daily_limit: u64,
    pub port_maps: Vec<PortMap>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            ssid: "ssid".to_string(),
            password: "password".to_string(),
            locked_bssid: MacAddr::ZERO,
            sta_hostname: "mesh-repeater".to_string(),
            auto_connect: true,

            mode: AutomeshMode::Off,
            tries: 0,
            checked: false,
            rssi_threshold: 85,

            ap_on: true,
            ap_ssid: "MyAP".to_string(),
            ap_password: "none".to_string(),
            ap_open: true,
            ap_mac: MacAddr::ZERO,
            ssid_hidden: false,
            max_clients: 8,
            network_addr: Ipv4Addr::new(192, 168, 4, 1),
            nat_enable: true,
            dns_addr: None,
            dhcp_reservations: Vec::new(),

            ap_watchdog: -1,
            client_watchdog: -1,
            reset_pin: None,
            status_led: None,

            kbps_up: 0,
            kbps_down: 0,
            daily_limit: 0,
            port_maps: Vec::new(),
        }
    }
}

impl MeshConfig {
    pub fn from_ron(document: &str) -> Result<Self, MeshError> {
        Ok(ron::from_str(document)?)
    }

    pub fn to_ron(&self) -> Result<String, MeshError> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }

    /// Wipe everything back to defaults except the factory reset pin, so the
    /// button keeps working after the wipe.
    pub fn factory_reset(&mut self) {
        let reset_pin = self.reset_pin;
        *self = MeshConfig::default();
        self.reset_pin = reset_pin;
    }

    pub fn is_bssid_locked(&self) -> bool {
        !self.locked_bssid.is_zero()
    }

    /// This node's own address on the AP subnet.
    pub fn ap_gateway(&self) -> Ipv4Addr {
        with_host(self.network_addr, 1)
    }
}

/// Replace the host octet of a /24 address.
pub fn with_host(addr: Ipv4Addr, host: u8) -> Ipv4Addr {
    let [a, b, c, _] = addr.octets();
    Ipv4Addr::new(a, b, c, host)
}

/// `MeshConfig` stored as a RON document on disk.
pub struct RonFileStore {
    path: PathBuf,
}

impl RonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored config. A missing document is created from factory
    /// defaults; an unreadable one is replaced by them.
    pub fn load_or_default(&self) -> Result<MeshConfig, MeshError> {
        if !self.path.exists() {
            info!("No config at {}, writing factory defaults", self.path.display());
            let config = MeshConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let document = std::fs::read_to_string(&self.path)?;
        match MeshConfig::from_ron(&document) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(
                    "Config at {} is invalid ({}), falling back to factory defaults",
                    self.path.display(),
                    e
                );
                let config = MeshConfig::default();
                self.save(&config)?;
                Ok(config)
            }
        }
    }

    /// Write the whole record. The document is written next to the target and
    /// renamed over it so a crash never leaves half a config behind.
    pub fn save(&self, config: &MeshConfig) -> Result<(), MeshError> {
        let document = config.to_ron()?;
        let staging = self.path.with_extension("ron.tmp");
        std::fs::write(&staging, document)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}
