use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;
use core::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A 48-bit hardware address, printed as `aa:bb:cc:dd:ee:ff`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// All-zero address, used as "unset".
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseMacError;

impl fmt::Display for ParseMacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected six hex octets separated by ':'")
    }
}

impl FromStr for MacAddr {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or(ParseMacError)?;
            if part.is_empty() || part.len() > 2 {
                return Err(ParseMacError);
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseMacError)?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError);
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Authentication mode advertised by a scanned network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One network seen during a scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub ssid: String,
    pub bssid: MacAddr,
    pub rssi: i32,
    #[serde(default)]
    pub authmode: AuthMode,
    #[serde(default)]
    pub channel: u8,
}

/// Raw disconnect reason reported by the radio driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisconnectReason(pub u8);

impl DisconnectReason {
    pub const BEACON_TIMEOUT: DisconnectReason = DisconnectReason(200);
    pub const NO_AP_FOUND: DisconnectReason = DisconnectReason(201);
    pub const AUTH_FAIL: DisconnectReason = DisconnectReason(202);
    pub const ASSOC_FAIL: DisconnectReason = DisconnectReason(203);
    pub const HANDSHAKE_TIMEOUT: DisconnectReason = DisconnectReason(204);

    pub fn code(self) -> u8 {
        self.0
    }

    /// Get a human-readable name for the reason code
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "UNSPECIFIED",
            2 => "AUTH_EXPIRE",
            3 => "AUTH_LEAVE",
            4 => "ASSOC_EXPIRE",
            5 => "ASSOC_TOOMANY",
            6 => "NOT_AUTHED",
            7 => "NOT_ASSOCED",
            8 => "ASSOC_LEAVE",
            9 => "ASSOC_NOT_AUTHED",
            10 => "DISASSOC_PWRCAP_BAD",
            11 => "DISASSOC_SUPCHAN_BAD",
            13 => "IE_INVALID",
            14 => "MIC_FAILURE",
            15 => "4WAY_HANDSHAKE_TIMEOUT",
            16 => "GROUP_KEY_UPDATE_TIMEOUT",
            17 => "IE_IN_4WAY_DIFFERS",
            18 => "GROUP_CIPHER_INVALID",
            19 => "PAIRWISE_CIPHER_INVALID",
            20 => "AKMP_INVALID",
            21 => "UNSUPP_RSN_IE_VERSION",
            22 => "INVALID_RSN_IE_CAP",
            23 => "802_1X_AUTH_FAILED",
            24 => "CIPHER_SUITE_REJECTED",
            200 => "BEACON_TIMEOUT",
            201 => "NO_AP_FOUND",
            202 => "AUTH_FAIL",
            203 => "ASSOC_FAIL",
            204 => "HANDSHAKE_TIMEOUT",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// The two network interfaces of a repeater.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interface {
    /// Station side, towards the uplink access point
    Station,
    /// Access point side, towards downstream clients and repeaters
    AccessPoint,
}

/// Traffic direction relative to the uplink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Uplink towards downstream clients
    Downstream,
    /// Downstream clients towards the uplink
    Upstream,
}

/// Connectivity changes reported by the radio driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectivityEvent {
    Associated {
        #[serde(default)]
        ssid: String,
        bssid: MacAddr,
        channel: u8,
    },
    Disassociated {
        #[serde(default)]
        ssid: String,
        reason: DisconnectReason,
    },
    AddressAcquired {
        ip: Ipv4Addr,
        mask: Ipv4Addr,
        gw: Ipv4Addr,
        /// First DNS server handed out by the uplink's DHCP, if any
        #[serde(default)]
        dns: Option<Ipv4Addr>,
    },
    StationJoinedAp {
        mac: MacAddr,
        #[serde(default)]
        aid: u8,
    },
    StationLeftAp {
        mac: MacAddr,
        #[serde(default)]
        aid: u8,
    },
    AuthModeChanged {
        old: AuthMode,
        new: AuthMode,
    },
}

/// One line on the radio feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RadioReport {
    ScanDone { records: Vec<ScanRecord> },
    ScanFailed,
    Event { event: ConnectivityEvent },
    Forwarded { direction: Direction, bytes: u64 },
}

#[cfg(feature = "std")]
impl RadioReport {
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}
