use log::{info, warn};

use super::{Node, DEFAULT_DNS};
use crate::{
    config::AutomeshMode,
    mesh::machine::operational_invariant_holds,
    platform::{Platform, RadioMode, SoftApSettings, StationSettings},
};

impl<P: Platform> Node<P> {
    /// Bring the radio up from the loaded config.
    ///
    /// Automesh owns the AP side: it mirrors the uplink credentials so the
    /// whole tree shares one ssid. A learning node keeps its AP down and
    /// does not join anything until it has elected an uplink.
    pub fn boot(&mut self) {
        let config = &mut self.config;
        info!("Booting in automesh mode {:?}", config.mode);

        if config.mode != AutomeshMode::Off {
            config.ap_ssid = config.ssid.clone();
            config.ap_password = config.password.clone();
        }
        match config.mode {
            AutomeshMode::Learning => {
                config.ap_on = false;
                config.auto_connect = false;
            }
            AutomeshMode::Operational => {
                config.ap_on = true;
                config.auto_connect = true;
                config.ap_open = config.password.starts_with("none");
            }
            AutomeshMode::Off => {}
        }

        if !operational_invariant_holds(&self.config) {
            warn!(
                "Operational without a locked uplink or tagged AP MAC ({} / {})",
                self.config.locked_bssid, self.config.ap_mac
            );
        }

        self.dns = self.config.dns_addr.unwrap_or(DEFAULT_DNS);

        self.platform
            .configure_station(&StationSettings::from_config(&self.config));

        if self.config.ap_on {
            self.platform.set_radio_mode(RadioMode::StationAp);
            self.platform
                .configure_soft_ap(&SoftApSettings::from_config(&self.config));
            self.ap_network_pending = true;
        } else {
            self.platform.set_radio_mode(RadioMode::StationOnly);
        }

        if let Some(led) = self.config.status_led {
            self.platform.set_output(led, false);
        }

        if self.config.mode == AutomeshMode::Learning {
            info!("Scanning for uplinks advertising {}", self.config.ssid);
            self.platform.start_scan();
        }
    }
}

#[cfg(test)]
mod tests {
    use common::MacAddr;

    use super::*;
    use crate::{
        config::MeshConfig,
        node::test_support::node,
        platform::mock::Call,
    };

    #[test]
    fn learning_boots_station_only_and_scans() {
        let mut node = node(MeshConfig {
            ssid: "Mesh".to_string(),
            password: "secret".to_string(),
            mode: AutomeshMode::Learning,
            ..MeshConfig::default()
        });

        node.boot();

        let config = node.config();
        assert!(!config.ap_on);
        assert!(!config.auto_connect);
        assert_eq!(config.ap_ssid, "Mesh");
        assert_eq!(config.ap_password, "secret");

        let platform = node.platform();
        assert!(platform
            .calls
            .contains(&Call::RadioMode(RadioMode::StationOnly)));
        assert_eq!(platform.scans(), 1);
        assert_eq!(platform.count(|call| matches!(call, Call::SoftAp(_))), 0);
        assert!(platform.persisted.is_empty());
    }

    #[test]
    fn operational_boots_station_ap_with_pending_network() {
        let mut node = node(MeshConfig {
            ssid: "Mesh".to_string(),
            password: "none".to_string(),
            mode: AutomeshMode::Operational,
            checked: true,
            locked_bssid: MacAddr([0xaa, 0xbb, 0xcc, 0, 0, 1]),
            ap_mac: MacAddr([0x24, 0x24, 0x01, 1, 2, 3]),
            ap_on: false,
            ap_open: false,
            status_led: Some(27),
            ..MeshConfig::default()
        });

        node.boot();

        assert!(node.config().ap_on);
        assert!(node.config().ap_open);
        assert!(node.ap_network_pending);

        let calls = &node.platform().calls;
        assert!(matches!(&calls[0], Call::Station(settings)
            if settings.bssid == Some(MacAddr([0xaa, 0xbb, 0xcc, 0, 0, 1])) && settings.auto_connect));
        assert_eq!(calls[1], Call::RadioMode(RadioMode::StationAp));
        assert!(matches!(&calls[2], Call::SoftAp(settings)
            if settings.ssid == "Mesh"
                && settings.password.is_none()
                && settings.mac == Some(MacAddr([0x24, 0x24, 0x01, 1, 2, 3]))));
        assert_eq!(calls[3], Call::Output(27, false));
        assert_eq!(node.platform().scans(), 0);
    }

    #[test]
    fn off_leaves_the_ap_alone() {
        let mut node = node(MeshConfig {
            ap_ssid: "Guest".to_string(),
            dns_addr: Some(std::net::Ipv4Addr::new(1, 1, 1, 1)),
            ..MeshConfig::default()
        });

        node.boot();

        assert_eq!(node.config().ap_ssid, "Guest");
        assert_eq!(node.dns(), std::net::Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(node.platform().scans(), 0);
    }
}
