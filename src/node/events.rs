use std::{net::Ipv4Addr, ops::ControlFlow};

use common::{ConnectivityEvent, Interface, ScanRecord};
use log::{debug, info, warn};

use super::{Flow, Node, UplinkIdentity};
use crate::{
    config::AutomeshMode,
    mesh::prelude::*,
    platform::{Intercept, Platform, RadioMode, SoftApSettings},
};

impl<P: Platform> Node<P> {
    pub(super) fn on_scan_done(&mut self, records: &[ScanRecord]) -> Flow {
        if self.config.mode != AutomeshMode::Learning {
            debug!("Ignoring {} scan results outside learning", records.len());
            return ControlFlow::Continue(());
        }

        let Some(election) = elect(records, &self.config.ssid, self.config.rssi_threshold) else {
            info!("No uplink advertising {} in range, scanning again", self.config.ssid);
            self.platform.start_scan();
            return ControlFlow::Continue(());
        };

        let identity = NodeIdentity::assign(election.own_depth, &mut self.rng);
        let decision = commit_election(&mut self.config, &election, &identity);
        self.platform
            .configure_soft_ap(&SoftApSettings::from_config(&self.config));
        self.apply(decision)
    }

    pub(super) fn on_scan_failed(&mut self) -> Flow {
        warn!("Scan failed");
        if self.config.mode == AutomeshMode::Learning {
            self.platform.start_scan();
        }
        ControlFlow::Continue(())
    }

    pub(super) fn on_event(&mut self, event: ConnectivityEvent) -> Flow {
        match event {
            ConnectivityEvent::Associated {
                ssid,
                bssid,
                channel,
            } => {
                info!("Connected to ssid {} via {}, channel {}", ssid, bssid, channel);
                self.uplink.bssid = bssid;
                self.uplink.channel = channel;
                let decision = on_associated(&mut self.config, bssid);
                self.apply(decision)
            }
            ConnectivityEvent::Disassociated { ssid, reason } => {
                info!("Disconnected from ssid {}, reason {}", ssid, reason);
                self.uplink = UplinkIdentity::default();

                let outcome = on_disassociated(&mut self.config, reason);
                if outcome.station_only {
                    self.platform.set_radio_mode(RadioMode::StationOnly);
                }
                self.apply(outcome.decision)
            }
            ConnectivityEvent::AddressAcquired { ip, mask, gw, dns } => {
                self.on_address_acquired(ip, mask, gw, dns)
            }
            ConnectivityEvent::StationJoinedAp { mac, aid } => {
                info!("Station {} joined, AID = {}", mac, aid);
                self.ensure_intercept(
                    Interface::AccessPoint,
                    Intercept {
                        nat: self.config.nat_enable,
                    },
                );
                ControlFlow::Continue(())
            }
            ConnectivityEvent::StationLeftAp { mac, aid } => {
                info!("Station {} left, AID = {}", mac, aid);
                ControlFlow::Continue(())
            }
            ConnectivityEvent::AuthModeChanged { .. } => ControlFlow::Continue(()),
        }
    }

    fn on_address_acquired(
        &mut self,
        ip: Ipv4Addr,
        mask: Ipv4Addr,
        gw: Ipv4Addr,
        lease_dns: Option<Ipv4Addr>,
    ) -> Flow {
        info!("ip: {}, mask: {}, gw: {}", ip, mask, gw);

        // A configured server always wins over the one from the lease
        if let Some(dns) = self.config.dns_addr.or(lease_dns) {
            self.dns = dns;
        }
        self.platform.set_downstream_dns(self.dns);

        self.uplink.ip = Some(ip);
        self.uplink.connected = true;

        self.ensure_intercept(Interface::Station, Intercept { nat: false });
        self.ensure_intercept(
            Interface::AccessPoint,
            Intercept {
                nat: self.config.nat_enable,
            },
        );

        if !self.config.port_maps.is_empty() {
            for map in &mut self.config.port_maps {
                map.mapped_addr = ip;
            }
            self.platform.refresh_port_maps(&self.config.port_maps);
        }

        if self.config.mode == AutomeshMode::Operational && self.config.ap_on {
            // Brings the AP back after a station-only disconnect
            self.platform.set_radio_mode(RadioMode::StationAp);
        }
        let decision = confirm_uplink(&mut self.config);
        let flow = self.apply(decision);

        self.platform.node_ready(&self.uplink);
        flow
    }

    /// Install `intercept` on `iface` unless it is already in place.
    fn ensure_intercept(&mut self, iface: Interface, intercept: Intercept) {
        if self.platform.installed_intercept(iface) == Some(intercept) {
            return;
        }
        info!(
            "Installing {} hook on {:?}",
            if intercept.nat { "NAT" } else { "bridge" },
            iface
        );
        self.platform.install_intercept(iface, intercept);
    }
}
