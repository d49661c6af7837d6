use std::{collections::HashMap, net::Ipv4Addr};

use common::Interface;

use super::{ApNetworkPlan, Intercept, Platform, RadioMode, SoftApSettings, StationSettings};
use crate::{
    config::{MeshConfig, PortMap},
    error::MeshError,
    mesh::machine::RebootCause,
    node::UplinkIdentity,
};

/// One request the node made.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    StartScan,
    RadioMode(RadioMode),
    Station(StationSettings),
    SoftAp(SoftApSettings),
    ApNetwork(ApNetworkPlan),
    Dns(Ipv4Addr),
    Intercept(Interface, Intercept),
    PortMaps(Vec<PortMap>),
    NodeReady(UplinkIdentity),
    Output(u8, bool),
}

/// Records every request and serves canned inputs.
#[derive(Default)]
pub struct MockPlatform {
    pub calls: Vec<Call>,
    pub persisted: Vec<MeshConfig>,
    pub fail_persist: bool,
    pub intercepts: HashMap<Interface, Intercept>,
    pub levels: HashMap<u8, bool>,
    pub vdd: Option<u32>,
    pub day: Option<u8>,
}

impl MockPlatform {
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|&call| predicate(call)).count()
    }

    pub fn scans(&self) -> usize {
        self.count(|call| matches!(call, Call::StartScan))
    }
}

impl Platform for MockPlatform {
    fn persist(&mut self, config: &MeshConfig) -> Result<(), MeshError> {
        if self.fail_persist {
            return Err(MeshError::InvalidConfig("storage offline".to_string()));
        }
        self.persisted.push(config.clone());
        Ok(())
    }

    fn hard_reset(&mut self, cause: RebootCause) -> ! {
        panic!("hard reset: {:?}", cause)
    }

    fn start_scan(&mut self) {
        self.calls.push(Call::StartScan);
    }

    fn set_radio_mode(&mut self, mode: RadioMode) {
        self.calls.push(Call::RadioMode(mode));
    }

    fn configure_station(&mut self, settings: &StationSettings) {
        self.calls.push(Call::Station(settings.clone()));
    }

    fn configure_soft_ap(&mut self, settings: &SoftApSettings) {
        self.calls.push(Call::SoftAp(settings.clone()));
    }

    fn configure_ap_network(&mut self, plan: &ApNetworkPlan) {
        self.calls.push(Call::ApNetwork(plan.clone()));
    }

    fn set_downstream_dns(&mut self, dns: Ipv4Addr) {
        self.calls.push(Call::Dns(dns));
    }

    fn installed_intercept(&self, iface: Interface) -> Option<Intercept> {
        self.intercepts.get(&iface).copied()
    }

    fn install_intercept(&mut self, iface: Interface, intercept: Intercept) {
        self.intercepts.insert(iface, intercept);
        self.calls.push(Call::Intercept(iface, intercept));
    }

    fn refresh_port_maps(&mut self, maps: &[PortMap]) {
        self.calls.push(Call::PortMaps(maps.to_vec()));
    }

    fn node_ready(&mut self, uplink: &UplinkIdentity) {
        self.calls.push(Call::NodeReady(uplink.clone()));
    }

    fn input_level(&mut self, pin: u8) -> bool {
        self.levels.get(&pin).copied().unwrap_or(true)
    }

    fn set_output(&mut self, pin: u8, high: bool) {
        self.calls.push(Call::Output(pin, high));
    }

    fn sample_vdd_millivolts(&mut self) -> Option<u32> {
        self.vdd
    }

    fn calendar_day(&self) -> Option<u8> {
        self.day
    }
}
