use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    net::Ipv4Addr,
    path::PathBuf,
};

use chrono::{Datelike, Local};
use common::Interface;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::{ApNetworkPlan, Intercept, Platform, RadioMode, SoftApSettings, StationSettings};
use crate::{
    config::{MeshConfig, PortMap, RonFileStore},
    error::MeshError,
    mesh::machine::RebootCause,
    node::UplinkIdentity,
};

#[cfg(feature = "pi")]
use super::PiBoard;

/// Exit status asking the service manager for a restart.
pub const RESTART_EXIT_CODE: i32 = 75;

/// Requests sent to the radio driver, one JSON object per line.
#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum NodeCommand<'a> {
    StartScan,
    SetRadioMode { mode: RadioMode },
    ConfigureStation { settings: &'a StationSettings },
    ConfigureSoftAp { settings: &'a SoftApSettings },
    ConfigureApNetwork { plan: &'a ApNetworkPlan },
    SetDownstreamDns { dns: Ipv4Addr },
    InstallIntercept { iface: Interface, nat: bool },
    RefreshPortMaps { maps: &'a [PortMap] },
    NodeReady { uplink: &'a UplinkIdentity },
}

/// Runs the node as a process: config in a RON file, radio commands on a
/// line-oriented writer (stdout unless told otherwise).
pub struct HostPlatform {
    store: RonFileStore,
    commands: Box<dyn Write + Send>,
    intercepts: HashMap<Interface, Intercept>,
    vdd_source: Option<PathBuf>,
    #[cfg(feature = "pi")]
    board: Option<PiBoard>,
}

impl HostPlatform {
    pub fn new(store: RonFileStore) -> Self {
        Self {
            store,
            commands: Box::new(io::stdout()),
            intercepts: HashMap::new(),
            vdd_source: None,
            #[cfg(feature = "pi")]
            board: None,
        }
    }

    pub fn with_commands(mut self, commands: impl Write + Send + 'static) -> Self {
        self.commands = Box::new(commands);
        self
    }

    /// Read supply voltage from a sysfs file holding millivolts, such as a
    /// hwmon `in*_input` node.
    pub fn with_vdd_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.vdd_source = Some(path.into());
        self
    }

    #[cfg(feature = "pi")]
    pub fn with_board(mut self, board: PiBoard) -> Self {
        self.board = Some(board);
        self
    }

    pub fn store(&self) -> &RonFileStore {
        &self.store
    }

    fn emit(&mut self, command: NodeCommand<'_>) {
        if let Err(e) = self.write_command(&command) {
            error!("Failed to send {:?}: {}", command, e);
        }
    }

    fn write_command(&mut self, command: &NodeCommand<'_>) -> Result<(), MeshError> {
        let line = serde_json::to_string(command)?;
        writeln!(self.commands, "{}", line)?;
        self.commands.flush()?;
        Ok(())
    }
}

impl Platform for HostPlatform {
    fn persist(&mut self, config: &MeshConfig) -> Result<(), MeshError> {
        self.store.save(config)?;
        debug!("Config written to {}", self.store.path().display());
        Ok(())
    }

    fn hard_reset(&mut self, cause: RebootCause) -> ! {
        warn!("Restarting: {:?}", cause);
        self.commands.flush().ok();
        log::logger().flush();
        std::process::exit(RESTART_EXIT_CODE)
    }

    fn start_scan(&mut self) {
        self.emit(NodeCommand::StartScan);
    }

    fn set_radio_mode(&mut self, mode: RadioMode) {
        self.emit(NodeCommand::SetRadioMode { mode });
    }

    fn configure_station(&mut self, settings: &StationSettings) {
        self.emit(NodeCommand::ConfigureStation { settings });
    }

    fn configure_soft_ap(&mut self, settings: &SoftApSettings) {
        self.emit(NodeCommand::ConfigureSoftAp { settings });
    }

    fn configure_ap_network(&mut self, plan: &ApNetworkPlan) {
        self.emit(NodeCommand::ConfigureApNetwork { plan });
    }

    fn set_downstream_dns(&mut self, dns: Ipv4Addr) {
        self.emit(NodeCommand::SetDownstreamDns { dns });
    }

    fn installed_intercept(&self, iface: Interface) -> Option<Intercept> {
        self.intercepts.get(&iface).copied()
    }

    fn install_intercept(&mut self, iface: Interface, intercept: Intercept) {
        self.intercepts.insert(iface, intercept);
        self.emit(NodeCommand::InstallIntercept {
            iface,
            nat: intercept.nat,
        });
    }

    fn refresh_port_maps(&mut self, maps: &[PortMap]) {
        self.emit(NodeCommand::RefreshPortMaps { maps });
    }

    fn node_ready(&mut self, uplink: &UplinkIdentity) {
        info!("Node ready");
        self.emit(NodeCommand::NodeReady { uplink });
    }

    fn input_level(&mut self, _pin: u8) -> bool {
        #[cfg(feature = "pi")]
        if let Some(board) = &self.board {
            return board.input_level(_pin);
        }

        // Lines idle high, matching the pull-ups on real hardware
        true
    }

    fn set_output(&mut self, _pin: u8, _high: bool) {
        #[cfg(feature = "pi")]
        if let Some(board) = &mut self.board {
            board.set_output(_pin, _high);
        }
    }

    fn sample_vdd_millivolts(&mut self) -> Option<u32> {
        let path = self.vdd_source.as_ref()?;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Vdd read from {} failed: {}", path.display(), e);
                return None;
            }
        };

        match raw.trim().parse() {
            Ok(millivolts) => Some(millivolts),
            Err(e) => {
                debug!("Vdd in {} is not millivolts ({:?}): {}", path.display(), raw, e);
                None
            }
        }
    }

    fn calendar_day(&self) -> Option<u8> {
        Some(Local::now().day() as u8)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// A writer the test can read back after handing it to the platform.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn platform(name: &str) -> (HostPlatform, SharedBuffer) {
        let path = std::env::temp_dir().join(format!(
            "mesh-repeater-host-{}-{}.ron",
            name,
            std::process::id()
        ));
        let buffer = SharedBuffer::default();
        let platform = HostPlatform::new(RonFileStore::new(path)).with_commands(buffer.clone());
        (platform, buffer)
    }

    #[test]
    fn commands_are_json_lines() {
        let (mut platform, buffer) = platform("commands");

        platform.start_scan();
        platform.set_radio_mode(RadioMode::StationOnly);
        platform.set_downstream_dns(Ipv4Addr::new(8, 8, 8, 8));

        let lines = buffer.lines();
        assert_eq!(lines[0], r#"{"command":"start_scan"}"#);
        assert_eq!(
            lines[1],
            r#"{"command":"set_radio_mode","mode":"station_only"}"#
        );
        assert_eq!(
            lines[2],
            r#"{"command":"set_downstream_dns","dns":"8.8.8.8"}"#
        );
    }

    #[test]
    fn intercepts_are_remembered() {
        let (mut platform, buffer) = platform("intercepts");
        assert_eq!(platform.installed_intercept(Interface::Station), None);

        platform.install_intercept(Interface::AccessPoint, Intercept { nat: true });

        assert_eq!(
            platform.installed_intercept(Interface::AccessPoint),
            Some(Intercept { nat: true })
        );
        assert_eq!(platform.installed_intercept(Interface::Station), None);
        assert_eq!(
            buffer.lines(),
            vec![r#"{"command":"install_intercept","iface":"access_point","nat":true}"#]
        );
    }

    #[test]
    fn persist_writes_the_store() {
        let (mut platform, _) = platform("persist");
        let config = MeshConfig {
            ssid: "Home".to_string(),
            ..MeshConfig::default()
        };

        platform.persist(&config).unwrap();

        assert_eq!(platform.store().load_or_default().unwrap(), config);
        std::fs::remove_file(platform.store().path()).ok();
    }

    #[test]
    fn vdd_is_read_from_the_source_file() {
        let path = std::env::temp_dir().join(format!("mesh-repeater-vdd-{}", std::process::id()));
        std::fs::write(&path, "3312\n").unwrap();
        let (platform, _) = platform("vdd");
        let mut platform = platform.with_vdd_source(&path);

        assert_eq!(platform.sample_vdd_millivolts(), Some(3312));

        std::fs::write(&path, "n/a\n").unwrap();
        assert_eq!(platform.sample_vdd_millivolts(), None);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn vdd_is_unknown_without_a_readable_source() {
        let (mut platform, _) = platform("no-vdd");
        assert_eq!(platform.sample_vdd_millivolts(), None);

        let missing = std::env::temp_dir().join("mesh-repeater-vdd-missing/in0_input");
        let mut platform = platform.with_vdd_source(missing);
        assert_eq!(platform.sample_vdd_millivolts(), None);
    }

    #[test]
    fn day_of_month_is_known() {
        let (platform, _) = platform("day");
        let day = platform.calendar_day().unwrap();
        assert!((1..=31).contains(&day));
    }
}
