//! The node actor. One [`Node`] owns the config and every runtime counter;
//! all mutation happens through its handlers, one message or tick at a time.

use std::{collections::BTreeMap, net::Ipv4Addr, ops::ControlFlow, sync::Arc};

use common::{Direction, MacAddr};
use log::{debug, error, info};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::{
    config::MeshConfig,
    governor::{DailyCounter, RateGovernor, ResetLine, VoltageAverage, Watchdog},
    irq::PinLatch,
    mesh::machine::{Decision, RebootCause},
    platform::Platform,
    NodeMessage,
};

mod boot;
mod events;
mod runtime;
mod tick;

pub use runtime::*;
pub use tick::{FAST_INTERVAL, SLOW_INTERVAL};

/// `Break` means the node must restart for the given cause.
pub type Flow<T = ()> = ControlFlow<RebootCause, T>;

/// Used downstream until a lease or the config says otherwise.
pub const DEFAULT_DNS: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// What the node currently knows about its uplink.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UplinkIdentity {
    pub connected: bool,
    pub channel: u8,
    pub bssid: MacAddr,
    pub ip: Option<Ipv4Addr>,
}

pub struct Node<P: Platform> {
    platform: P,
    config: MeshConfig,
    rng: StdRng,
    latch: Option<Arc<PinLatch>>,

    uplink: UplinkIdentity,
    dns: Ipv4Addr,
    ap_network_pending: bool,

    ap_watchdog: Watchdog,
    client_watchdog: Watchdog,
    reset_line: ResetLine,
    vdd: VoltageAverage,
    governor: RateGovernor,
    daily: DailyCounter,
    pin_edges: BTreeMap<u8, u64>,

    /// Alternates every tick; slow-path work runs when set
    slow: bool,
}

impl<P: Platform> Node<P> {
    pub fn new(platform: P, config: MeshConfig) -> Self {
        Self::with_rng(platform, config, StdRng::from_entropy())
    }

    pub fn with_rng(platform: P, config: MeshConfig, rng: StdRng) -> Self {
        Self {
            ap_watchdog: Watchdog::new(config.ap_watchdog),
            client_watchdog: Watchdog::new(config.client_watchdog),
            governor: RateGovernor::new(config.kbps_down, config.kbps_up),
            dns: config.dns_addr.unwrap_or(DEFAULT_DNS),
            platform,
            config,
            rng,
            latch: None,
            uplink: UplinkIdentity::default(),
            ap_network_pending: false,
            reset_line: ResetLine::default(),
            vdd: VoltageAverage::default(),
            daily: DailyCounter::default(),
            pin_edges: BTreeMap::new(),
            slow: false,
        }
    }

    /// Drain edges from `latch` when handling pin changes.
    pub fn with_latch(mut self, latch: Arc<PinLatch>) -> Self {
        self.latch = Some(latch);
        self
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn into_platform(self) -> P {
        self.platform
    }

    pub fn uplink(&self) -> &UplinkIdentity {
        &self.uplink
    }

    pub fn dns(&self) -> Ipv4Addr {
        self.dns
    }

    pub fn ap_watchdog(&self) -> &Watchdog {
        &self.ap_watchdog
    }

    pub fn client_watchdog(&self) -> &Watchdog {
        &self.client_watchdog
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    pub fn daily(&self) -> &DailyCounter {
        &self.daily
    }

    pub fn vdd(&self) -> &VoltageAverage {
        &self.vdd
    }

    pub fn pin_edges(&self, pin: u8) -> u64 {
        self.pin_edges.get(&pin).copied().unwrap_or(0)
    }

    /// Process one mailbox message.
    pub fn handle(&mut self, message: NodeMessage) -> Flow {
        match message {
            NodeMessage::ScanDone(records) => self.on_scan_done(&records),
            NodeMessage::ScanFailed => self.on_scan_failed(),
            NodeMessage::Connectivity(event) => self.on_event(event),
            NodeMessage::Forwarded { direction, bytes } => {
                self.record_forwarded(direction, bytes);
                ControlFlow::Continue(())
            }
            NodeMessage::Admit {
                direction,
                bytes,
                reply,
            } => {
                // The shaper may have given up waiting
                reply.send(self.admit(direction, bytes)).ok();
                ControlFlow::Continue(())
            }
            NodeMessage::PinsChanged => {
                self.drain_pins();
                ControlFlow::Continue(())
            }
        }
    }

    /// Spend tokens for `bytes` in `direction`. Refused once the daily cap is
    /// used up or the bucket runs dry.
    pub fn admit(&mut self, direction: Direction, bytes: u64) -> bool {
        if self.daily.exhausted(self.config.daily_limit) {
            debug!("Daily limit of {} bytes reached", self.config.daily_limit);
            return false;
        }
        self.governor.bucket_mut(direction).try_consume(bytes)
    }

    /// Account forwarded traffic. Traffic in a direction proves the peer on
    /// that side is alive and refills its watchdog.
    pub fn record_forwarded(&mut self, direction: Direction, bytes: u64) {
        self.daily.record(bytes);
        match direction {
            Direction::Downstream => self.ap_watchdog.feed(self.config.ap_watchdog),
            Direction::Upstream => self.client_watchdog.feed(self.config.client_watchdog),
        }
    }

    fn drain_pins(&mut self) {
        let Some(latch) = &self.latch else {
            return;
        };
        let mask = latch.take();
        if mask == 0 {
            return;
        }

        for pin in (0..32u8).filter(|pin| mask & (1 << pin) != 0) {
            let edges = self.pin_edges.entry(pin).or_default();
            *edges += 1;
            debug!("Edge on GPIO {} ({} so far)", pin, edges);
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.platform.persist(&self.config) {
            error!("Failed to persist config: {}", e);
        }
    }

    /// Carry out a state machine decision. Restarts always persist first,
    /// even if storage fails.
    fn apply(&mut self, decision: Decision) -> Flow {
        match decision {
            Decision::Stay => ControlFlow::Continue(()),
            Decision::Persist => {
                self.persist();
                ControlFlow::Continue(())
            }
            Decision::Restart(cause) => {
                info!("Persisting config before restart ({:?})", cause);
                self.persist();
                ControlFlow::Break(cause)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use rand::{rngs::StdRng, SeedableRng};

    use super::Node;
    use crate::{config::MeshConfig, platform::mock::MockPlatform};

    pub fn node(config: MeshConfig) -> Node<MockPlatform> {
        Node::with_rng(MockPlatform::default(), config, StdRng::seed_from_u64(42))
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::{mpsc, oneshot};

    use super::{test_support::node, *};
    use crate::irq::pin_mask;

    #[test]
    fn traffic_refills_the_matching_watchdog() {
        let mut node = node(MeshConfig {
            ap_watchdog: 10,
            client_watchdog: 20,
            ..MeshConfig::default()
        });
        for _ in 0..6 {
            assert!(node.on_tick(std::time::Instant::now()).is_continue());
        }
        assert_eq!(node.ap_watchdog().remaining(), 7);
        assert_eq!(node.client_watchdog().remaining(), 17);

        node.record_forwarded(Direction::Downstream, 1500);
        assert_eq!(node.ap_watchdog().remaining(), 10);
        assert_eq!(node.client_watchdog().remaining(), 17);

        node.record_forwarded(Direction::Upstream, 60);
        assert_eq!(node.client_watchdog().remaining(), 20);
        assert_eq!(node.daily().bytes_today(), 1560);
    }

    #[test]
    fn admit_respects_daily_cap() {
        let mut node = node(MeshConfig {
            daily_limit: 1000,
            ..MeshConfig::default()
        });

        assert!(node.admit(Direction::Upstream, 1500));
        node.record_forwarded(Direction::Upstream, 1000);
        assert!(!node.admit(Direction::Upstream, 1));
    }

    #[test]
    fn admit_debits_the_bucket() {
        let mut node = node(MeshConfig {
            kbps_down: 8,
            ..MeshConfig::default()
        });
        let start = std::time::Instant::now();
        node.governor.replenish(start);
        node.governor
            .replenish(start + std::time::Duration::from_millis(1000));

        assert!(node.admit(Direction::Downstream, 1000));
        assert!(!node.admit(Direction::Downstream, 1000));
        assert!(node.admit(Direction::Upstream, 1_000_000));
    }

    #[test]
    fn admit_message_replies() {
        let mut node = node(MeshConfig {
            kbps_up: 8,
            ..MeshConfig::default()
        });
        let (reply, answer) = oneshot::channel();

        let flow = node.handle(NodeMessage::Admit {
            direction: Direction::Upstream,
            bytes: 1,
            reply,
        });

        assert_eq!(flow, ControlFlow::Continue(()));
        assert_eq!(answer.blocking_recv(), Ok(false));
    }

    #[test]
    fn pin_changes_are_drained_in_the_node() {
        let (tx, mut rx) = mpsc::channel(4);
        let latch = Arc::new(PinLatch::new(tx));
        let mut node = node(MeshConfig::default()).with_latch(latch.clone());

        latch.capture(pin_mask(4).unwrap());
        latch.capture(pin_mask(4).unwrap() | pin_mask(27).unwrap());
        let message = rx.try_recv().unwrap();

        assert_eq!(node.handle(message), ControlFlow::Continue(()));
        assert_eq!(node.pin_edges(4), 1);
        assert_eq!(node.pin_edges(27), 1);
        assert_eq!(node.pin_edges(5), 0);
        assert_eq!(latch.take(), 0);
    }

    #[test]
    fn failed_persist_still_restarts() {
        let mut node = node(MeshConfig::default());
        node.platform_mut().fail_persist = true;

        let flow = node.apply(Decision::Restart(RebootCause::ResetButton));

        assert_eq!(flow, ControlFlow::Break(RebootCause::ResetButton));
        assert!(node.platform().persisted.is_empty());
    }
}
