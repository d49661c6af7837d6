use std::{ops::ControlFlow, time::Duration, time::Instant};

use log::{debug, error, info, trace, warn};

use super::{Flow, Node};
use crate::{
    mesh::machine::{Decision, RebootCause},
    platform::{ApNetworkPlan, Platform},
};

/// Wait after a fast tick.
pub const FAST_INTERVAL: Duration = Duration::from_millis(100);
/// Wait after a slow tick; together with the fast one a 1 s period.
pub const SLOW_INTERVAL: Duration = Duration::from_millis(900);

impl<P: Platform> Node<P> {
    /// Run one supervisory tick and return how long to wait before the
    /// next one.
    ///
    /// Ticks alternate between fast and slow. The slow ones do the liveness
    /// and housekeeping work once a second; token refill happens on every
    /// tick from the real elapsed time.
    pub fn on_tick(&mut self, now: Instant) -> Flow<Duration> {
        self.slow = !self.slow;
        self.drain_pins();

        if self.slow {
            self.slow_tick()?;
        }

        // Lit through the long wait when connected, so it blinks once a second
        if let Some(led) = self.config.status_led {
            self.platform
                .set_output(led, self.slow && self.uplink.connected);
        }

        self.governor.replenish(now);

        ControlFlow::Continue(if self.slow {
            SLOW_INTERVAL
        } else {
            FAST_INTERVAL
        })
    }

    fn slow_tick(&mut self) -> Flow {
        if self.ap_watchdog.tick() {
            error!("AP watchdog expired, no traffic from the uplink");
            return ControlFlow::Break(RebootCause::ApWatchdog);
        }
        if self.client_watchdog.tick() {
            error!("Client watchdog expired, no traffic from downstream");
            return ControlFlow::Break(RebootCause::ClientWatchdog);
        }

        if let Some(pin) = self.config.reset_pin {
            // Active low: the button pulls the line to ground
            let asserted = !self.platform.input_level(pin);
            if self.reset_line.sample(asserted) {
                warn!("Reset line held for {} s, factory reset", self.reset_line.held());
                if let Some(led) = self.config.status_led {
                    self.platform.set_output(led, true);
                }
                self.config.factory_reset();
                return self.apply(Decision::Restart(RebootCause::ResetButton));
            }
        }

        if let Some(sample) = self.platform.sample_vdd_millivolts() {
            let average = self.vdd.update(sample);
            trace!("Vdd {} mV (avg {} mV)", sample, average);
        }

        if self.ap_network_pending {
            self.ap_network_pending = false;
            let plan = ApNetworkPlan::for_config(&self.config, self.dns);
            info!(
                "AP network {}/24, DHCP {} - {}",
                plan.gateway, plan.dhcp_start, plan.dhcp_end
            );
            self.platform.configure_ap_network(&plan);
        }

        if self.config.daily_limit != 0 {
            if let Some(day) = self.platform.calendar_day() {
                if self.daily.observe_day(day) {
                    debug!("Day {} started, daily byte counter cleared", day);
                }
            }
        }

        ControlFlow::Continue(())
    }
}
