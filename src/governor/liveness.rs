/// Slow ticks the reset line must stay asserted before a factory reset.
pub const RESET_HOLD_TICKS: u32 = 6;

/// A countdown decremented once per slow tick. Traffic refills it; reaching
/// exactly 0 is fatal. -1 disables it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Watchdog {
    remaining: i32,
}

impl Watchdog {
    pub const DISABLED: i32 = -1;

    pub fn new(budget: i32) -> Self {
        Self {
            remaining: budget.max(Self::DISABLED),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.remaining != Self::DISABLED
    }

    pub fn remaining(&self) -> i32 {
        self.remaining
    }

    /// Count one slow tick. Returns `true` once the counter sits at 0; the
    /// counter is left untouched in that case.
    pub fn tick(&mut self) -> bool {
        match self.remaining {
            Self::DISABLED => false,
            0 => true,
            _ => {
                self.remaining -= 1;
                false
            }
        }
    }

    /// Restart the countdown from `budget`. A disabled watchdog stays off.
    pub fn feed(&mut self, budget: i32) {
        if self.is_enabled() {
            self.remaining = budget.max(Self::DISABLED);
        }
    }
}

/// Debounces the factory reset line across slow ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResetLine {
    held: u32,
}

impl ResetLine {
    pub fn held(&self) -> u32 {
        self.held
    }

    /// Feed one sample. Returns `true` when the line has been asserted for
    /// more than [`RESET_HOLD_TICKS`] consecutive samples.
    pub fn sample(&mut self, asserted: bool) -> bool {
        if asserted {
            self.held = self.held.saturating_add(1);
        } else {
            self.held = 0;
        }
        self.held > RESET_HOLD_TICKS
    }
}

/// Supply voltage, smoothed as `v = (3v + new) / 4`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoltageAverage {
    millivolts: Option<u32>,
}

impl VoltageAverage {
    pub fn millivolts(&self) -> Option<u32> {
        self.millivolts
    }

    pub fn update(&mut self, sample: u32) -> u32 {
        let next = match self.millivolts {
            // Seeding with the first sample avoids ramping up from zero
            None => sample,
            Some(v) => ((3 * u64::from(v) + u64::from(sample)) / 4) as u32,
        };
        self.millivolts = Some(next);
        next
    }
}
