/// Bytes forwarded since the start of the current calendar day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DailyCounter {
    bytes_today: u64,
    last_day: Option<u8>,
}

impl DailyCounter {
    pub fn bytes_today(&self) -> u64 {
        self.bytes_today
    }

    pub fn last_day(&self) -> Option<u8> {
        self.last_day
    }

    pub fn record(&mut self, bytes: u64) {
        self.bytes_today = self.bytes_today.saturating_add(bytes);
    }

    /// Compare against the wall-clock day of month. Returns `true` when the
    /// day changed and the counter was zeroed.
    pub fn observe_day(&mut self, day: u8) -> bool {
        if self.last_day == Some(day) {
            return false;
        }
        self.bytes_today = 0;
        self.last_day = Some(day);
        true
    }

    /// A `limit` of 0 means no cap.
    pub fn exhausted(&self, limit: u64) -> bool {
        limit != 0 && self.bytes_today >= limit
    }
}
