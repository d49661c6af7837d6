/// Burst ceiling of a bucket, in seconds worth of its rate.
pub const MAX_TOKEN_RATIO: u64 = 2;

/// A byte budget refilled at a fixed rate. The node only ever refills it;
/// the traffic shaper is the one that spends it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenBucket {
    /// Bytes per second; 0 means unlimited
    rate: u64,
    tokens: u64,
    /// Sub-byte remainder of previous refills, in thousandths of a byte
    carry: u64,
}

impl TokenBucket {
    pub fn from_kbps(kbps: u32) -> Self {
        Self {
            rate: u64::from(kbps) * 1024 / 8,
            tokens: 0,
            carry: 0,
        }
    }

    pub fn is_limited(&self) -> bool {
        self.rate != 0
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn ceiling(&self) -> u64 {
        MAX_TOKEN_RATIO * self.rate
    }

    /// Add the tokens earned over `elapsed_ms`. Fractions of a byte carry
    /// over, so many short refills add up to the same as one long one.
    pub fn replenish(&mut self, elapsed_ms: u64) {
        if !self.is_limited() {
            return;
        }

        let earned = elapsed_ms.saturating_mul(self.rate).saturating_add(self.carry);
        self.tokens = self.tokens.saturating_add(earned / 1000);
        self.carry = earned % 1000;

        if self.tokens >= self.ceiling() {
            self.tokens = self.ceiling();
            self.carry = 0;
        }
    }

    /// Spend `bytes` if the bucket holds them. Unlimited buckets always admit.
    pub fn try_consume(&mut self, bytes: u64) -> bool {
        if !self.is_limited() {
            return true;
        }
        if self.tokens < bytes {
            return false;
        }
        self.tokens -= bytes;
        true
    }
}
