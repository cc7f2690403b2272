//! Per-block timing collected on the audio thread

use std::time::Duration;

/// Counters for one run, updated without allocation
#[derive(Debug, Default, Clone)]
pub struct BlockStats {
    pub blocks: u64,
    pub total: Duration,
    pub max: Duration,
    /// Blocks whose processing took longer than the block duration
    pub overruns: u64,
    /// Blocks that started without a full input block available
    pub underruns: u64,
    /// Output samples that did not fit the output ring
    pub dropped_samples: u64,
}

impl BlockStats {
    #[inline]
    pub fn record(&mut self, elapsed: Duration, deadline: Duration) {
        self.blocks += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
        if elapsed > deadline {
            self.overruns += 1;
        }
    }

    pub fn average(&self) -> Duration {
        if self.blocks == 0 {
            Duration::ZERO
        } else {
            self.total / self.blocks as u32
        }
    }

    /// Worst-case share of the deadline used by one block
    pub fn peak_load(&self, deadline: Duration) -> f64 {
        if deadline.is_zero() {
            return 0.0;
        }
        self.max.as_secs_f64() / deadline.as_secs_f64()
    }
}
