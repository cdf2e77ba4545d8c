//! Host frame timestamps to fixed simulation steps

use crate::consts::{MAX_FRAME_DT, MAX_SUBSTEPS, SIM_DT};

/// Tracks the last animation-frame timestamp and the fixed-step accumulator
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_time: Option<f64>,
    accumulator: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a frame timestamp (ms); returns how many `SIM_DT` steps to run.
    /// The first frame after `stop` only records the timestamp.
    pub fn advance(&mut self, timestamp_ms: f64) -> u32 {
        let Some(last) = self.last_time.replace(timestamp_ms) else {
            return 0;
        };

        let dt = (((timestamp_ms - last) / 1000.0) as f32).clamp(0.0, MAX_FRAME_DT);
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        if substeps == MAX_SUBSTEPS {
            // Drop the backlog instead of spiralling
            self.accumulator = self.accumulator.min(SIM_DT);
        }
        substeps
    }

    /// Forget the last timestamp so a resumed loop does not see a stale delta
    pub fn stop(&mut self) {
        self.last_time = None;
        self.accumulator = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.last_time.is_some()
    }
}
