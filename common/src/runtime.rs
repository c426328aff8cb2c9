/// Relay state plus the run-time accounting that feeds telemetry.
///
/// The accounting has deliberate single-era semantics inherited from the
/// shipped firmware: `start_ms` is captured on the first activation only and
/// is never reset when the cooler stops, so `total_elapsed_ms` measures time
/// since first activation and `run_time_ms` the running time up to the last
/// stop. Product owner has not signed off on changing this, so it stays.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActuatorState {
    pub running: bool,
    pub ever_started: bool,
    pub start_ms: u64,
    pub run_time_ms: u64,
    pub total_elapsed_ms: u64,
}

impl ActuatorState {
    /// Marks the cooler running; captures the era start on first activation.
    pub fn mark_started(&mut self, now_ms: u64) {
        self.running = true;
        if !self.ever_started {
            self.start_ms = now_ms;
            self.ever_started = true;
        }
    }

    /// Marks the cooler stopped. `start_ms` is intentionally left alone.
    pub fn mark_stopped(&mut self) {
        self.running = false;
    }

    /// Advances the accumulators. Before the first activation both stay
    /// zero; afterwards `total_elapsed_ms` tracks the clock unconditionally
    /// and `run_time_ms` only advances while running.
    pub fn update(&mut self, now_ms: u64) {
        if !self.ever_started {
            return;
        }

        self.total_elapsed_ms = now_ms.saturating_sub(self.start_ms);
        if self.running {
            self.run_time_ms = self.total_elapsed_ms;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
