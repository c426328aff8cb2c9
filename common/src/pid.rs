/// Sample interval of the regulator, independent of the caller's tick rate.
pub const PID_SAMPLE_INTERVAL_MS: u64 = 1_000;

const SAMPLE_INTERVAL_S: f32 = PID_SAMPLE_INTERVAL_MS as f32 / 1_000.0;
const INTEGRAL_LIMIT: f32 = 100.0;

/// PID regulator producing a 0..=100 % demand from a setpoint and the
/// current temperature.
///
/// `sample` recomputes only once per [`PID_SAMPLE_INTERVAL_MS`]; calls in
/// between return the stored output unchanged, which decouples the PID
/// cadence from the control tick cadence.
#[derive(Debug, Clone, Default)]
pub struct PidRegulator {
    error: f32,
    last_error: f32,
    integral: f32,
    derivative: f32,
    output: f32,
    last_sample_ms: u64,
}

impl PidRegulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, setpoint: f32, kp: f32, ki: f32, kd: f32, temp: f32, now_ms: u64) -> f32 {
        if now_ms.saturating_sub(self.last_sample_ms) < PID_SAMPLE_INTERVAL_MS {
            return self.output;
        }

        self.error = setpoint - temp;

        self.integral += self.error * SAMPLE_INTERVAL_S;
        self.integral = self.integral.clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);

        self.derivative = (self.error - self.last_error) / SAMPLE_INTERVAL_S;

        self.output = (kp * self.error + ki * self.integral + kd * self.derivative).clamp(0.0, 100.0);

        self.last_error = self.error;
        self.last_sample_ms = now_ms;

        self.output
    }

    /// Zeroes the accumulated state. Gains and setpoint live in
    /// [`crate::ControlSettings`] and are not touched here.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.derivative = 0.0;
        self.last_error = 0.0;
        self.output = 0.0;
    }

    pub fn error(&self) -> f32 {
        self.error
    }

    pub fn output(&self) -> f32 {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_stays_within_percent_range() {
        let mut pid = PidRegulator::new();
        let mut now = PID_SAMPLE_INTERVAL_MS;
        for temp in [-40.0, -10.0, 0.0, 4.0, 25.0, 85.0, -40.0, 85.0] {
            let out = pid.sample(4.0, 8.66, 0.0121, 774.21, temp, now);
            assert!((0.0..=100.0).contains(&out), "output {out} out of range");
            now += PID_SAMPLE_INTERVAL_MS;
        }
    }

    #[test]
    fn integral_clamps_under_sustained_error() {
        let mut pid = PidRegulator::new();
        let mut now = PID_SAMPLE_INTERVAL_MS;
        // Large constant error; unclamped the integral would reach 5000.
        for _ in 0..500 {
            pid.sample(4.0, 0.0, 1.0, 0.0, -6.0, now);
            assert!(pid.integral.abs() <= INTEGRAL_LIMIT);
            now += PID_SAMPLE_INTERVAL_MS;
        }
        assert_eq!(pid.integral, INTEGRAL_LIMIT);

        for _ in 0..500 {
            pid.sample(4.0, 0.0, 1.0, 0.0, 50.0, now);
            assert!(pid.integral.abs() <= INTEGRAL_LIMIT);
            now += PID_SAMPLE_INTERVAL_MS;
        }
        assert_eq!(pid.integral, -INTEGRAL_LIMIT);
    }

    #[test]
    fn resampling_within_interval_is_idempotent() {
        let mut pid = PidRegulator::new();
        let first = pid.sample(4.0, 8.66, 0.0121, 774.21, 8.0, 5_000);
        // Same timestamp plus anything below the interval returns the
        // stored output, even with a different reading.
        let second = pid.sample(4.0, 8.66, 0.0121, 774.21, 2.0, 5_500);
        assert_eq!(first, second);

        let third = pid.sample(4.0, 8.66, 0.0121, 774.21, 2.0, 6_000);
        assert_ne!(first, third);
    }

    #[test]
    fn reset_zeroes_accumulators_only() {
        let mut pid = PidRegulator::new();
        pid.sample(4.0, 8.66, 0.0121, 774.21, 10.0, 1_000);
        pid.sample(4.0, 8.66, 0.0121, 774.21, 9.0, 2_000);
        assert_ne!(pid.integral, 0.0);

        pid.reset();
        assert_eq!(pid.integral, 0.0);
        assert_eq!(pid.derivative, 0.0);
        assert_eq!(pid.last_error, 0.0);
        assert_eq!(pid.output(), 0.0);
    }

    #[test]
    fn error_tracks_setpoint_minus_temperature() {
        let mut pid = PidRegulator::new();
        pid.sample(4.0, 1.0, 0.0, 0.0, 1.5, 1_000);
        assert_eq!(pid.error(), 2.5);
    }
}
