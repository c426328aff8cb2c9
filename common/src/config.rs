use serde::{Deserialize, Serialize};

/// Process-wide timing and safety limits. Fixed at startup; the runtime
/// never mutates these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolerConfig {
    pub control_tick_ms: u64,
    pub telemetry_interval_ms: u64,
    pub sensor_stale_timeout_ms: u64,
    pub min_valid_temp_c: f32,
    pub max_valid_temp_c: f32,
    pub device_id: String,
}

impl Default for CoolerConfig {
    fn default() -> Self {
        Self {
            control_tick_ms: 2_000,
            telemetry_interval_ms: 5_000,
            sensor_stale_timeout_ms: 30_000,
            min_valid_temp_c: -40.0,
            max_valid_temp_c: 85.0,
            device_id: "bme280-cooler".to_string(),
        }
    }
}

/// Runtime control settings, mutated only through command dispatch.
///
/// The start and stop thresholds are independent; each command validates its
/// own range and nothing enforces start > stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSettings {
    pub start_temp_c: f32,
    pub stop_temp_c: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub setpoint_c: f32,
    pub pid_enabled: bool,
    pub manual_override: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            start_temp_c: 4.5,
            stop_temp_c: 3.5,
            kp: 8.66,
            ki: 0.0121,
            kd: 774.21,
            setpoint_c: 4.0,
            pid_enabled: false,
            manual_override: false,
        }
    }
}
