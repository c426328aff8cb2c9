use serde::{Deserialize, Serialize};

/// Active control mode, derived from the two settings flags. Manual override
/// wins over both automatic modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolerMode {
    Manual,
    Pid,
    Auto,
}

impl CoolerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Pid => "PID",
            Self::Auto => "AUTO",
        }
    }
}

/// Side effects the core asks the host to perform. The engine itself never
/// touches the relay or the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolerAction {
    RelayOn,
    RelayOff,
    PublishTelemetry,
}

/// Snapshot served by the HTTP status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CoolerStatus {
    pub mode: &'static str,
    #[serde(rename = "coolerRunning")]
    pub cooler_running: bool,
    #[serde(rename = "everStarted")]
    pub ever_started: bool,
    #[serde(rename = "uptimeS")]
    pub uptime_s: u64,
    #[serde(rename = "runtimeS")]
    pub runtime_s: u64,
    #[serde(rename = "totalElapsedS")]
    pub total_elapsed_s: u64,
    #[serde(rename = "currentTemp")]
    pub current_temp: f32,
    #[serde(rename = "sensorValid")]
    pub sensor_valid: bool,
    #[serde(rename = "startTemp")]
    pub start_temp: f32,
    #[serde(rename = "stopTemp")]
    pub stop_temp: f32,
    #[serde(rename = "pidEnabled")]
    pub pid_enabled: bool,
    #[serde(rename = "pidSetpoint")]
    pub pid_setpoint: f32,
    #[serde(rename = "pidOutput")]
    pub pid_output: f32,
}

/// Flat record published over MQTT and returned by `AT+DATA`. Field names
/// match the original firmware payload so the recorder keeps working.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub temperature: f32,
    pub humidity: f32,
    pub pressure: f32,
    pub timestamp: u64,
    pub device: String,
    pub cooler_running: bool,
    pub cooler_runtime: u64,
    pub total_elapsed_time: u64,
    pub cooler_ever_started: bool,
    pub manual_override: bool,
    pub pid_enabled: bool,
    pub pid_setpoint: f32,
    pub pid_output: f32,
    pub pid_error: f32,
    pub pid_kp: f32,
    pub pid_ki: f32,
    pub pid_kd: f32,
}

/// One-decimal rounding applied to sensor values before they go on the wire.
pub fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round1(21.349), 21.3);
        assert_eq!(round1(21.36), 21.4);
        assert_eq!(round1(-0.04), -0.0);
    }

    #[test]
    fn status_mode_serializes_via_as_str() {
        let status = CoolerStatus {
            mode: CoolerMode::Pid.as_str(),
            cooler_running: true,
            ever_started: true,
            uptime_s: 60,
            runtime_s: 12,
            total_elapsed_s: 40,
            current_temp: 4.2,
            sensor_valid: true,
            start_temp: 4.5,
            stop_temp: 3.5,
            pid_enabled: true,
            pid_setpoint: 4.0,
            pid_output: 80.0,
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&status).unwrap()).unwrap();
        assert_eq!(json["mode"], "PID");
        assert_eq!(json["coolerRunning"], true);
    }

    #[test]
    fn telemetry_field_names_match_wire_format() {
        let record = TelemetryRecord {
            temperature: 4.2,
            humidity: 41.0,
            pressure: 1013.2,
            timestamp: 17,
            device: "bme280-cooler".to_string(),
            cooler_running: true,
            cooler_runtime: 12,
            total_elapsed_time: 30,
            cooler_ever_started: true,
            manual_override: false,
            pid_enabled: false,
            pid_setpoint: 4.0,
            pid_output: 0.0,
            pid_error: 0.0,
            pid_kp: 8.66,
            pid_ki: 0.0121,
            pid_kd: 774.21,
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
        assert_eq!(json["cooler_running"], true);
        assert_eq!(json["total_elapsed_time"], 30);
        assert_eq!(json["pid_setpoint"], 4.0);
        assert_eq!(json["device"], "bme280-cooler");
    }
}
