use crate::{
    config::{ControlSettings, CoolerConfig},
    pid::PidRegulator,
    runtime::ActuatorState,
    types::{round1, CoolerAction, CoolerMode, CoolerStatus, TelemetryRecord},
};

/// PID output above this demands cooling. Bang-bang emulation of the
/// proportional output, not PWM.
const PID_ON_THRESHOLD: f32 = 50.0;

/// Top-level control engine: mode arbitration, relay decisions and run-time
/// bookkeeping. Pure logic; relay and network side effects are returned as
/// [`CoolerAction`]s for the host to execute.
#[derive(Debug, Clone)]
pub struct CoolerEngine {
    pub config: CoolerConfig,
    settings: ControlSettings,
    actuator: ActuatorState,
    pid: PidRegulator,

    current_temp_c: f32,
    current_humidity: f32,
    current_pressure_hpa: f32,
    last_sensor_update_ms: Option<u64>,
}

impl CoolerEngine {
    pub fn new(config: CoolerConfig, settings: ControlSettings) -> Self {
        Self {
            config,
            settings,
            actuator: ActuatorState::default(),
            pid: PidRegulator::new(),
            current_temp_c: 0.0,
            current_humidity: 0.0,
            current_pressure_hpa: 0.0,
            last_sensor_update_ms: None,
        }
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn actuator(&self) -> &ActuatorState {
        &self.actuator
    }

    pub fn is_running(&self) -> bool {
        self.actuator.running
    }

    pub fn current_temp_c(&self) -> f32 {
        self.current_temp_c
    }

    pub fn mode(&self) -> CoolerMode {
        if self.settings.manual_override {
            CoolerMode::Manual
        } else if self.settings.pid_enabled {
            CoolerMode::Pid
        } else {
            CoolerMode::Auto
        }
    }

    /// Accepts a temperature reading if it is finite and inside the valid
    /// range; anything else is dropped so garbage never reaches the
    /// threshold comparisons or the regulator.
    pub fn update_temperature(&mut self, temp_c: f32, now_ms: u64) -> bool {
        if !temp_c.is_finite()
            || !(self.config.min_valid_temp_c..=self.config.max_valid_temp_c).contains(&temp_c)
        {
            return false;
        }
        self.current_temp_c = temp_c;
        self.last_sensor_update_ms = Some(now_ms);
        true
    }

    pub fn update_humidity(&mut self, humidity: f32) -> bool {
        if !humidity.is_finite() || !(0.0..=100.0).contains(&humidity) {
            return false;
        }
        self.current_humidity = humidity;
        true
    }

    pub fn update_pressure(&mut self, pressure_hpa: f32) -> bool {
        if !pressure_hpa.is_finite() || !(300.0..=1_100.0).contains(&pressure_hpa) {
            return false;
        }
        self.current_pressure_hpa = pressure_hpa;
        true
    }

    pub fn is_sensor_valid(&self, now_ms: u64) -> bool {
        self.last_sensor_update_ms
            .map(|last| now_ms.saturating_sub(last) < self.config.sensor_stale_timeout_ms)
            .unwrap_or(false)
    }

    /// One control tick. Decides the relay state from the active mode, then
    /// advances the run-time accumulators. With no fresh reading the
    /// automatic branches are skipped and only the bookkeeping runs.
    pub fn tick(&mut self, now_ms: u64) -> Vec<CoolerAction> {
        let mut actions = Vec::new();

        if self.settings.manual_override {
            self.actuator.update(now_ms);
            return actions;
        }

        if self.is_sensor_valid(now_ms) {
            let temp = self.current_temp_c;

            if self.settings.pid_enabled {
                let output = self.pid.sample(
                    self.settings.setpoint_c,
                    self.settings.kp,
                    self.settings.ki,
                    self.settings.kd,
                    temp,
                    now_ms,
                );

                if output > PID_ON_THRESHOLD && !self.actuator.running {
                    self.turn_on(now_ms, &mut actions);
                } else if output <= PID_ON_THRESHOLD && self.actuator.running {
                    self.turn_off(&mut actions);
                }
            } else if !self.actuator.running && temp >= self.settings.start_temp_c {
                self.turn_on(now_ms, &mut actions);
            } else if self.actuator.running && temp <= self.settings.stop_temp_c {
                self.turn_off(&mut actions);
            }
        }

        self.actuator.update(now_ms);
        actions
    }

    /// Manual relay control. Always engages the override; the relay only
    /// moves when the requested state differs from the current one.
    pub fn set_manual(&mut self, turn_on: bool, now_ms: u64) -> Vec<CoolerAction> {
        self.settings.manual_override = true;

        let mut actions = Vec::new();
        if turn_on && !self.actuator.running {
            self.turn_on(now_ms, &mut actions);
        } else if !turn_on && self.actuator.running {
            self.turn_off(&mut actions);
        }
        actions
    }

    /// Clears the override and hands control back to whichever automatic
    /// mode is selected. Does not move the relay.
    pub fn resume_auto(&mut self) {
        self.settings.manual_override = false;
    }

    /// Full reset: actuator accounting cleared, override dropped, relay
    /// forced off regardless of mode.
    pub fn reset(&mut self) -> Vec<CoolerAction> {
        self.actuator.clear();
        self.settings.manual_override = false;
        vec![CoolerAction::RelayOff]
    }

    pub fn set_start_temp(&mut self, temp_c: f32) {
        self.settings.start_temp_c = temp_c;
    }

    pub fn set_stop_temp(&mut self, temp_c: f32) {
        self.settings.stop_temp_c = temp_c;
    }

    pub fn set_setpoint(&mut self, setpoint_c: f32) {
        self.settings.setpoint_c = setpoint_c;
    }

    pub fn set_kp(&mut self, kp: f32) {
        self.settings.kp = kp;
    }

    pub fn set_ki(&mut self, ki: f32) {
        self.settings.ki = ki;
    }

    pub fn set_kd(&mut self, kd: f32) {
        self.settings.kd = kd;
    }

    /// Enabling PID also drops the manual override, same as the firmware.
    pub fn set_pid_enabled(&mut self, enabled: bool) {
        self.settings.pid_enabled = enabled;
        if enabled {
            self.settings.manual_override = false;
        }
    }

    pub fn pid_reset(&mut self) {
        self.pid.reset();
    }

    pub fn pid_output(&self) -> f32 {
        self.pid.output()
    }

    pub fn pid_error(&self) -> f32 {
        self.pid.error()
    }

    pub fn status(&self, now_ms: u64) -> CoolerStatus {
        CoolerStatus {
            mode: self.mode().as_str(),
            cooler_running: self.actuator.running,
            ever_started: self.actuator.ever_started,
            uptime_s: now_ms / 1_000,
            runtime_s: self.actuator.run_time_ms / 1_000,
            total_elapsed_s: self.actuator.total_elapsed_ms / 1_000,
            current_temp: self.current_temp_c,
            sensor_valid: self.is_sensor_valid(now_ms),
            start_temp: self.settings.start_temp_c,
            stop_temp: self.settings.stop_temp_c,
            pid_enabled: self.settings.pid_enabled,
            pid_setpoint: self.settings.setpoint_c,
            pid_output: self.pid.output(),
        }
    }

    pub fn telemetry(&self, now_ms: u64) -> TelemetryRecord {
        TelemetryRecord {
            temperature: round1(self.current_temp_c),
            humidity: round1(self.current_humidity),
            pressure: round1(self.current_pressure_hpa),
            timestamp: now_ms / 1_000,
            device: self.config.device_id.clone(),
            cooler_running: self.actuator.running,
            cooler_runtime: self.actuator.run_time_ms / 1_000,
            total_elapsed_time: self.actuator.total_elapsed_ms / 1_000,
            cooler_ever_started: self.actuator.ever_started,
            manual_override: self.settings.manual_override,
            pid_enabled: self.settings.pid_enabled,
            pid_setpoint: self.settings.setpoint_c,
            pid_output: self.pid.output(),
            pid_error: self.pid.error(),
            pid_kp: self.settings.kp,
            pid_ki: self.settings.ki,
            pid_kd: self.settings.kd,
        }
    }

    fn turn_on(&mut self, now_ms: u64, actions: &mut Vec<CoolerAction>) {
        actions.push(CoolerAction::RelayOn);
        self.actuator.mark_started(now_ms);
    }

    fn turn_off(&mut self, actions: &mut Vec<CoolerAction>) {
        actions.push(CoolerAction::RelayOff);
        self.actuator.mark_stopped();
    }
}
