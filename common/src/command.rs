use thiserror::Error;

use crate::{
    cooler::CoolerEngine,
    types::CoolerAction,
};

pub const COMMAND_PREFIX: &str = "AT+";

/// A command line parsed into a typed value. Parsing happens once; dispatch
/// matches on the variant instead of re-scanning the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status,
    Cooler(CoolerSwitch),
    SetStart(f32),
    SetStop(f32),
    GetThresh,
    Reset,
    Data,
    Pid(bool),
    PidSet(f32),
    PidKp(f32),
    PidKi(f32),
    PidKd(f32),
    PidGet,
    PidReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolerSwitch {
    On,
    Off,
    Auto,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Commands must start with AT+")]
    MissingPrefix,
    #[error("Unknown command. Use AT+HELP for available commands")]
    Unknown,
    #[error("Invalid cooler command. Use ON, OFF, or AUTO")]
    InvalidCoolerValue,
    #[error("Invalid PID command. Use ON or OFF")]
    InvalidPidValue,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

/// Response lines for the console. Success is `OK` plus zero or more
/// `STATUS:` lines; a rejection is a single `ERROR:` line. Consumers depend
/// on that shape, so it is built here and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    lines: Vec<String>,
}

impl CommandResponse {
    fn ok() -> Self {
        Self {
            lines: vec!["OK".to_string()],
        }
    }

    fn error(reason: impl std::fmt::Display) -> Self {
        Self {
            lines: vec![format!("ERROR: {reason}")],
        }
    }

    fn status(mut self, line: impl std::fmt::Display) -> Self {
        self.lines.push(format!("STATUS: {line}"));
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_error(&self) -> bool {
        self.lines
            .first()
            .map(|line| line.starts_with("ERROR:"))
            .unwrap_or(false)
    }
}

/// What a dispatched command produced: the text response plus any side
/// effects the host still has to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub response: CommandResponse,
    pub actions: Vec<CoolerAction>,
}

impl CommandOutcome {
    fn reply(response: CommandResponse) -> Self {
        Self {
            response,
            actions: Vec::new(),
        }
    }
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim().to_ascii_uppercase();

    let Some(cmd) = line.strip_prefix(COMMAND_PREFIX) else {
        return Err(CommandError::MissingPrefix);
    };

    let (name, value) = match cmd.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (cmd, None),
    };

    match (name, value) {
        ("HELP", None) => Ok(Command::Help),
        ("STATUS", None) => Ok(Command::Status),
        ("COOLER", Some(value)) => match value {
            "ON" => Ok(Command::Cooler(CoolerSwitch::On)),
            "OFF" => Ok(Command::Cooler(CoolerSwitch::Off)),
            "AUTO" => Ok(Command::Cooler(CoolerSwitch::Auto)),
            _ => Err(CommandError::InvalidCoolerValue),
        },
        ("SETSTART", Some(value)) => parse_number(value).map(Command::SetStart),
        ("SETSTOP", Some(value)) => parse_number(value).map(Command::SetStop),
        ("GETTHRESH", None) => Ok(Command::GetThresh),
        ("RESET", None) => Ok(Command::Reset),
        ("DATA", None) => Ok(Command::Data),
        ("PID", Some(value)) => match value {
            "ON" => Ok(Command::Pid(true)),
            "OFF" => Ok(Command::Pid(false)),
            _ => Err(CommandError::InvalidPidValue),
        },
        ("PIDSET", Some(value)) => parse_number(value).map(Command::PidSet),
        ("PIDKP", Some(value)) => parse_number(value).map(Command::PidKp),
        ("PIDKI", Some(value)) => parse_number(value).map(Command::PidKi),
        ("PIDKD", Some(value)) => parse_number(value).map(Command::PidKd),
        ("PIDGET", None) => Ok(Command::PidGet),
        ("PIDRESET", None) => Ok(Command::PidReset),
        _ => Err(CommandError::Unknown),
    }
}

fn parse_number(value: &str) -> Result<f32, CommandError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(value.to_string()))
}

/// Parses and executes one command line against the engine. A rejected
/// command mutates nothing.
pub fn dispatch(engine: &mut CoolerEngine, line: &str, now_ms: u64) -> CommandOutcome {
    let command = match parse(line) {
        Ok(command) => command,
        Err(err) => return CommandOutcome::reply(CommandResponse::error(err)),
    };

    match command {
        Command::Help => CommandOutcome::reply(help_response()),
        Command::Status => CommandOutcome::reply(status_response(engine, now_ms)),
        Command::Cooler(CoolerSwitch::On) => CommandOutcome {
            response: CommandResponse::ok().status("Cooler turned ON manually"),
            actions: engine.set_manual(true, now_ms),
        },
        Command::Cooler(CoolerSwitch::Off) => CommandOutcome {
            response: CommandResponse::ok().status("Cooler turned OFF manually"),
            actions: engine.set_manual(false, now_ms),
        },
        Command::Cooler(CoolerSwitch::Auto) => {
            engine.resume_auto();
            CommandOutcome::reply(
                CommandResponse::ok().status("Cooler returned to automatic mode"),
            )
        }
        Command::SetStart(temp) => {
            if !(temp > 0.0 && temp < 100.0) {
                return CommandOutcome::reply(CommandResponse::error(
                    "Invalid temperature. Use 0-100 C",
                ));
            }
            engine.set_start_temp(temp);
            CommandOutcome::reply(
                CommandResponse::ok().status(format!("Start temperature set to {temp:.1} C")),
            )
        }
        Command::SetStop(temp) => {
            if !(-20.0..50.0).contains(&temp) {
                return CommandOutcome::reply(CommandResponse::error(
                    "Invalid temperature. Use -20 to 50 C",
                ));
            }
            engine.set_stop_temp(temp);
            CommandOutcome::reply(
                CommandResponse::ok().status(format!("Stop temperature set to {temp:.1} C")),
            )
        }
        Command::GetThresh => {
            let settings = engine.settings();
            CommandOutcome::reply(
                CommandResponse::ok()
                    .status(format!(
                        "Start temperature: {:.1} C",
                        settings.start_temp_c
                    ))
                    .status(format!("Stop temperature: {:.1} C", settings.stop_temp_c)),
            )
        }
        Command::Reset => CommandOutcome {
            response: CommandResponse::ok().status("Cooler system reset"),
            actions: engine.reset(),
        },
        Command::Data => CommandOutcome {
            response: CommandResponse::ok(),
            actions: vec![CoolerAction::PublishTelemetry],
        },
        Command::Pid(enabled) => {
            engine.set_pid_enabled(enabled);
            let detail = if enabled {
                "PID control mode ENABLED"
            } else {
                "PID control mode DISABLED"
            };
            CommandOutcome::reply(CommandResponse::ok().status(detail))
        }
        Command::PidSet(setpoint) => {
            if !(-50.0..=100.0).contains(&setpoint) {
                return CommandOutcome::reply(CommandResponse::error(
                    "Invalid setpoint. Use -50 to 100 C",
                ));
            }
            engine.set_setpoint(setpoint);
            CommandOutcome::reply(
                CommandResponse::ok().status(format!("PID setpoint set to {setpoint:.1} C")),
            )
        }
        Command::PidKp(kp) => {
            if !(0.0..=1_000.0).contains(&kp) {
                return CommandOutcome::reply(CommandResponse::error(
                    "Invalid Kp value. Use 0-1000",
                ));
            }
            engine.set_kp(kp);
            CommandOutcome::reply(CommandResponse::ok().status(format!("PID Kp set to {kp}")))
        }
        Command::PidKi(ki) => {
            if !(0.0..=100.0).contains(&ki) {
                return CommandOutcome::reply(CommandResponse::error(
                    "Invalid Ki value. Use 0-100",
                ));
            }
            engine.set_ki(ki);
            CommandOutcome::reply(CommandResponse::ok().status(format!("PID Ki set to {ki}")))
        }
        Command::PidKd(kd) => {
            if !(0.0..=10_000.0).contains(&kd) {
                return CommandOutcome::reply(CommandResponse::error(
                    "Invalid Kd value. Use 0-10000",
                ));
            }
            engine.set_kd(kd);
            CommandOutcome::reply(CommandResponse::ok().status(format!("PID Kd set to {kd}")))
        }
        Command::PidGet => {
            let settings = engine.settings();
            CommandOutcome::reply(
                CommandResponse::ok()
                    .status(format!(
                        "PID Enabled: {}",
                        if settings.pid_enabled { "YES" } else { "NO" }
                    ))
                    .status(format!("PID Setpoint: {:.1} C", settings.setpoint_c))
                    .status(format!("PID Kp: {}", settings.kp))
                    .status(format!("PID Ki: {}", settings.ki))
                    .status(format!("PID Kd: {}", settings.kd))
                    .status(format!("PID Output: {:.1}%", engine.pid_output()))
                    .status(format!("PID Error: {:.2} C", engine.pid_error())),
            )
        }
        Command::PidReset => {
            engine.pid_reset();
            CommandOutcome::reply(CommandResponse::ok().status("PID parameters reset"))
        }
    }
}

fn help_response() -> CommandResponse {
    CommandResponse::ok()
        .status("AT+HELP - Show this help")
        .status("AT+STATUS - Show current status")
        .status("AT+COOLER=ON - Turn cooler ON manually")
        .status("AT+COOLER=OFF - Turn cooler OFF manually")
        .status("AT+COOLER=AUTO - Return to automatic mode")
        .status("AT+SETSTART=XX.X - Set start temperature (C)")
        .status("AT+SETSTOP=XX.X - Set stop temperature (C)")
        .status("AT+GETTHRESH - Get current thresholds")
        .status("AT+RESET - Reset cooler timing")
        .status("AT+DATA - Get current sensor data")
        .status("AT+PID=ON - Enable PID control mode")
        .status("AT+PID=OFF - Disable PID control mode")
        .status("AT+PIDSET=XX.X - Set PID setpoint temperature")
        .status("AT+PIDKP=XX.X - Set PID Kp parameter")
        .status("AT+PIDKI=XX.X - Set PID Ki parameter")
        .status("AT+PIDKD=XX.X - Set PID Kd parameter")
        .status("AT+PIDGET - Get all PID parameters")
        .status("AT+PIDRESET - Reset PID integral and derivative")
}

fn status_response(engine: &CoolerEngine, now_ms: u64) -> CommandResponse {
    let mut response = CommandResponse::ok()
        .status(format!(
            "Device: {}, Uptime: {}s",
            engine.config.device_id,
            now_ms / 1_000
        ))
        .status(format!(
            "Cooler: {}, Mode: {}",
            if engine.is_running() { "ON" } else { "OFF" },
            engine.mode().as_str()
        ));

    if engine.settings().pid_enabled {
        response = response.status(format!(
            "PID Setpoint: {:.1} C, Output: {:.1}%",
            engine.settings().setpoint_c,
            engine.pid_output()
        ));
    }

    if engine.actuator().ever_started {
        response = response.status(format!(
            "Runtime: {}s, Elapsed: {}s",
            engine.actuator().run_time_ms / 1_000,
            engine.actuator().total_elapsed_ms / 1_000
        ));
    }

    response
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::{ControlSettings, CoolerConfig};

    fn engine() -> CoolerEngine {
        CoolerEngine::new(CoolerConfig::default(), ControlSettings::default())
    }

    #[test]
    fn rejects_lines_without_marker() {
        assert_eq!(parse("STATUS"), Err(CommandError::MissingPrefix));

        let mut engine = engine();
        let outcome = dispatch(&mut engine, "hello", 1_000);
        assert_eq!(
            outcome.response.lines(),
            ["ERROR: Commands must start with AT+"]
        );
    }

    #[test]
    fn unknown_command_is_single_error_line() {
        let mut engine = engine();
        let outcome = dispatch(&mut engine, "AT+FOO", 1_000);

        assert!(outcome.response.is_error());
        assert_eq!(outcome.response.lines().len(), 1);
        assert!(!outcome.response.lines()[0].contains("OK"));
        assert!(outcome.actions.is_empty());
    }

    #[test]
    fn parsing_is_case_insensitive_and_trims() {
        assert_eq!(parse("  at+cooler=on \r"), Ok(Command::Cooler(CoolerSwitch::On)));
        assert_eq!(parse("At+PidSet=4.5"), Ok(Command::PidSet(4.5)));
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        assert_eq!(
            parse("AT+SETSTART=WARM"),
            Err(CommandError::InvalidNumber("WARM".to_string()))
        );
        assert_eq!(
            parse("AT+PIDKP=NAN"),
            Err(CommandError::InvalidNumber("NAN".to_string()))
        );
    }

    #[test]
    fn out_of_range_start_leaves_state_unchanged() {
        let mut engine = engine();
        let before = engine.settings().start_temp_c;

        let outcome = dispatch(&mut engine, "AT+SETSTART=150", 1_000);
        assert!(outcome.response.is_error());
        assert_eq!(engine.settings().start_temp_c, before);
    }

    #[test]
    fn accepted_start_threshold_shows_up_in_getthresh() {
        let mut engine = engine();

        let outcome = dispatch(&mut engine, "AT+SETSTART=20", 1_000);
        assert_eq!(outcome.response.lines()[0], "OK");

        let outcome = dispatch(&mut engine, "AT+GETTHRESH", 1_000);
        assert_eq!(
            outcome.response.lines(),
            [
                "OK",
                "STATUS: Start temperature: 20.0 C",
                "STATUS: Stop temperature: 3.5 C",
            ]
        );
    }

    #[test]
    fn stop_threshold_range_is_half_open() {
        let mut engine = engine();
        assert!(dispatch(&mut engine, "AT+SETSTOP=50", 1_000).response.is_error());
        assert!(!dispatch(&mut engine, "AT+SETSTOP=-20", 1_000).response.is_error());
        assert_eq!(engine.settings().stop_temp_c, -20.0);
    }

    #[test]
    fn cooler_commands_drive_manual_override() {
        let mut engine = engine();

        let outcome = dispatch(&mut engine, "AT+COOLER=ON", 2_000);
        assert_eq!(outcome.actions, vec![CoolerAction::RelayOn]);
        assert!(engine.settings().manual_override);
        assert!(engine.is_running());

        // Already on: override stays, no relay action.
        let outcome = dispatch(&mut engine, "AT+COOLER=ON", 3_000);
        assert!(outcome.actions.is_empty());

        let outcome = dispatch(&mut engine, "AT+COOLER=AUTO", 4_000);
        assert!(outcome.actions.is_empty());
        assert!(!engine.settings().manual_override);
        // Returning to automatic does not move the relay by itself.
        assert!(engine.is_running());
    }

    #[test]
    fn pid_gain_commands_validate_ranges() {
        let mut engine = engine();

        assert!(dispatch(&mut engine, "AT+PIDKP=1001", 0).response.is_error());
        assert!(dispatch(&mut engine, "AT+PIDKI=-0.1", 0).response.is_error());
        assert!(dispatch(&mut engine, "AT+PIDKD=10001", 0).response.is_error());

        dispatch(&mut engine, "AT+PIDKP=12.5", 0);
        dispatch(&mut engine, "AT+PIDKI=0.5", 0);
        dispatch(&mut engine, "AT+PIDKD=100", 0);
        assert_eq!(engine.settings().kp, 12.5);
        assert_eq!(engine.settings().ki, 0.5);
        assert_eq!(engine.settings().kd, 100.0);
    }

    #[test]
    fn enabling_pid_clears_manual_override() {
        let mut engine = engine();
        dispatch(&mut engine, "AT+COOLER=ON", 1_000);
        assert!(engine.settings().manual_override);

        let outcome = dispatch(&mut engine, "AT+PID=ON", 2_000);
        assert_eq!(
            outcome.response.lines(),
            ["OK", "STATUS: PID control mode ENABLED"]
        );
        assert!(engine.settings().pid_enabled);
        assert!(!engine.settings().manual_override);
    }

    #[test]
    fn reset_command_emits_relay_off() {
        let mut engine = engine();
        dispatch(&mut engine, "AT+COOLER=ON", 1_000);

        let outcome = dispatch(&mut engine, "AT+RESET", 5_000);
        assert_eq!(outcome.actions, vec![CoolerAction::RelayOff]);
        assert!(!engine.is_running());
        assert!(!engine.actuator().ever_started);
    }

    #[test]
    fn data_command_requests_telemetry() {
        let mut engine = engine();
        let outcome = dispatch(&mut engine, "AT+DATA", 1_000);
        assert_eq!(outcome.response.lines(), ["OK"]);
        assert_eq!(outcome.actions, vec![CoolerAction::PublishTelemetry]);
    }

    #[test]
    fn status_includes_pid_and_runtime_blocks_when_active() {
        let mut engine = engine();
        let outcome = dispatch(&mut engine, "AT+STATUS", 12_000);
        assert_eq!(outcome.response.lines().len(), 3);

        dispatch(&mut engine, "AT+PID=ON", 12_000);
        engine.set_manual(true, 14_000);
        engine.tick(20_000);

        let outcome = dispatch(&mut engine, "AT+STATUS", 20_000);
        let lines = outcome.response.lines();
        assert!(lines.iter().any(|line| line.contains("PID Setpoint")));
        assert!(lines.iter().any(|line| line.contains("Runtime")));
    }

    #[test]
    fn pidreset_zeroes_regulator_state() {
        let mut engine = engine();
        dispatch(&mut engine, "AT+PID=ON", 1_000);
        engine.update_temperature(10.0, 1_000);
        engine.tick(2_000);
        assert_ne!(engine.pid_error(), 0.0);

        let outcome = dispatch(&mut engine, "AT+PIDRESET", 3_000);
        assert_eq!(
            outcome.response.lines(),
            ["OK", "STATUS: PID parameters reset"]
        );
        assert_eq!(engine.pid_output(), 0.0);
    }

    #[test]
    fn help_lists_every_command() {
        let mut engine = engine();
        let outcome = dispatch(&mut engine, "AT+HELP", 0);
        let lines = outcome.response.lines();

        assert_eq!(lines[0], "OK");
        for name in [
            "AT+STATUS", "AT+COOLER=ON", "AT+SETSTART", "AT+SETSTOP", "AT+GETTHRESH",
            "AT+RESET", "AT+DATA", "AT+PID=ON", "AT+PIDSET", "AT+PIDKP", "AT+PIDKI",
            "AT+PIDKD", "AT+PIDGET", "AT+PIDRESET",
        ] {
            assert!(
                lines.iter().any(|line| line.contains(name)),
                "missing {name} in help"
            );
        }
    }
}
