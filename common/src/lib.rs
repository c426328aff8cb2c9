pub mod command;
pub mod config;
pub mod cooler;
pub mod pid;
pub mod runtime;
pub mod topics;
pub mod types;

pub use command::{dispatch, parse, Command, CommandError, CommandOutcome, CommandResponse};
pub use config::{ControlSettings, CoolerConfig};
pub use cooler::CoolerEngine;
pub use pid::{PidRegulator, PID_SAMPLE_INTERVAL_MS};
pub use runtime::ActuatorState;
pub use topics::*;
pub use types::{CoolerAction, CoolerMode, CoolerStatus, TelemetryRecord};
