pub const TOPIC_SENSOR_TEMP: &str = "cooler/sensor/temperature";
pub const TOPIC_SENSOR_HUMIDITY: &str = "cooler/sensor/humidity";
pub const TOPIC_SENSOR_PRESSURE: &str = "cooler/sensor/pressure";
pub const TOPIC_SENSOR_STATUS: &str = "cooler/sensor/status";

pub const TOPIC_TELEMETRY: &str = "cooler/controller/telemetry";

pub const TOPIC_CMD_LINE: &str = "cooler/cmnd/line";
pub const TOPIC_CMD_RESPONSE: &str = "cooler/cmnd/response";
