use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, routing::post, Json, Router};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpListener,
    sync::Mutex,
};
use tracing::{info, warn};

use cooler_common::{
    command, ControlSettings, CoolerAction, CoolerConfig, CoolerEngine, TOPIC_CMD_LINE,
    TOPIC_CMD_RESPONSE, TOPIC_SENSOR_HUMIDITY, TOPIC_SENSOR_PRESSURE, TOPIC_SENSOR_TEMP,
    TOPIC_TELEMETRY,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const MAX_COMMAND_LINE_BYTES: usize = 200;

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<CoolerEngine>>,
    mqtt: AsyncClient,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = CoolerConfig::default();
    let engine = CoolerEngine::new(config.clone(), ControlSettings::default());

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new("cooler-controller", mqtt_host, mqtt_port);
    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        engine: Arc::new(Mutex::new(engine)),
        mqtt,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_control_loop(app_state.clone(), config.control_tick_ms);
    spawn_telemetry_loop(app_state.clone(), config.telemetry_interval_ms);
    spawn_command_console(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/telemetry", get(handle_get_telemetry))
        .route("/api/command", post(handle_post_command))
        .with_state(app_state);

    let port = std::env::var("COOLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let topics = [
        TOPIC_SENSOR_TEMP,
        TOPIC_SENSOR_HUMIDITY,
        TOPIC_SENSOR_PRESSURE,
        TOPIC_CMD_LINE,
    ];

    for topic in topics {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Control loop: one engine tick per period. The PID regulator throttles
/// itself to its own sample interval, so the tick period only bounds how
/// often relay decisions happen.
fn spawn_control_loop(app_state: AppState, tick_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let actions = {
                let mut engine = app_state.engine.lock().await;
                engine.tick(now_ms)
            };

            if !actions.is_empty() {
                execute_relay_actions(&actions);
            }
        }
    });
}

fn spawn_telemetry_loop(app_state: AppState, interval_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            interval.tick().await;
            if let Err(err) = publish_telemetry(&app_state).await {
                warn!("telemetry publish failed: {err:#}");
            }
        }
    });
}

/// Line console over TCP, standing in for the firmware's serial port.
/// Connections are served one at a time; the protocol has no concurrent
/// session model.
fn spawn_command_console(app_state: AppState) {
    tokio::spawn(async move {
        let port = std::env::var("COOLER_CONSOLE_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(7070);
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!("failed to bind command console at {addr}: {err}");
                return;
            }
        };
        info!("command console listening on {addr}");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("console session from {peer}");
                    if let Err(err) = serve_console_session(&app_state, stream).await {
                        warn!("console session error: {err:#}");
                    }
                }
                Err(err) => {
                    warn!("console accept error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });
}

async fn serve_console_session<S>(app_state: &AppState, stream: S) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(MAX_COMMAND_LINE_BYTES);

    loop {
        buf.clear();
        // The length cap is enforced while reading; a newline-free stream
        // must not grow the buffer past the limit.
        let n = (&mut reader)
            .take(MAX_COMMAND_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(());
        }

        if n > MAX_COMMAND_LINE_BYTES && buf.last() != Some(&b'\n') {
            writer.write_all(b"ERROR: Command line too long\r\n").await?;
            discard_until_newline(&mut reader).await?;
            continue;
        }

        let raw = String::from_utf8_lossy(&buf);
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        for response_line in run_command(app_state, line).await {
            writer.write_all(response_line.as_bytes()).await?;
            writer.write_all(b"\r\n").await?;
        }
    }
}

/// Skips the remainder of an over-long line in bounded chunks.
async fn discard_until_newline<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut chunk = Vec::with_capacity(256);
    loop {
        chunk.clear();
        let n = (&mut *reader).take(256).read_until(b'\n', &mut chunk).await?;
        if n == 0 || chunk.last() == Some(&b'\n') {
            return Ok(());
        }
    }
}

/// Dispatches one command line and executes whatever side effects it
/// produced. A command finishes completely before the next tick can move
/// the relay because both go through the engine lock.
async fn run_command(app_state: &AppState, line: &str) -> Vec<String> {
    let now_ms = monotonic_ms();

    let outcome = {
        let mut engine = app_state.engine.lock().await;
        command::dispatch(&mut engine, line, now_ms)
    };

    let mut lines: Vec<String> = outcome.response.lines().to_vec();
    execute_relay_actions(&outcome.actions);

    if outcome.actions.contains(&CoolerAction::PublishTelemetry) {
        // AT+DATA echoes the record on the console as well.
        match publish_telemetry(app_state).await {
            Ok(json) => lines.push(json),
            Err(err) => warn!("telemetry publish failed: {err:#}"),
        }
    }

    lines
}

/// Relay GPIO is a hardware collaborator; transitions are logged at the
/// point the firmware would drive the pin.
fn execute_relay_actions(actions: &[CoolerAction]) {
    for action in actions {
        match action {
            CoolerAction::RelayOn => info!("relay ON"),
            CoolerAction::RelayOff => info!("relay OFF"),
            CoolerAction::PublishTelemetry => {}
        }
    }
}

async fn publish_telemetry(app_state: &AppState) -> anyhow::Result<String> {
    let now_ms = monotonic_ms();
    let record = {
        let engine = app_state.engine.lock().await;
        engine.telemetry(now_ms)
    };

    let payload = serde_json::to_string(&record).context("telemetry serialization failed")?;
    app_state
        .mqtt
        .publish(TOPIC_TELEMETRY, QoS::AtLeastOnce, true, payload.clone())
        .await
        .context("telemetry mqtt publish failed")?;

    Ok(payload)
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;
    let now_ms = monotonic_ms();

    match topic.as_str() {
        TOPIC_SENSOR_TEMP => {
            if let Ok(temp) = message.trim().parse::<f32>() {
                let mut engine = app_state.engine.lock().await;
                if !engine.update_temperature(temp, now_ms) {
                    warn!("rejected temperature reading {temp}");
                }
            }
        }
        TOPIC_SENSOR_HUMIDITY => {
            if let Ok(humidity) = message.trim().parse::<f32>() {
                let mut engine = app_state.engine.lock().await;
                engine.update_humidity(humidity);
            }
        }
        TOPIC_SENSOR_PRESSURE => {
            if let Ok(pressure) = message.trim().parse::<f32>() {
                let mut engine = app_state.engine.lock().await;
                engine.update_pressure(pressure);
            }
        }
        TOPIC_CMD_LINE => {
            let response = run_command(app_state, &message).await;
            app_state
                .mqtt
                .publish(
                    TOPIC_CMD_RESPONSE,
                    QoS::AtLeastOnce,
                    false,
                    response.join("\r\n"),
                )
                .await
                .context("command response publish failed")?;
        }
        _ => {}
    }

    Ok(())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let now_ms = monotonic_ms();
    let status = {
        let engine = state.engine.lock().await;
        engine.status(now_ms)
    };
    Json(status)
}

async fn handle_get_telemetry(State(state): State<AppState>) -> impl IntoResponse {
    let now_ms = monotonic_ms();
    let record = {
        let engine = state.engine.lock().await;
        engine.telemetry(now_ms)
    };
    Json(record)
}

/// Raw command line in the body, response lines back as plain text. The
/// OK/STATUS/ERROR convention is carried through unchanged.
async fn handle_post_command(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let response = run_command(&state, &body).await;
    response.join("\n")
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
