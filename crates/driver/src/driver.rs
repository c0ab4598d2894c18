//! Driver - turns server events into steering commands

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use contracts::{DriveRecord, ModelInput, SteerCommand, SteeringModel, Telemetry, ThrottlePolicy};
use preprocess::Preprocessor;
use recorder::Recorder;
use socket_server::{Broadcaster, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::error::FrameError;
use crate::stats::DriverStats;

/// Event name of the outgoing command
pub const STEER_EVENT: &str = "steer";
/// Event name sent back when telemetry arrives without data
pub const MANUAL_EVENT: &str = "manual";

/// Output of the blocking part of a frame
struct Prediction {
    raw_image: Vec<u8>,
    input: ModelInput,
    steering: f32,
    preprocess: Duration,
    inference: Duration,
}

/// Decode, preprocess and predict. Runs on the blocking pool.
fn predict_frame(
    model: &dyn SteeringModel,
    preprocessor: &Preprocessor,
    image: &str,
) -> Result<Prediction, FrameError> {
    let started = Instant::now();
    let raw_image = preprocess::decode_base64(image)?;
    let rgb = preprocess::decode_image_bytes(&raw_image)?;
    let input = preprocessor.run(&rgb)?;
    let preprocess = started.elapsed();

    let started = Instant::now();
    let steering = model.predict(&input)?;
    let inference = started.elapsed();

    if !steering.is_finite() {
        return Err(FrameError::NonFinite(steering));
    }

    Ok(Prediction {
        raw_image,
        input,
        steering,
        preprocess,
        inference,
    })
}

/// Sequential consumer of `ServerEvent`s
pub struct Driver {
    model: Arc<dyn SteeringModel>,
    preprocessor: Arc<Preprocessor>,
    policy: ThrottlePolicy,
    broadcaster: Broadcaster,
    recorder: Option<Recorder>,
    sequence: u64,
    stats: DriverStats,
    started: Instant,
}

impl Driver {
    pub fn new(
        model: Arc<dyn SteeringModel>,
        preprocessor: Preprocessor,
        policy: ThrottlePolicy,
        broadcaster: Broadcaster,
        recorder: Option<Recorder>,
    ) -> Self {
        Self {
            model,
            preprocessor: Arc::new(preprocessor),
            policy,
            broadcaster,
            recorder,
            sequence: 0,
            stats: DriverStats::default(),
            started: Instant::now(),
        }
    }

    /// Handle events until the server side of the channel closes
    ///
    /// Cancel-safe between events, so it can sit in a `select!` with a
    /// shutdown signal.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<ServerEvent>) -> DriverStats {
        info!(model = %self.model.name(), "Driver started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("Event stream closed");
        self.stats()
    }

    /// Handle one event
    pub async fn handle(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { sid } => self.on_connect(&sid),
            ServerEvent::Telemetry { sid, telemetry } => {
                if let Err(e) = self.on_telemetry(&sid, telemetry).await {
                    let kind = e.kind();
                    self.stats.inc_error(kind);
                    observability::record_frame_error(kind);
                    warn!(sid = %sid, kind, error = %e, "Telemetry dropped");
                }
            }
            ServerEvent::Manual { sid } => self.on_manual(&sid),
            ServerEvent::Disconnected { sid, reason } => {
                self.stats.disconnects += 1;
                observability::record_clients_connected(self.broadcaster.connected_count());
                info!(sid = %sid, reason = %reason, "Client disconnected");
            }
        }
    }

    /// Current counters
    pub fn stats(&self) -> DriverStats {
        let mut stats = self.stats.clone();
        stats.duration = self.started.elapsed();
        stats
    }

    /// Close the recorder and return final counters
    pub async fn finish(mut self) -> DriverStats {
        if let Some(recorder) = self.recorder.take() {
            recorder.shutdown().await;
        }
        self.stats()
    }

    fn on_connect(&mut self, sid: &str) {
        self.stats.connects += 1;
        observability::record_clients_connected(self.broadcaster.connected_count());
        info!(sid = %sid, "Client connected");

        match self.broadcaster.emit(STEER_EVENT, &SteerCommand::neutral()) {
            Ok(_) => self.stats.commands_emitted += 1,
            Err(e) => {
                self.stats.inc_error("emit");
                warn!(sid = %sid, error = %e, "Failed to send neutral command");
            }
        }
    }

    fn on_manual(&mut self, sid: &str) {
        self.stats.manual_events += 1;
        debug!(sid = %sid, "Telemetry without data, manual mode");
        if let Err(e) = self
            .broadcaster
            .emit(MANUAL_EVENT, &serde_json::Map::new())
        {
            self.stats.inc_error("emit");
            warn!(sid = %sid, error = %e, "Failed to send manual event");
        }
    }

    #[instrument(name = "driver_telemetry", skip_all, fields(sid = %sid, sequence = self.sequence))]
    async fn on_telemetry(&mut self, sid: &str, telemetry: Telemetry) -> Result<(), FrameError> {
        self.stats.telemetry_received += 1;
        observability::record_telemetry_received();

        let Telemetry {
            steering_angle: reported_steering,
            throttle: reported_throttle,
            speed,
            image,
        } = telemetry;
        let captured_at = SystemTime::now();

        let model = Arc::clone(&self.model);
        let preprocessor = Arc::clone(&self.preprocessor);
        let prediction =
            tokio::task::spawn_blocking(move || predict_frame(&*model, &preprocessor, &image))
                .await??;

        let preprocess_ms = prediction.preprocess.as_secs_f64() * 1000.0;
        let inference_ms = prediction.inference.as_secs_f64() * 1000.0;
        self.stats.preprocess_ms.push(preprocess_ms);
        self.stats.inference_ms.push(inference_ms);
        observability::record_preprocess_latency_ms(preprocess_ms);
        observability::record_inference_latency_ms(inference_ms);

        let steering = f64::from(prediction.steering);
        let command = SteerCommand::new(steering, self.policy.throttle_for(speed));
        self.broadcaster.emit(STEER_EVENT, &command)?;

        self.stats.commands_emitted += 1;
        self.stats.steering.push(steering);
        observability::record_command_emitted(command.steering_angle, command.throttle);
        debug!(
            steering_angle = command.steering_angle,
            throttle = command.throttle,
            speed,
            "Command emitted"
        );

        if let Some(recorder) = &self.recorder {
            let model_view = recorder.wants_model_view().then_some(prediction.input);
            let record = DriveRecord {
                sequence: self.sequence,
                captured_at,
                image: Bytes::from(prediction.raw_image),
                speed,
                reported_steering,
                reported_throttle,
                command,
                model_view,
            };
            if recorder.record(record) {
                self.stats.records_queued += 1;
            }
        }
        self.sequence += 1;

        Ok(())
    }
}
