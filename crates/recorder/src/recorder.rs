//! Recorder - queue in front of the session writer

use std::sync::Arc;

use contracts::{DriveRecord, RecordingConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::counters::{RecordingCounters, RecordingSummary};
use crate::error::RecorderError;
use crate::writer::SessionWriter;

/// Handle to a running recording session
pub struct Recorder {
    tx: mpsc::Sender<DriveRecord>,
    counters: Arc<RecordingCounters>,
    worker: JoinHandle<()>,
    save_model_view: bool,
}

impl Recorder {
    /// Open the session directory and start the writer thread
    ///
    /// `Ok(None)` when recording is disabled. Must be called inside a tokio
    /// runtime.
    #[instrument(name = "recorder_from_config", skip(config))]
    pub fn from_config(config: &RecordingConfig) -> Result<Option<Self>, RecorderError> {
        let Some(path) = &config.path else {
            return Ok(None);
        };

        let writer = SessionWriter::open(path, config.save_model_view)
            .map_err(|e| RecorderError::open(path, e))?;
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(RecordingCounters::default());

        let worker_counters = Arc::clone(&counters);
        let worker = tokio::task::spawn_blocking(move || write_loop(writer, rx, &worker_counters));

        info!(path = %path.display(), "Recording enabled");

        Ok(Some(Self {
            tx,
            counters,
            worker,
            save_model_view: config.save_model_view,
        }))
    }

    /// Whether records should carry the preprocessed frame
    pub fn wants_model_view(&self) -> bool {
        self.save_model_view
    }

    /// Queue a record without waiting
    ///
    /// Returns false if the writer is behind and the record was dropped.
    pub fn record(&self, record: DriveRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(r)) => {
                self.counters.dropped();
                warn!(sequence = r.sequence, "Recording queue full, record dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(r)) => {
                self.counters.failed();
                error!(sequence = r.sequence, "Recording writer stopped unexpectedly");
                false
            }
        }
    }

    /// Counters so far
    pub fn summary(&self) -> RecordingSummary {
        self.counters.summary()
    }

    /// Write out everything still queued, flush and close
    #[instrument(name = "recorder_shutdown", skip(self))]
    pub async fn shutdown(self) -> RecordingSummary {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(error = ?e, "Recording writer panicked");
        }
        let summary = self.counters.summary();
        info!(
            written = summary.written,
            failed = summary.failed,
            dropped = summary.dropped,
            bytes = summary.bytes,
            "Recording closed"
        );
        summary
    }
}

/// Runs on the blocking pool until every sender is gone
fn write_loop(
    mut writer: SessionWriter,
    mut rx: mpsc::Receiver<DriveRecord>,
    counters: &RecordingCounters,
) {
    debug!("Recording writer started");

    while let Some(record) = rx.blocking_recv() {
        match writer.write(&record) {
            Ok(bytes) => counters.wrote(bytes),
            Err(e) => {
                // One bad step never ends the session
                counters.failed();
                error!(sequence = record.sequence, error = %e, "Recording write failed");
            }
        }
    }

    if let Err(e) = writer.finish() {
        error!(error = %e, "Flushing the driving log failed");
    }
    debug!("Recording writer stopped");
}
