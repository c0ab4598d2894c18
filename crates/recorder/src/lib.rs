//! # Recorder
//!
//! Optional capture of driving sessions.
//!
//! Records go through a bounded queue to a dedicated blocking thread that
//! owns the session files, so a slow disk never stalls the control loop:
//! when the queue is full the record is dropped and counted.

mod counters;
mod error;
mod recorder;
mod writer;

pub use counters::RecordingSummary;
pub use error::RecorderError;
pub use recorder::Recorder;
pub use writer::LOG_FILE_NAME;
