//! SessionWriter - lays a driving session out on disk
//!
//! Layout under the session directory:
//! - `IMG/<timestamp>.<ext>` camera image as the simulator sent it
//! - `VIEW/<timestamp>.png` preprocessed frame (optional)
//! - `driving_log.jsonl` one JSON object per step

use chrono::{DateTime, Utc};
use contracts::DriveRecord;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Name of the per-step log inside the session directory
pub const LOG_FILE_NAME: &str = "driving_log.jsonl";

const IMAGE_DIR: &str = "IMG";
const VIEW_DIR: &str = "VIEW";

/// One line of `driving_log.jsonl`
#[derive(Debug, Serialize)]
struct LogLine<'a> {
    sequence: u64,
    timestamp: &'a str,
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    view: Option<&'a str>,
    speed: f64,
    reported_steering: f64,
    reported_throttle: f64,
    steering_angle: f64,
    throttle: f64,
}

/// Synchronous writer; owned by the recorder's blocking thread
pub(crate) struct SessionWriter {
    dir: PathBuf,
    save_model_view: bool,
    log: BufWriter<File>,
}

impl SessionWriter {
    /// Create the session directories and open the log for appending
    pub(crate) fn open(dir: &Path, save_model_view: bool) -> io::Result<Self> {
        fs::create_dir_all(dir.join(IMAGE_DIR))?;
        if save_model_view {
            fs::create_dir_all(dir.join(VIEW_DIR))?;
        }
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE_NAME))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            save_model_view,
            log: BufWriter::new(log),
        })
    }

    /// Persist one step; returns the number of bytes put on disk
    pub(crate) fn write(&mut self, record: &DriveRecord) -> io::Result<u64> {
        let stamp = timestamp(record.captured_at);

        let image_name = format!("{IMAGE_DIR}/{stamp}.{}", image_extension(&record.image));
        fs::write(self.dir.join(&image_name), &record.image)?;
        let mut bytes = record.image.len() as u64;

        let view_name = match (&record.model_view, self.save_model_view) {
            (Some(view), true) => {
                let color = match view.channels {
                    1 => image::ExtendedColorType::L8,
                    3 => image::ExtendedColorType::Rgb8,
                    n => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            format!("cannot save a {n}-channel view"),
                        ))
                    }
                };
                let name = format!("{VIEW_DIR}/{stamp}.png");
                let path = self.dir.join(&name);
                image::save_buffer(&path, &view.data, view.width, view.height, color)
                    .map_err(io::Error::other)?;
                bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                Some(name)
            }
            _ => None,
        };

        let line = serde_json::to_vec(&LogLine {
            sequence: record.sequence,
            timestamp: &stamp,
            image: &image_name,
            view: view_name.as_deref(),
            speed: record.speed,
            reported_steering: record.reported_steering,
            reported_throttle: record.reported_throttle,
            steering_angle: record.command.steering_angle,
            throttle: record.command.throttle,
        })?;
        self.log.write_all(&line)?;
        self.log.write_all(b"\n")?;
        Ok(bytes + line.len() as u64 + 1)
    }

    /// Flush the log; called once the queue is drained
    pub(crate) fn finish(mut self) -> io::Result<()> {
        self.log.flush()
    }
}

/// UTC wall-clock stamp used for file names, millisecond precision
fn timestamp(at: SystemTime) -> String {
    DateTime::<Utc>::from(at)
        .format("%Y_%m_%d_%H_%M_%S_%3f")
        .to_string()
}

/// File extension matching the encoded image, `jpg` when unknown
fn image_extension(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("jpg")
}
