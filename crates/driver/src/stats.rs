//! Driver statistics

use std::collections::BTreeMap;
use std::time::Duration;

use observability::RunningStats;

/// Counters from one driver run
#[derive(Debug, Clone, Default)]
pub struct DriverStats {
    /// Socket.IO clients that joined
    pub connects: u64,

    /// Clients that left
    pub disconnects: u64,

    /// Telemetry messages with an image
    pub telemetry_received: u64,

    /// Telemetry messages without data
    pub manual_events: u64,

    /// `steer` commands emitted, the neutral one on connect included
    pub commands_emitted: u64,

    /// Failed frames by kind
    pub errors: BTreeMap<&'static str, u64>,

    /// Records handed to the recorder
    pub records_queued: u64,

    /// Predicted steering angles
    pub steering: RunningStats,

    /// Decode + preprocess time (ms)
    pub preprocess_ms: RunningStats,

    /// Model forward time (ms)
    pub inference_ms: RunningStats,

    /// Wall time of the run
    pub duration: Duration,
}

impl DriverStats {
    pub fn error_count(&self) -> u64 {
        self.errors.values().sum()
    }

    pub(crate) fn inc_error(&mut self, kind: &'static str) {
        *self.errors.entry(kind).or_insert(0) += 1;
    }

    /// Frames answered per second over the run
    pub fn fps(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.steering.count() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Drive Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Clients connected: {}", self.connects);
        println!("   ├─ Telemetry received: {}", self.telemetry_received);
        println!("   ├─ Manual-mode messages: {}", self.manual_events);
        println!("   ├─ Commands emitted: {}", self.commands_emitted);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   └─ Records queued: {}", self.records_queued);

        println!("\n📈 Model");
        println!("   ├─ Steering angle: {}", self.steering.summary());
        println!("   ├─ Preprocess (ms): {}", self.preprocess_ms.summary());
        println!("   └─ Inference (ms): {}", self.inference_ms.summary());

        if !self.errors.is_empty() {
            println!("\n⚠️  Frame Errors");
            for (kind, count) in &self.errors {
                println!("   ├─ {}: {}", kind, count);
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_count_sums_kinds() {
        let mut stats = DriverStats::default();
        stats.inc_error("base64");
        stats.inc_error("base64");
        stats.inc_error("inference");
        assert_eq!(stats.error_count(), 3);
        assert_eq!(stats.errors["base64"], 2);
    }

    #[test]
    fn test_fps_without_duration() {
        let mut stats = DriverStats::default();
        stats.steering.push(0.1);
        assert_eq!(stats.fps(), 0.0);

        stats.duration = Duration::from_secs(2);
        assert!((stats.fps() - 0.5).abs() < 1e-10);
    }
}
