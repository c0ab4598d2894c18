//! 桥接指标收集模块
//!
//! 对 `metrics` 门面的薄封装，指标名称集中在此处；
//! `RunningStats` 用于退出时打印的摘要。

use metrics::{counter, gauge, histogram};

/// 记录遥测消息接收
pub fn record_telemetry_received() {
    counter!("drive_bridge_telemetry_received_total").increment(1);
}

/// 记录 `steer` 指令发送（附带转向角）
pub fn record_command_emitted(steering_angle: f64, throttle: f64) {
    counter!("drive_bridge_commands_emitted_total").increment(1);
    gauge!("drive_bridge_last_steering_angle").set(steering_angle);
    gauge!("drive_bridge_last_throttle").set(throttle);
}

/// 记录模型推理延迟
pub fn record_inference_latency_ms(latency_ms: f64) {
    histogram!("drive_bridge_inference_latency_ms").record(latency_ms);
}

/// 记录解码 + 预处理延迟
pub fn record_preprocess_latency_ms(latency_ms: f64) {
    histogram!("drive_bridge_preprocess_latency_ms").record(latency_ms);
}

/// 记录未产生指令的遥测帧
pub fn record_frame_error(kind: &'static str) {
    counter!("drive_bridge_frame_errors_total", "kind" => kind).increment(1);
}

/// 记录当前连接的 Socket.IO 客户端数
pub fn record_clients_connected(count: usize) {
    gauge!("drive_bridge_clients_connected").set(count as f64);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
