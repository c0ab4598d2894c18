//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 在临时端口上启动 `SocketServer` 与使用 mock 模型的 `Driver`
//! - 以模拟器的方式通过 HTTP 轮询或 websocket 收发 Engine.IO
//! - 录制与配置驱动的端到端验证

use std::net::SocketAddr;
use std::sync::Arc;

use contracts::{BridgeConfig, SteeringModel};
use driver::{Driver, DriverStats};
use preprocess::Preprocessor;
use recorder::Recorder;
use socket_server::{ServerHandle, SocketServer};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// 运行中的桥接：服务端 + driver 任务
pub struct Harness {
    pub addr: SocketAddr,
    pub server: ServerHandle,
    stop: oneshot::Sender<()>,
    driver: JoinHandle<DriverStats>,
}

impl Harness {
    /// Bind to `127.0.0.1:0` and start driving with `model`
    pub async fn start(config: BridgeConfig, model: Arc<dyn SteeringModel>) -> Self {
        let recorder = Recorder::from_config(&config.recording).unwrap();
        let preprocessor = Preprocessor::new(config.preprocess.clone()).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (server, mut events) = SocketServer::new(config.server.clone());
        let broadcaster = server.broadcaster();
        let server = server.spawn(listener).unwrap();

        let mut driver = Driver::new(model, preprocessor, config.policy, broadcaster, recorder);
        let (stop, stop_rx) = oneshot::channel();
        let driver = tokio::spawn(async move {
            tokio::select! {
                _ = driver.run(&mut events) => {}
                _ = stop_rx => {}
            }
            // Events already queued still count
            while let Ok(event) = events.try_recv() {
                driver.handle(event).await;
            }
            driver.finish().await
        });

        Self {
            addr: server.local_addr(),
            server,
            stop,
            driver,
        }
    }

    pub fn url(&self, query: &str) -> String {
        format!("http://{}/socket.io/?{}", self.addr, query)
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/socket.io/?{}", self.addr, query)
    }

    /// 停止服务并收集 driver 统计
    pub async fn stop(self) -> DriverStats {
        self.server.shutdown().await;
        let _ = self.stop.send(());
        self.driver.await.unwrap()
    }
}

/// 拆分 Engine.IO v4 轮询负载
pub fn split_v4(body: &str) -> Vec<String> {
    body.split('\u{1e}').map(str::to_string).collect()
}

/// 拆分 Engine.IO v3 `len:packet` 负载
pub fn split_v3(body: &str) -> Vec<String> {
    let mut packets = Vec::new();
    let mut rest = body;
    while let Some((len, tail)) = rest.split_once(':') {
        let len: usize = len.parse().unwrap();
        let end = tail.char_indices().nth(len).map_or(tail.len(), |(i, _)| i);
        packets.push(tail[..end].to_string());
        rest = &tail[end..];
    }
    packets
}

/// Frame an Engine.IO v3 text payload
pub fn frame_v3(packets: &[&str]) -> String {
    packets
        .iter()
        .map(|p| format!("{}:{}", p.encode_utf16().count(), p))
        .collect()
}

/// `telemetry` event body with the given speed and image
pub fn telemetry_event(speed: f64, image: &str) -> String {
    let payload = serde_json::json!({
        "steering_angle": "0.0",
        "throttle": "0.0",
        "speed": speed.to_string(),
        "image": image,
    });
    format!(r#"42["telemetry",{payload}]"#)
}

#[cfg(test)]
mod helper_tests {
    use super::*;

    #[test]
    fn test_v3_framing_round_trip() {
        let body = frame_v3(&["40", "42[\"steer\",{}]"]);
        assert_eq!(body, "2:4015:42[\"steer\",{}]");
        assert_eq!(split_v3(&body), vec!["40", "42[\"steer\",{}]"]);
    }

    #[test]
    fn test_demo_files_load() {
        let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");

        let config = config_loader::ConfigLoader::load_from_path(&demos.join("drive.toml")).unwrap();
        assert_eq!(config.server.port, 4567);
        assert!(!config.recording.is_enabled());

        let descriptor = inference::ModelDescriptor::from_path(&demos.join("model.json")).unwrap();
        assert_eq!(descriptor.input, contracts::InputShape::default());
        assert_eq!(
            inference::weights_path_for(&demos.join("model.json"), descriptor.format),
            demos.join("model.onnx")
        );
    }

    #[test]
    fn test_telemetry_event_shape() {
        let event = telemetry_event(4.5, "abc");
        assert!(event.starts_with(r#"42["telemetry",{"#));
        assert!(event.contains(r#""speed":"4.5""#));
    }
}

#[cfg(test)]
mod e2e_tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use futures_util::{SinkExt, StreamExt};
    use image::{ImageFormat, Rgb, RgbImage};
    use inference::{ConstantModel, MockModel};
    use std::io::Cursor;
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    const NEUTRAL: &str = r#"42["steer",{"steering_angle":"0","throttle":"0"}]"#;

    fn camera_frame() -> String {
        let img = RgbImage::from_fn(320, 160, |x, y| Rgb([(x / 2) as u8, (y % 256) as u8, 60]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        STANDARD.encode(buf.into_inner())
    }

    fn fast_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.server.ping_interval_ms = 100;
        config.server.ping_timeout_ms = 2_000;
        config
    }

    fn open_sid(packet: &str) -> String {
        let handshake: serde_json::Value = serde_json::from_str(&packet[1..]).unwrap();
        handshake["sid"].as_str().unwrap().to_string()
    }

    /// Long-poll until `want` shows up, returning everything seen
    async fn poll_until(
        client: &reqwest::Client,
        url: &str,
        split: fn(&str) -> Vec<String>,
        want: &str,
    ) -> Vec<String> {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while !seen.iter().any(|p: &String| p == want) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "never saw {want}, got {seen:?}"
            );
            let body = client.get(url).send().await.unwrap().text().await.unwrap();
            seen.extend(split(&body));
        }
        seen
    }

    async fn post(client: &reqwest::Client, url: &str, body: String) {
        let response = client.post(url).body(body).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_polling_v4_drive_session() {
        let harness = Harness::start(fast_config(), Arc::new(ConstantModel::new(0.5))).await;
        let client = reqwest::Client::new();

        let body = client
            .get(harness.url("EIO=4&transport=polling"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.starts_with('0'), "got: {body}");
        let sid = open_sid(&body);
        let url = harness.url(&format!("EIO=4&transport=polling&sid={sid}"));

        post(&client, &url, "40".to_string()).await;
        let seen = poll_until(&client, &url, split_v4, NEUTRAL).await;
        assert!(seen.iter().any(|p| p.starts_with("40{\"sid\":")));

        post(&client, &url, telemetry_event(4.2, &camera_frame())).await;
        poll_until(
            &client,
            &url,
            split_v4,
            r#"42["steer",{"steering_angle":"0.5","throttle":"1"}]"#,
        )
        .await;

        post(&client, &url, r#"42["telemetry"]"#.to_string()).await;
        poll_until(&client, &url, split_v4, r#"42["manual",{}]"#).await;

        post(&client, &url, "41".to_string()).await;

        let stats = harness.stop().await;
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.telemetry_received, 1);
        assert_eq!(stats.manual_events, 1);
        assert_eq!(stats.error_count(), 0);
    }

    #[tokio::test]
    async fn test_polling_v3_connects_on_open() {
        let harness = Harness::start(fast_config(), Arc::new(ConstantModel::new(-0.25))).await;
        let client = reqwest::Client::new();

        let body = client
            .get(harness.url("EIO=3&transport=polling&b64=1"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let packets = split_v3(&body);
        assert!(packets[0].starts_with('0'), "got: {packets:?}");
        let sid = open_sid(&packets[0]);
        let url = harness.url(&format!("EIO=3&transport=polling&b64=1&sid={sid}"));

        poll_until(&client, &url, split_v3, NEUTRAL).await;

        post(&client, &url, frame_v3(&[&telemetry_event(25.0, &camera_frame())])).await;
        poll_until(
            &client,
            &url,
            split_v3,
            r#"42["steer",{"steering_angle":"-0.25","throttle":"0.2"}]"#,
        )
        .await;

        let stats = harness.stop().await;
        assert_eq!(stats.commands_emitted, 2);
    }

    type WsStream =
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

    /// Next text frame, answering server pings on the way
    async fn recv_text(ws: &mut WsStream) -> String {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            match msg {
                Message::Text(text) if text == "2" => {
                    ws.send(Message::Text("3".to_string())).await.unwrap();
                }
                Message::Text(text) => return text,
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_websocket_v4_drive_session() {
        let model = Arc::new(MockModel::new(0.25).then_fail("warming up"));
        let harness = Harness::start(fast_config(), model.clone()).await;

        let (mut ws, _) = connect_async(harness.ws_url("EIO=4&transport=websocket"))
            .await
            .unwrap();

        let open = recv_text(&mut ws).await;
        assert!(open.starts_with('0'), "got: {open}");

        ws.send(Message::Text("40".to_string())).await.unwrap();
        let mut texts = Vec::new();
        while !texts.iter().any(|t: &String| t == NEUTRAL) {
            texts.push(recv_text(&mut ws).await);
        }
        assert!(texts.iter().any(|t| t.starts_with("40{\"sid\":")));

        // First frame fails inside the model, the second is answered
        for _ in 0..2 {
            ws.send(Message::Text(telemetry_event(12.0, &camera_frame())))
                .await
                .unwrap();
        }
        let want = r#"42["steer",{"steering_angle":"0.25","throttle":"0.2"}]"#;
        loop {
            let text = recv_text(&mut ws).await;
            if text == want {
                break;
            }
            assert!(!text.starts_with("42[\"steer\""), "unexpected {text}");
        }

        ws.close(None).await.unwrap();
        let stats = harness.stop().await;
        assert_eq!(model.calls(), 2);
        assert_eq!(stats.errors.get("inference"), Some(&1));
        assert_eq!(stats.commands_emitted, 2);
    }

    #[tokio::test]
    async fn test_recording_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fast_config();
        config.recording.path = Some(dir.path().to_path_buf());

        let harness = Harness::start(config, Arc::new(ConstantModel::new(0.0))).await;
        let client = reqwest::Client::new();

        let body = client
            .get(harness.url("EIO=4&transport=polling"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let url = harness.url(&format!("EIO=4&transport=polling&sid={}", open_sid(&body)));

        post(&client, &url, "40".to_string()).await;
        poll_until(&client, &url, split_v4, NEUTRAL).await;
        post(&client, &url, telemetry_event(30.0, &camera_frame())).await;
        poll_until(
            &client,
            &url,
            split_v4,
            r#"42["steer",{"steering_angle":"0","throttle":"0.2"}]"#,
        )
        .await;

        let stats = harness.stop().await;
        assert_eq!(stats.records_queued, 1);

        let log =
            std::fs::read_to_string(dir.path().join(recorder::LOG_FILE_NAME)).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert_eq!(std::fs::read_dir(dir.path().join("IMG")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_config_file_drives_policy() {
        let config = config_loader::ConfigLoader::load_from_str(
            "[policy]\nspeed_threshold = 50.0\nlow_speed_throttle = 0.6\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        let config = BridgeConfig {
            server: fast_config().server,
            ..config
        };

        let harness = Harness::start(config, Arc::new(ConstantModel::new(0.0))).await;
        let client = reqwest::Client::new();
        let body = client
            .get(harness.url("EIO=4&transport=polling"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let url = harness.url(&format!("EIO=4&transport=polling&sid={}", open_sid(&body)));

        post(&client, &url, "40".to_string()).await;
        post(&client, &url, telemetry_event(30.0, &camera_frame())).await;
        poll_until(
            &client,
            &url,
            split_v4,
            r#"42["steer",{"steering_angle":"0","throttle":"0.6"}]"#,
        )
        .await;

        harness.stop().await;
    }
}
