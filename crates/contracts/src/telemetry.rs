//! Telemetry / SteerCommand - wire payloads
//!
//! The simulator reports every number as a decimal string and expects the
//! same back, so both types read strings or numbers and `SteerCommand`
//! always writes strings.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Per-frame message from the simulator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Steering angle currently applied by the car
    #[serde(default, deserialize_with = "lenient_f64")]
    pub steering_angle: f64,

    /// Throttle currently applied by the car
    #[serde(default, deserialize_with = "lenient_f64")]
    pub throttle: f64,

    /// Current speed
    #[serde(default, deserialize_with = "lenient_f64")]
    pub speed: f64,

    /// Center camera image, base64 encoded
    pub image: String,
}

/// Command sent back on the `steer` event
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SteerCommand {
    #[serde(serialize_with = "as_decimal_string", deserialize_with = "lenient_f64")]
    pub steering_angle: f64,

    #[serde(serialize_with = "as_decimal_string", deserialize_with = "lenient_f64")]
    pub throttle: f64,
}

impl SteerCommand {
    pub fn new(steering_angle: f64, throttle: f64) -> Self {
        Self {
            steering_angle,
            throttle,
        }
    }

    /// Wheels straight, no throttle. Sent to every client on connect.
    pub fn neutral() -> Self {
        Self::default()
    }
}

fn as_decimal_string<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Float(f64),
        Text(String),
    }

    match Option::<Number>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(Number::Float(v)) => Ok(v),
        Some(Number::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| de::Error::custom(format!("invalid number '{s}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_accepts_string_numbers() {
        let json = r#"{"steering_angle":"-0.25","throttle":"0.5","speed":"12.3","image":"abc"}"#;
        let t: Telemetry = serde_json::from_str(json).unwrap();
        assert_eq!(t.steering_angle, -0.25);
        assert_eq!(t.throttle, 0.5);
        assert_eq!(t.speed, 12.3);
        assert_eq!(t.image, "abc");
    }

    #[test]
    fn telemetry_accepts_plain_numbers_and_missing_fields() {
        let json = r#"{"speed":3,"image":""}"#;
        let t: Telemetry = serde_json::from_str(json).unwrap();
        assert_eq!(t.speed, 3.0);
        assert_eq!(t.throttle, 0.0);
        assert_eq!(t.steering_angle, 0.0);
    }

    #[test]
    fn telemetry_rejects_garbage_number() {
        let json = r#"{"speed":"fast","image":""}"#;
        let err = serde_json::from_str::<Telemetry>(json).unwrap_err();
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn steer_command_serializes_as_strings() {
        let value = serde_json::to_value(SteerCommand::new(-0.125, 1.0)).unwrap();
        assert_eq!(value["steering_angle"], "-0.125");
        assert_eq!(value["throttle"], "1");

        let value = serde_json::to_value(SteerCommand::new(0.0, 0.2)).unwrap();
        assert_eq!(value["steering_angle"], "0");
        assert_eq!(value["throttle"], "0.2");
    }

    #[test]
    fn neutral_command_is_zero() {
        let value = serde_json::to_value(SteerCommand::neutral()).unwrap();
        assert_eq!(value, serde_json::json!({"steering_angle": "0", "throttle": "0"}));
    }
}
