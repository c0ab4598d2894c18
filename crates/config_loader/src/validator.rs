//! 配置校验模块
//!
//! 校验规则：
//! - 合约结构体上声明的字段范围 (`validator` derive)
//! - server host 非空，ping timeout > 0
//! - crop_top < crop_bottom
//! - blur kernel 为奇数（0 与 1 表示禁用）
//! - throttle 为有限值且在 [-1, 1] 内
//! - 设置 recording path 时不得为空

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use contracts::{BridgeConfig, ContractError};

/// 校验 BridgeConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &BridgeConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_server(config)?;
    validate_preprocess(config)?;
    validate_policy(config)?;
    validate_recording(config)?;
    Ok(())
}

/// 执行 derive 生成的范围校验
fn validate_ranges(config: &BridgeConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, "")
            .unwrap_or_else(|| (String::from("config"), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// Flatten nested validator errors into `(dotted.path, message)`, sorted by path
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (key, kind) in entries {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(err) = field_errors.first() {
                    let message = match (&err.message, err.params.get("value")) {
                        (Some(msg), _) => msg.to_string(),
                        (None, Some(value)) => format!("failed '{}' check, got {}", err.code, value),
                        (None, None) => format!("failed '{}' check", err.code),
                    };
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 校验服务端配置
fn validate_server(config: &BridgeConfig) -> Result<(), ContractError> {
    let server = &config.server;

    if server.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "server.host",
            "host cannot be empty",
        ));
    }

    if server.ping_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "server.ping_timeout_ms",
            "ping_timeout_ms must be > 0",
        ));
    }

    Ok(())
}

/// 校验预处理配置
fn validate_preprocess(config: &BridgeConfig) -> Result<(), ContractError> {
    let pre = &config.preprocess;

    if pre.crop_top >= pre.crop_bottom {
        return Err(ContractError::config_validation(
            "preprocess.crop_top / preprocess.crop_bottom",
            format!(
                "crop_top ({}) must be < crop_bottom ({})",
                pre.crop_top, pre.crop_bottom
            ),
        ));
    }

    if pre.blur_kernel > 1 && pre.blur_kernel % 2 == 0 {
        return Err(ContractError::config_validation(
            "preprocess.blur_kernel",
            format!("blur_kernel must be odd, got {}", pre.blur_kernel),
        ));
    }

    Ok(())
}

/// 校验油门策略
fn validate_policy(config: &BridgeConfig) -> Result<(), ContractError> {
    let policy = &config.policy;

    for (field, value) in [
        ("policy.low_speed_throttle", policy.low_speed_throttle),
        ("policy.cruise_throttle", policy.cruise_throttle),
    ] {
        if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
            return Err(ContractError::config_validation(
                field,
                format!("throttle must be within [-1, 1], got {value}"),
            ));
        }
    }

    if !policy.speed_threshold.is_finite() {
        return Err(ContractError::config_validation(
            "policy.speed_threshold",
            "speed_threshold must be finite",
        ));
    }

    Ok(())
}

/// 校验录制配置
fn validate_recording(config: &BridgeConfig) -> Result<(), ContractError> {
    if let Some(path) = &config.recording.path {
        if path.as_os_str().is_empty() {
            return Err(ContractError::config_validation(
                "recording.path",
                "recording path cannot be empty",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        assert!(validate(&BridgeConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_port_reports_nested_field() {
        let mut config = BridgeConfig::default();
        config.server.port = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("server.port"), "got: {err}");
    }

    #[test]
    fn test_empty_host() {
        let mut config = BridgeConfig::default();
        config.server.host = "  ".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("host cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_inverted_crop() {
        let mut config = BridgeConfig::default();
        config.preprocess.crop_top = 100;
        config.preprocess.crop_bottom = 100;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("must be < crop_bottom"), "got: {err}");
    }

    #[test]
    fn test_even_blur_kernel() {
        let mut config = BridgeConfig::default();
        config.preprocess.blur_kernel = 4;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("must be odd"), "got: {err}");
    }

    #[test]
    fn test_disabled_blur_kernel_is_valid() {
        let mut config = BridgeConfig::default();
        config.preprocess.blur_kernel = 0;
        assert!(validate(&config).is_ok());
        config.preprocess.blur_kernel = 1;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_throttle_out_of_range() {
        let mut config = BridgeConfig::default();
        config.policy.cruise_throttle = 1.5;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("policy.cruise_throttle"), "got: {err}");
    }

    #[test]
    fn test_negative_throttle_is_braking() {
        let mut config = BridgeConfig::default();
        config.policy.cruise_throttle = -0.5;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_recording_path() {
        let mut config = BridgeConfig::default();
        config.recording.path = Some(PathBuf::new());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }
}
