//! 配置校验模块
//!
//! 校验规则：
//! - 配置结构体上声明的字段范围 (`validator` derive)
//! - 每个对象类别的上报阈值小于重置阈值
//! - 视觉地址为 IPv4 socket 地址

use std::net::SocketAddrV4;

use contracts::{ContractError, InspectorConfig, ObjectClass};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// 校验 InspectorConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &InspectorConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_loss_thresholds(config)?;
    validate_vision_address(config)?;
    Ok(())
}

fn validate_ranges(config: &InspectorConfig) -> Result<(), ContractError> {
    let Err(errors) = config.validate() else {
        return Ok(());
    };
    let (field, message) = first_violation(&errors, "")
        .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
    Err(ContractError::config_validation(field, message))
}

/// Depth-first, alphabetical, so the reported field is stable
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(errors) => {
                errors.first().map(|e| (path.clone(), describe(e)))
            }
            ValidationErrorsKind::Struct(inner) => first_violation(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(index, inner)| first_violation(inner, &format!("{path}[{index}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match error.params.get("value") {
        Some(value) => format!("failed '{}' check (value: {value})", error.code),
        None => format!("failed '{}' check", error.code),
    }
}

fn validate_loss_thresholds(config: &InspectorConfig) -> Result<(), ContractError> {
    for class in [ObjectClass::Robot, ObjectClass::Ball] {
        let thresholds = config.data_loss.thresholds(class);
        if thresholds.report_gap_s >= thresholds.reset_gap_s {
            return Err(ContractError::config_validation(
                format!("data_loss.{class}.report_gap_s"),
                format!(
                    "report_gap_s ({}) must be < reset_gap_s ({})",
                    thresholds.report_gap_s, thresholds.reset_gap_s
                ),
            ));
        }
    }
    Ok(())
}

fn validate_vision_address(config: &InspectorConfig) -> Result<(), ContractError> {
    config
        .vision
        .address
        .parse::<SocketAddrV4>()
        .map(|_| ())
        .map_err(|e| {
            ContractError::config_validation(
                "vision.address",
                format!("'{}' is not an IPv4 socket address: {e}", config.vision.address),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate(&InspectorConfig::default()).is_ok());
    }

    #[test]
    fn test_nested_range_reports_path() {
        let mut config = InspectorConfig::default();
        config.tracking.visible_quality_threshold = 1.5;
        let err = validate(&config).unwrap_err().to_string();
        assert!(
            err.contains("tracking.visible_quality_threshold"),
            "got: {err}"
        );
        assert!(err.contains("range"), "got: {err}");
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = InspectorConfig::default();
        config.windows.robot_quality_window_s = 0.0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("windows.robot_quality_window_s"), "got: {err}");
    }

    #[test]
    fn test_report_gap_above_reset_gap() {
        let mut config = InspectorConfig::default();
        config.data_loss.ball.report_gap_s = 2.0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("data_loss.ball.report_gap_s"), "got: {err}");
        assert!(err.contains("must be <"), "got: {err}");
    }

    #[test]
    fn test_invalid_vision_address() {
        let mut config = InspectorConfig::default();
        config.vision.address = "vision.local".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("vision.address"), "got: {err}");

        config.vision.address = "[ff02::1]:10006".into();
        assert!(validate(&config).is_err());
    }
}
