//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::InspectorConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    vision_address: String,
    receive_timeout_ms: u64,
    clock_enabled: bool,
    metrics_port: u16,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    vision_address: config.vision.address.clone(),
                    receive_timeout_ms: config.vision.receive_timeout_ms,
                    clock_enabled: config.clock.enabled,
                    metrics_port: config.metrics.port,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &InspectorConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let timeout_s = config.vision.receive_timeout_ms as f64 / 1000.0;
    if timeout_s > config.windows.visibility_timeout_s {
        warnings.push(format!(
            "vision.receive_timeout_ms ({}) exceeds windows.visibility_timeout_s - \
             tracks are evicted before silence is detected",
            config.vision.receive_timeout_ms
        ));
    }

    if config.render.interval_ms < config.clock.sample_interval_ms && config.clock.enabled {
        warnings.push(
            "render.interval_ms is shorter than clock.sample_interval_ms - \
             clock statistics refresh slower than the report"
                .to_string(),
        );
    }

    if config.render.log_tail == 0 {
        warnings.push("render.log_tail is 0 - the event log is hidden".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Vision address: {}", summary.vision_address);
            println!("  Receive timeout: {} ms", summary.receive_timeout_ms);
            println!("  Clock watching: {}", summary.clock_enabled);
            println!("  Metrics port: {}", summary.metrics_port);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(contents: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_valid_file_with_warning() {
        let (_file, args) = args_for("[render]\nlog_tail = 0\n");
        let result = validate_config(&args);
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("log_tail")));
    }

    #[test]
    fn test_invalid_file() {
        let (_file, args) = args_for("[tracking]\nvisible_quality_threshold = 2.0\n");
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("visible_quality_threshold"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/inspector.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().starts_with("File not found"));
    }
}
