//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, SimulationBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<SimulationBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ContractError::ConfigParse {
            message: format!("TOML parse error: {e}"),
            source: Some(Box::new(e)),
        }),
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
                message: format!("JSON parse error: {e}"),
                source: Some(Box::new(e)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::GeneratorConfig;

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "simulation": { "patient_count": 3 },
            "generators": [
                { "kind": "alert", "rate_lambda": 0.2 }
            ],
            "sinks": [{ "name": "out", "sink_type": "file" }]
        }"#;
        let bp = parse(content, ConfigFormat::Json).unwrap();
        assert_eq!(bp.simulation.tick_interval_ms, 1000);
        assert_eq!(bp.simulation.seed, None);
        match &bp.generators[0] {
            GeneratorConfig::Alert(alert) => {
                assert_eq!(alert.rate_lambda, 0.2);
                assert_eq!(alert.resolve_probability, 0.9);
            }
            other => panic!("unexpected generator {other:?}"),
        }
        assert_eq!(bp.sinks[0].queue_capacity, 1024);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse("invalid toml [[[", ConfigFormat::Toml);
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_generator_kind() {
        let content = r#"
[simulation]
patient_count = 1

[[generators]]
kind = "heart_rate"
"#;
        assert!(parse(content, ConfigFormat::Toml).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
