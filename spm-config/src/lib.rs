use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use spm_core::geometry::DEFAULT_TOLERANCE;
use spm_core::units::UnitSettings;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub units: UnitSettings,
    #[serde(default)]
    pub frontend: FrontendConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `SPM_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("SPM_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ModelConfig {
    /// 几何判等容差（图形单位）。
    #[serde(default = "ModelConfig::default_tolerance")]
    pub tolerance: f64,
}

impl ModelConfig {
    fn default_tolerance() -> f64 {
        DEFAULT_TOLERANCE
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            tolerance: Self::default_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontendConfig {
    /// 启动时载入的图纸（JSON）；为空时生成示例模型。
    #[serde(default)]
    pub sample_drawing: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use spm_core::units::{ForceUnit, LengthUnit};
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.model.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(cfg.units, UnitSettings::default());
        assert!(cfg.frontend.sample_drawing.is_none());
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [model]
            tolerance = 0.01

            [units]
            length = "m"
            force = "N"

            [frontend]
            sample_drawing = "../drawings/frame.json"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.model.tolerance, 0.01);
        assert_eq!(cfg.units.length, LengthUnit::Meter);
        assert_eq!(cfg.units.force, ForceUnit::Newton);
        assert_eq!(
            cfg.frontend
                .sample_drawing
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("../drawings/frame.json".to_string())
        );
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[model]\ntolerance = \"tight\"").unwrap();
        let err = AppConfig::from_file(file.path()).expect_err("parse should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
