use std::path::PathBuf;

use clap::Parser;
use spm_config::{AppConfig, ConfigError};
use spm_frontend::CliOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 桁条-面板模型的命令行前端。
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径，缺省时读取 `SPM_CONFIG` 或 `./config/default.toml`。
    #[arg(long)]
    config: Option<PathBuf>,
    /// 启动时载入的 JSON 图纸，优先于 `SPM_SAMPLE_DRAWING` 与配置项。
    #[arg(long)]
    drawing: Option<PathBuf>,
    /// 运行结束后保存图纸的路径。
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let config = load_configuration(cli.config);
    init_logging(&config);
    info!("启动 SPM Rust 应用");

    let options = CliOptions {
        config,
        drawing: cli.drawing,
        save: cli.save,
    };
    if let Err(err) = spm_frontend::run_cli_demo(&options) {
        error!(error = %err, "执行 CLI 演示失败");
        std::process::exit(1);
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
