pub mod cli;
pub mod errors;
pub mod loader;

pub use cli::CliOptions;

use errors::FrontendError;
use tracing::info;

/// 启动 CLI 演示或返回错误。
pub fn run_cli_demo(options: &CliOptions) -> Result<(), FrontendError> {
    info!("启动 CLI 演示前端");
    cli::run_demo(options)
}
