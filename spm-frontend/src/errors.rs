use spm_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("保存图纸失败: {0}")]
    Save(#[from] IoError),
}
