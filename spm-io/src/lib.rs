use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spm_core::document::Document;
use thiserror::Error;

/// 图纸文件的格式版本。
pub const DRAWING_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported drawing version: {0}")]
    UnsupportedVersion(u32),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

#[derive(Serialize)]
struct DrawingFileRef<'a> {
    version: u32,
    document: &'a Document,
}

#[derive(Deserialize)]
struct DrawingFile {
    version: u32,
    document: Document,
}

/// JSON 图纸读写：图元、图层、扩展字典与命名对象字典一并保存。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFacade;

impl JsonFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, data: &str) -> Result<Document, IoError> {
        let file: DrawingFile =
            serde_json::from_str(data).map_err(|err| IoError::InvalidDocument(err.to_string()))?;
        if file.version != DRAWING_FORMAT_VERSION {
            return Err(IoError::UnsupportedVersion(file.version));
        }
        Ok(file.document)
    }

    pub fn to_json(&self, document: &Document) -> Result<String, IoError> {
        serde_json::to_string_pretty(&DrawingFileRef {
            version: DRAWING_FORMAT_VERSION,
            document,
        })
        .map_err(|err| IoError::InvalidDocument(err.to_string()))
    }
}

impl DocumentLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&data)
    }
}

impl DocumentSaver for JsonFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let data = self.to_json(document)?;
        fs::write(path, data).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_version() {
        let facade = JsonFacade::new();
        let data = serde_json::json!({ "version": 99, "document": Document::new() }).to_string();
        assert!(matches!(
            facade.parse_str(&data),
            Err(IoError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        let facade = JsonFacade::new();
        assert!(matches!(
            facade.parse_str("{ not json"),
            Err(IoError::InvalidDocument(_))
        ));
    }
}
