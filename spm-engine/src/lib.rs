pub mod attributes;
pub mod catalog;
pub mod collection;
pub mod command;
pub mod conditions;
pub mod effects;
pub mod factory;
pub mod graveyard;
pub mod host;
pub mod model;
pub mod persistence;
pub mod records;
pub mod session;
pub mod structural;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    pub enum EngineError {
        #[error("位置 ({x:.3}, {y:.3}) 处没有节点")]
        NodeNotFound { x: f64, y: f64 },
        #[error("命令参数无效: {0}")]
        InvalidArgument(String),
    }
}
