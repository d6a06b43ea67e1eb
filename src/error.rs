use thiserror::Error;

/// 流水线统一错误类型
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Fonte de arquivos: {0}")]
    Fonte(String),

    #[error("Master store encerrado")]
    StoreEncerrado,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
