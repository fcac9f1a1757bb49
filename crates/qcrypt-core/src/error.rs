use thiserror::Error;

pub type QcryptResult<T> = Result<T, QcryptError>;

#[derive(Debug, Error)]
pub enum QcryptError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
