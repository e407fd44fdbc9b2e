use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    Download(#[from] hlspoll_engine::HlsError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
