//! Error types for the application layer

use ai_chatter_providers::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] ai_chatter_core::Error),

    #[error("Completion request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Could not fetch page: {0}")]
    Fetch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
