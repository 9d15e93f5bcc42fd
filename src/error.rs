use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Transfer {0} is already tracked")]
    Duplicate(String),

    #[error("Transfer registry is no longer running")]
    RegistryClosed,

    #[error("Storage error: {0}")]
    Storage(#[from] fjall::Error),

    #[error("Snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Event stream for transfer {transfer_id} answered with HTTP {status}")]
    StreamStatus { transfer_id: String, status: u16 },

    #[error("Remote rejected the request (code {code}): {message}")]
    Remote { code: i32, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;
