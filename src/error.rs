use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvoicerError {
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid request: {0}")]
    Fields(#[from] validator::ValidationErrors),

    #[error("Invalid invoice prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid line item {line}: {reason}")]
    InvalidLineItem { line: usize, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl InvoicerError {
    /// True for errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InvoicerError::Validation(_)
                | InvoicerError::Fields(_)
                | InvoicerError::InvalidPrefix(_)
                | InvoicerError::InvalidLineItem { .. }
                | InvoicerError::NotFound(_)
                | InvoicerError::Conflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, InvoicerError>;
