use thiserror::Error;

/// Main pipeline error type
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Batch size must be at most {ceiling}, got {batch_size}")]
    InvalidConfiguration { batch_size: usize, ceiling: usize },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid storage URI: {uri}")]
    InvalidUri { uri: String },

    #[error("Storage operation failed")]
    Storage(#[from] StorageError),

    #[error("Document AI request failed")]
    Processing(#[from] ProcessingError),

    #[error("Batch {batch_index} failed (operation {})", .operation.as_deref().unwrap_or("<not submitted>"))]
    Submission {
        batch_index: usize,
        operation: Option<String>,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Operation {operation} did not complete within {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },

    #[error("Failed to write {path}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Object storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Storage API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("IO error at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid response from storage API")]
    InvalidResponse(#[source] serde_json::Error),
}

/// Document AI errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Document AI error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Operation {operation} failed (code {code}): {message}")]
    OperationFailed {
        operation: String,
        code: i32,
        message: String,
    },

    #[error("Invalid response from Document AI")]
    InvalidResponse(#[source] serde_json::Error),
}

impl StorageError {
    /// Whether the error means the object was already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Render an error and its full `source()` chain on a single line.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
