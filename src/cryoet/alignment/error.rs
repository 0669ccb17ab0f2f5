use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool reads, converts, or emits alignment data.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when rendering a text file fails.
    #[error("formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a line or field of a native or interchange file is malformed.
    #[error("failed to parse {format}: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    /// Raised when per-frame lists or table rows disagree in length.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Raised when frame bookkeeping does not add up, e.g. dark frames plus
    /// global alignments differing from the raw frame count.
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// Raised when a required dimension is zero or negative.
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    /// Raised when the input mode for a multi-file bundle is missing or ambiguous.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Raised when a workbook does not follow the expected sheet conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a location uses a storage scheme no backend serves.
    #[error("unsupported storage location '{0}'")]
    UnsupportedLocation(String),

    /// Raised when the CLI receives an unsupported conversion request.
    #[error("unsupported conversion from {from:?} to {to:?}")]
    UnsupportedConversion { from: String, to: String },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ToolError {
    pub(crate) fn parse(format: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            message: message.into(),
        }
    }
}
