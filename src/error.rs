use thiserror::Error;

/// Errors raised while ingesting or querying attendance data.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// The source could not be parsed even with the fallback header row.
    #[error("failed to ingest attendance source: {0}")]
    Ingestion(String),
    #[error("required column '{0}' not found")]
    MissingColumn(String),
    #[error("roll number '{0}' not found")]
    UnknownStudent(String),
    #[error("metric undefined: {0}")]
    UndefinedMetric(String),
    #[error("row {row}: column '{column}' holds non-numeric value '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the credential store and login flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username '{0}' already exists")]
    DuplicateUser(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    /// A student account whose roll number is absent from the attendance records.
    #[error("roll number '{0}' is not present in the attendance records")]
    UnknownRoll(String),
    #[error("{role} access required")]
    Forbidden { role: &'static str },
    #[error("credential store error: {0}")]
    Store(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
