use thiserror::Error;

/// Canonical result for the calculator crates.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Incompatible specification: {0}")]
    IncompatibleSpecification(String),

    #[error("Unsupported output type: {0}")]
    UnsupportedOutputType(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Opaque failures from the grid data engine (process initialization,
    // histogram computation, etc.) are mapped into this variant.
    #[error("Engine fault: {0}")]
    EngineFault(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::EngineFault(e.to_string())
    }
}
