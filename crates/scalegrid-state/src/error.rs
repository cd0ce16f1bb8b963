use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

/// Store failures. Backend errors are kept as their message.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("opening state database: {0}")]
    Open(String),

    #[error("state transaction: {0}")]
    Transaction(String),

    #[error("opening state table: {0}")]
    Table(String),

    #[error("reading state: {0}")]
    Read(String),

    #[error("writing state: {0}")]
    Write(String),

    #[error("encoding record: {0}")]
    Serialize(String),

    #[error("decoding record: {0}")]
    Deserialize(String),

    /// Rejected before anything was written.
    #[error("invalid workload spec: {0}")]
    Invalid(String),
}
