use thiserror::Error;

/// Error type for calcstore operations.
#[derive(Debug, Error)]
pub enum CalcStoreError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("transaction error: {0}")]
    TransactionError(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("reference error: {0}")]
    ReferenceError(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("integrity error: {0}")]
    IntegrityError(String),
}

impl CalcStoreError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::QueryError(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::TransactionError(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::InvalidInput(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::NotFound(msg.into())
    }

    pub fn reference<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::ReferenceError(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::ValidationError(msg.into())
    }

    pub fn integrity<T: Into<String>>(msg: T) -> Self {
        CalcStoreError::IntegrityError(msg.into())
    }

    /// True for the four chain-level failures callers report to their clients;
    /// false for storage or connection problems.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            CalcStoreError::NotFound(_)
                | CalcStoreError::ReferenceError(_)
                | CalcStoreError::ValidationError(_)
                | CalcStoreError::IntegrityError(_)
        )
    }
}
