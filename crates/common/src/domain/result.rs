use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unrecognized route: {0}")]
    UnrecognizedRoute(String),

    #[error("Unknown correlation for message: {0}")]
    UnknownCorrelation(String),

    #[error("Malformed billing data: {0}")]
    MalformedBillingData(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Persistence failure: {0:#}")]
    PersistenceFailure(#[from] anyhow::Error),
}

impl DomainError {
    /// Everything except a failed durable write is handled by acknowledging the event.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DomainError::PersistenceFailure(_))
    }
}
