use thiserror::Error;

/// Ledger store failures
///
/// All variants are infrastructure problems; from the processor's point of
/// view they are transient and the message is redelivered.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Ledger store unavailable")]
    Unavailable,

    #[error("Corrupt ledger record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                LedgerError::Unavailable
            }
            other => LedgerError::Database(other.to_string()),
        }
    }
}
