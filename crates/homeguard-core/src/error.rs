use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid tag id: {0}")]
    InvalidTagId(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("State invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
