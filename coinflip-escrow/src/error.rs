use thiserror::Error;

pub type OracleResult<T> = std::result::Result<T, OracleError>;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Invalid oracle seed: {0}")]
    InvalidSeed(String),

    #[error("Request {0} was not addressed to this oracle's purpose")]
    UnsupportedRequest(String),
}
