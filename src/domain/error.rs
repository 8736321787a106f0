// Error taxonomy shared by the fetch pipeline
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// No transport has been installed on the request client
    #[error("no request transport available")]
    AdapterUnavailable,

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("malformed time string: {0}")]
    MalformedTimeString(String),

    /// The base collection of an aggregation could not be fetched
    #[error("collection fetch failed: {0}")]
    CollectionFetchFailed(String),

    #[error("returned malformed data: {0}")]
    MalformedResponse(String),

    #[error("no observations found in the range of dates: {0}")]
    NoObservations(String),
}

pub type Result<T> = std::result::Result<T, Error>;
