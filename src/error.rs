use thiserror::Error;

/// A page fetch that cannot be recovered by retrying. The traversal branch
/// behind the failed URL is abandoned; the crawl itself continues.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A single record that cannot be normalized. The record is dropped and the
/// crawl continues; an unrecognized rating word is NOT one of these (it
/// normalizes to the 0 sentinel instead).
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed price {0:?}")]
    MalformedPrice(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}
