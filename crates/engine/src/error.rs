//! Error taxonomy for the ranking pipeline
//!
//! Fetch failures are fatal and abort the run before anything is sent.
//! Empty histories and numeric anomalies are not errors: the former drops the
//! pool, the latter propagates as `NaN` into the ranking.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("subgraph request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("subgraph returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("subgraph response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("subgraph response has no `data` key")]
    MissingData,

    #[error("subgraph query failed: {0}")]
    GraphQl(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

pub type FetchResult<T> = Result<T, FetchError>;
