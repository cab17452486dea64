//! Error taxonomy for the completeness pipeline.
//!
//! Transient network and parse failures are absorbed by the endpoint client's
//! retry loop and never surface here; everything below is either a hard
//! configuration problem, a data-integrity problem, or the caller's own
//! deadline/cancellation firing.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompletenessError>;

#[derive(Debug, Error)]
pub enum CompletenessError {
    /// The retry policy's attempt ceiling was reached without a usable
    /// response. Never raised under the default unbounded policy.
    #[error("endpoint request failed after {attempts} attempts: {message}")]
    Endpoint { attempts: u64, message: String },

    #[error("deadline exceeded while querying the endpoint")]
    DeadlineExceeded,

    #[error("query cancelled")]
    Cancelled,

    #[error("invalid endpoint URL {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    #[error("invalid IRI {iri}: {message}")]
    InvalidIri { iri: String, message: String },

    /// A result row that cannot be assembled into a triple, e.g. a missing
    /// `s`/`p`/`o` binding or a non-resource predicate.
    #[error("malformed result row: {0}")]
    MalformedRow(String),

    #[error("malformed query results payload: {0}")]
    Results(String),

    #[error("shapes document error: {0}")]
    Shapes(String),

    #[error("malformed tabular data: {0}")]
    Tabular(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
