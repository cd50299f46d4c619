//! Error types for dependagraph.
//!
//! Per-crawl failures ([`Error::MalformedReference`], [`Error::Fetch`],
//! [`Error::Persistence`]) abort one crawl and are logged by the frontier
//! driver. Only configuration errors and a malformed seed end the process.

use crate::domain::RepositoryReference;
use std::fmt;
use std::io;
use thiserror::Error;

/// The error type for dependagraph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A repository reference string was not in `org/repo` form.
    #[error(transparent)]
    MalformedReference(#[from] MalformedReferenceError),

    /// A neighborhood query failed; nothing was written for this crawl.
    #[error("failed to fetch {query} of {reference}")]
    Fetch {
        /// The repository being crawled.
        reference: RepositoryReference,
        /// Which of the two queries failed.
        query: NeighborhoodQuery,
        /// The underlying source failure.
        #[source]
        source: SourceError,
    },

    /// The graph store rejected a write or read.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Startup configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A string that is not a valid `org/repo` reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid repository reference '{input}': {reason}")]
pub struct MalformedReferenceError {
    input: String,
    reason: &'static str,
}

impl MalformedReferenceError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }

    /// The rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// The two reads that make up one crawl window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborhoodQuery {
    /// Repositories and packages the crawled repository depends on.
    Dependencies,
    /// Repositories that depend on the crawled repository.
    Dependents,
}

impl fmt::Display for NeighborhoodQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeighborhoodQuery::Dependencies => write!(f, "dependencies"),
            NeighborhoodQuery::Dependents => write!(f, "dependents"),
        }
    }
}

/// Failures reported by a dependency source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status.
    #[error("unexpected HTTP status {status} from {url}")]
    Status {
        /// The response status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// The GraphQL response carried an `errors` array.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The repository does not exist or is not visible with these credentials.
    #[error("repository not found: {0}")]
    RepositoryNotFound(RepositoryReference),

    /// Free-form failure, used by scripted sources in tests.
    #[error("{0}")]
    Other(String),
}

/// Failures reported by a graph store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error on a file-backed store.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The window log could not be read or written.
    #[error("window log error: {0}")]
    Log(#[from] dependagraph_jsonl::Error),

    /// The database endpoint could not be reached.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The database rejected a statement; the transaction was rolled back.
    #[error("database error {code}: {message}")]
    Database {
        /// Backend error code (e.g. `Neo.ClientError.Statement.SyntaxError`).
        code: String,
        /// Backend error message.
        message: String,
    },

    /// The database answered with a non-success HTTP status.
    #[error("unexpected HTTP status {0} from graph store")]
    Status(u16),

    /// The store address does not name a supported backend.
    #[error("unsupported graph store URI '{0}' (expected http(s)://, jsonl:<path> or memory:)")]
    UnsupportedUri(String),
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("{0} not set")]
    MissingVariable(&'static str),

    /// No seed repository was given on the command line or in the environment.
    #[error("no seed repository: pass --repository or set DEPENDAGRAPH_REPOSITORY")]
    MissingRepository,
}

/// A specialized Result type for dependagraph operations.
pub type Result<T> = std::result::Result<T, Error>;
