//! Error types for Elasticsearch operations.

use thiserror::Error;

/// Error type covering every failure mode of the client.
///
/// Callers are expected to branch on the variant (or the `is_*` predicates),
/// never on message content.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Configuration validation failure.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// API misuse, e.g. scanning a scroll iterator before `next()`.
    #[error("contract violation: {0}")]
    Contract(String),

    /// Document not found (HTTP 404 or `found: false`).
    #[error("document not found: {index}/{id}")]
    NotFound {
        /// Index name.
        index: String,
        /// Document ID.
        id: String,
    },

    /// Document already exists (version conflict on a create-only write).
    #[error("document already exists: {index}/{id}")]
    DocumentExists {
        /// Index name.
        index: String,
        /// Document ID.
        id: String,
    },

    /// Index not found.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// Index already exists.
    #[error("index already exists: {0}")]
    IndexExists(String),

    /// Mapping or illegal-argument error reported by the server.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Deadline exceeded.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Transport-level failure: dial error, connection refused, no route.
    #[error("connection error: {0}")]
    Connection(String),

    /// Non-2xx response not matching a more specific kind.
    #[error("server error: {status} - {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body as returned by the server.
        body: String,
    },

    /// Request or response codec failure.
    #[error("decode error: {0}")]
    Decode(String),

    /// Reconnect budget spent without re-establishing a connection.
    #[error("reconnect attempts exhausted after {attempts} attempts")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify a transport-level failure.
    ///
    /// Structural where possible, otherwise keyword-based over the error text:
    /// deadline errors become [`Error::Timeout`], everything else at this
    /// layer is a connection problem.
    pub(crate) fn transport(err: opensearch::Error) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") || lower.contains("deadline") {
            Error::Timeout(msg)
        } else {
            Error::Connection(msg)
        }
    }

    /// Classify a non-2xx server response by its body.
    ///
    /// Keyword-based, matching the exception names Elasticsearch and
    /// OpenSearch put in error payloads. Call sites that know the offending
    /// index/id map 404 and 409 themselves for richer context.
    pub(crate) fn server(status: u16, body: String) -> Self {
        let lower = body.to_lowercase();
        if lower.contains("index_not_found_exception") || lower.contains("no such index") {
            Error::IndexNotFound(body)
        } else if lower.contains("resource_already_exists_exception") {
            Error::IndexExists(body)
        } else if lower.contains("version_conflict") || lower.contains("document already exists") {
            let (index, id) = conflict_context(&body);
            Error::DocumentExists { index, id }
        } else if lower.contains("mapp") || lower.contains("illegal_argument_exception") {
            Error::Mapping(body)
        } else {
            Error::Server { status, body }
        }
    }

    /// Decode failure for a value of type `T`.
    pub(crate) fn decode<T>(err: serde_json::Error) -> Self {
        Error::Decode(format!(
            "failed to decode {}: {err}",
            std::any::type_name::<T>()
        ))
    }

    /// True if this is a document or index not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::IndexNotFound(_))
    }

    /// True if this is a version-conflict / already-exists error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::DocumentExists { .. } | Error::IndexExists(_))
    }

    /// True if this is a deadline error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// True if this is a transport-level connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// True if this is a configuration validation error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// True if the reconnect budget was spent.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::Exhausted { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Best-effort extraction of the offending index and document ID from a
/// version-conflict error body. The server puts the index in `error.index`
/// and leads the reason with the document ID in brackets, e.g.
/// `[u-1]: version conflict, document already exists`.
fn conflict_context(body: &str) -> (String, String) {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let error = &parsed["error"];
    let index = error["index"].as_str().unwrap_or_default().to_string();
    let id = error["reason"]
        .as_str()
        .and_then(|reason| reason.strip_prefix('['))
        .and_then(|rest| rest.split(']').next())
        .unwrap_or_default()
        .to_string();
    (index, id)
}
