//! Error conditions.

use thiserror::Error;

/// An error returned by the engine's configuration surface.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An extension with this name is already registered.
    #[error("an extension named `{name}` is already registered")]
    DuplicateExtension {
        /// The offending extension name.
        name: String,
    },

    /// A list index was neither an existing list nor a contiguous append.
    #[error("list index {index} is out of bounds for {len} lists")]
    ListIndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The number of lists at the time of the call.
        len: usize,
    },
}

/// A failure reported by the [`Transport`][crate::Transport].
///
/// The engine never returns these to callers; they surface to observers
/// through [`LifecycleEvent`][crate::LifecycleEvent]s and otherwise only
/// steer the loop's retry behavior.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server answered with a non-success HTTP status.
    #[error("server returned HTTP status {status}")]
    Http {
        /// The status the server answered with.
        status: http::StatusCode,
    },

    /// The request was cancelled before completing.
    ///
    /// Transports that surface their own cancellations must use this kind;
    /// the engine treats it like an interrupt and retries without backoff.
    #[error("the request was aborted")]
    Aborted,

    /// The request failed before an HTTP response was obtained, e.g. due to
    /// network or DNS issues.
    #[error("network failure: {0}")]
    Network(String),
}

/// The terminal failure of a transaction issued by
/// [`resend`][crate::SlidingSync::resend].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TxnError {
    /// A later transaction was acknowledged first, so this one's parameters
    /// were never applied as a distinct request.
    #[error("transaction `{txn_id}` was superseded by a later request")]
    Superseded {
        /// The id of the superseded transaction.
        txn_id: String,
    },

    /// The engine went away before the transaction was acknowledged.
    #[error("the engine was dropped before the transaction was acknowledged")]
    Disconnected,
}
