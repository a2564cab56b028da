//! The abstraction over the HTTP layer that carries sliding sync requests.

use std::future::Future;

use sliding_sync_api::{Request, Response};

use crate::error::TransportError;

/// A transport that can carry sliding sync long-polls.
///
/// Implementations own everything HTTP: base URL, authentication, connection
/// reuse, and the placement of the query-style request fields (`pos`,
/// `timeout`, `clientTimeout`) in the URL. The engine only hands over a
/// composed [`Request`] and awaits the outcome.
///
/// The returned future must be cancellation-safe in the sense that dropping
/// it abandons the request: the engine drops the in-flight future whenever a
/// caller interrupts the poll, and composes a fresh request afterwards.
pub trait Transport: Send + Sync {
    /// Issue one long-poll request and await the server's response.
    fn sliding_sync(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;

    /// Mint a fresh opaque transaction identifier.
    ///
    /// Identifiers must be unique for the lifetime of the connection; the
    /// server echoes the most recent one it saw so the engine can correlate
    /// acknowledgements.
    fn make_txn_id(&self) -> String;
}
