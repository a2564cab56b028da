//! Types for the requests and responses of the sliding sync protocol.
//!
//! Sliding sync is a long-polling protocol for maintaining windowed views of
//! a large server-side room list: instead of syncing every room the account
//! knows about, the client declares one or more *lists*, each covering a set
//! of index ranges over the server's ordered room directory, and the server
//! streams back positional operations (`DELETE`, `INSERT`, `INVALIDATE`,
//! `SYNC`) that the client replays into a local index → room-id mapping.
//!
//! This crate only defines the wire types. The protocol driver that composes
//! requests, replays list operations and emits events lives in
//! `sliding-sync-client`.
//!
//! Room identifiers, sync positions and transaction identifiers are opaque
//! strings at this layer; event payloads are raw JSON. Deserializing them
//! into richer types is the business of whatever consumes the driver.

#![warn(missing_docs)]

pub mod request;
pub mod response;
mod serde;

pub use self::{
    request::Request,
    response::{Response, SyncOp},
};
