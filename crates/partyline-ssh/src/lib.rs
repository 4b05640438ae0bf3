//! partyline-ssh - the SSH transport binding for partyline
//!
//! Wraps russh's server callbacks around the transport-independent core:
//! public-key authentication decisions, raw-byte line decoding, and the
//! broadcast session lifecycle.

pub mod handler;
pub mod keys;
pub mod lines;
pub mod server;

pub use server::BroadcastServer;
