//! partyline-core - transport-independent machinery of the chat room
//!
//! This crate provides:
//! - Identity table and public-key authorization checks
//! - Registry of live sessions
//! - Broadcast hub fanning messages out to every live session
//! - Per-connection session handler driving the lifecycle state machine
//!
//! The SSH transport lives in `partyline-ssh`; everything here talks to it
//! only through the `MessageSink` trait and the `InputEvent` stream.

pub mod auth;
pub mod hub;
pub mod identity;
pub mod registry;
pub mod session;
pub mod sink;

// Re-export main types for convenience
pub use auth::Authenticator;
pub use hub::{BroadcastHub, ChannelKind};
pub use identity::{AuthorizedKey, IdentityTable};
pub use registry::{ConnectionRegistry, SessionEntry};
pub use session::{InputEvent, SessionHandler};
pub use sink::MessageSink;
