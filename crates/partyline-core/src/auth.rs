//! Public-key authorization decisions for connecting clients

use std::sync::Arc;

use tracing::warn;

use crate::identity::{AuthorizedKey, IdentityTable};

/// Decides whether a username/key pair may join the room.
///
/// The transport has already proven possession of the private key during
/// the handshake; this answers only the authorization question, and it
/// fails closed: unknown usernames are rejected outright.
pub struct Authenticator {
    identities: Arc<IdentityTable>,
}

impl Authenticator {
    pub fn new(identities: Arc<IdentityTable>) -> Self {
        Self { identities }
    }

    /// Returns `true` iff `candidate` is registered for `username`.
    pub fn validate(&self, username: &str, candidate: &AuthorizedKey) -> bool {
        match self.identities.keys_for(username) {
            Some(keys) => {
                let authorized = keys.iter().any(|key| key == candidate);
                if !authorized {
                    warn!("rejected unauthorized key offered for {}", username);
                }
                authorized
            }
            None => {
                warn!("rejected unknown user {}", username);
                false
            }
        }
    }
}
