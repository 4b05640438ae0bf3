//! Server bootstrap: owns the listener and the transport configuration

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use russh::MethodSet;
use russh::server::{Config, Server};
use russh_keys::key::KeyPair;
use tracing::{debug, info};

use partyline_core::{Authenticator, BroadcastHub, ConnectionRegistry};

use crate::handler::ClientHandler;
use crate::keys;

/// The listening side of the room: accepts connections and gives every
/// one of them a `ClientHandler` sharing the same registry and hub.
pub struct BroadcastServer {
    authenticator: Arc<Authenticator>,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<BroadcastHub>,
}

impl BroadcastServer {
    pub fn new(authenticator: Arc<Authenticator>, mirror_diagnostics: bool) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(registry.clone(), mirror_diagnostics));
        Self {
            authenticator,
            registry,
            hub,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Listen on `host:port` and serve until the task is cancelled.
    pub async fn run(mut self, host: &str, port: u16, host_key: KeyPair) -> Result<()> {
        // Announced once, before the listener accepts anything, so
        // clients can be told what to expect.
        info!("host key fingerprint: {}", keys::fingerprint(&host_key)?);

        let config = Arc::new(Config {
            // Public key is the only authentication method ever offered;
            // password, host-based and keyboard-interactive stay disabled.
            methods: MethodSet::PUBLICKEY,
            keys: vec![host_key],
            auth_rejection_time: Duration::from_secs(3),
            auth_rejection_time_initial: Some(Duration::ZERO),
            // No idle timeout: a silent session stays connected.
            inactivity_timeout: None,
            ..Default::default()
        });

        info!("listening on {}:{}", host, port);
        self.run_on_address(config, (host, port))
            .await
            .context("ssh listener failed")?;
        Ok(())
    }
}

impl Server for BroadcastServer {
    type Handler = ClientHandler;

    fn new_client(&mut self, peer: Option<std::net::SocketAddr>) -> ClientHandler {
        debug!("connection from {:?}", peer);
        ClientHandler::new(
            self.authenticator.clone(),
            self.registry.clone(),
            self.hub.clone(),
        )
    }
}
