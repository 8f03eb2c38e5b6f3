//! The connection multiplexer: accepts TCP connections, spawns one
//! `Connection` task per peer, and routes host-originated output commands
//! to the matching live connection by identity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use crate::config::ServerConfig;
use crate::connection::{CommandRegistry, Connection};
use crate::event::EventSink;
use crate::liveness::{LivenessMonitor, LivenessMsg};
use crate::record::encode_output_command;
use crate::result::VdsResult;

/// A running VdS 2465 listener. Holds the identity-keyed command registry
/// so output commands can be routed to a live connection, and the set of
/// per-connection join handles so `stop()` can wait for every connection
/// to finish tearing down.
pub struct VdsServer {
    config: Arc<ServerConfig>,
    sink: Arc<dyn EventSink>,
    registry: CommandRegistry,
    connection_tasks: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>>,
    liveness_tx: mpsc::Sender<LivenessMsg>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl VdsServer {
    /// Spawns the liveness monitor. Call `serve_forever` to bind the
    /// listener and start accepting connections.
    pub fn new(config: ServerConfig, sink: Arc<dyn EventSink>) -> Self {
        let config = Arc::new(config);
        let (monitor, liveness_tx) = LivenessMonitor::new(&config.devices, sink.clone());
        tokio::spawn(monitor.run());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            sink,
            registry: Arc::new(Mutex::new(HashMap::new())),
            connection_tasks: Arc::new(Mutex::new(Vec::new())),
            liveness_tx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Accepts connections until the listener errors or a shutdown is
    /// requested. Spawns a `Connection` task per peer; each registers
    /// itself into the shared command registry once its identity record
    /// arrives.
    pub async fn serve_forever(&mut self) -> VdsResult<()> {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "listening");

        loop {
            let (socket, peer) = listener.accept().await?;
            let config = self.config.clone();
            let sink = self.sink.clone();
            let liveness_tx = self.liveness_tx.clone();
            let registry = self.registry.clone();
            let shutdown_rx = self.shutdown_rx.clone();

            let (connection, _cmd_tx) =
                Connection::new(socket, peer, config, sink, liveness_tx, registry, shutdown_rx);
            let handle = tokio::spawn(connection.run());
            self.connection_tasks.lock().unwrap().push(handle);
        }
    }

    /// Routes a host-originated output-control command to the live
    /// connection bound to `identity`. Returns `false` when no connection
    /// currently holds that identity.
    pub async fn send_output(&self, identity: &str, address: u8, state_on: bool, device: u8, area: u8) -> bool {
        let cmd_tx = self.registry.lock().unwrap().get(identity).cloned();
        match cmd_tx {
            Some(tx) => tx
                .send(encode_output_command(device, area, address, state_on))
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Closes the listener first (by causing `serve_forever` to return,
    /// via the caller dropping/aborting its task), then signals every live
    /// connection to disconnect and waits, bounded to 2 seconds, for them
    /// to finish.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.connection_tasks.lock().unwrap().drain(..).collect();
        if tokio::time::timeout(Duration::from_secs(2), join_all(handles))
            .await
            .is_err()
        {
            tracing::warn!("connection shutdown exceeded 2s, some tasks may have been abandoned");
        }
    }
}

async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}
