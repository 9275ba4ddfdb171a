//! StreamSink - best-effort TCP line stream to a single reader

use contracts::{ContractError, OutputSink, PatientEvent};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Back-off after a failed accept (e.g. fd exhaustion)
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Lines buffered for one reader before new events are dropped
const PEER_QUEUE_CAPACITY: usize = 256;

/// Default bound on a single socket write
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on draining the current reader during `close`
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for StreamSink
#[derive(Debug, Clone)]
pub struct StreamSinkConfig {
    /// Listen address
    pub addr: SocketAddr,
    /// A write blocked longer than this detaches the reader
    pub write_timeout: Duration,
}

impl StreamSinkConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Listen on all interfaces at `port`
    pub fn with_port(port: u16) -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// Create config from params map
    ///
    /// Accepts either `addr` (full socket address) or `port`, plus optional
    /// `write_timeout_ms`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let mut config = if let Some(addr_str) = params.get("addr") {
            let addr: SocketAddr = addr_str
                .parse()
                .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;
            Self::new(addr)
        } else {
            let port_str = params
                .get("port")
                .ok_or_else(|| "missing 'port' or 'addr' parameter".to_string())?;
            let port: u16 = port_str
                .parse()
                .map_err(|e| format!("invalid port '{}': {}", port_str, e))?;
            Self::with_port(port)
        };

        if let Some(ms) = params.get("write_timeout_ms") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| format!("invalid write_timeout_ms '{}': {}", ms, e))?;
            if ms == 0 {
                return Err("write_timeout_ms must be > 0".to_string());
            }
            config.write_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

/// Currently attached reader: a queue into its own writer task
struct Peer {
    addr: SocketAddr,
    tx: mpsc::Sender<String>,
    writer: JoinHandle<()>,
}

/// Single-slot cell shared by the accept loop (writer) and `deliver` (reader).
///
/// Only ever locked for a swap or a `try_send`, never across an await.
type PeerSlot = Arc<Mutex<Option<Peer>>>;

fn lock_slot(slot: &PeerSlot) -> std::sync::MutexGuard<'_, Option<Peer>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sink that streams `<patientId>,<timestamp>,<label>,<value>\n` lines to one TCP reader.
///
/// Events delivered while no reader is attached are dropped, as are events
/// arriving while the reader's small queue is full. A newly connecting reader
/// replaces the current one; a failed or stalled write detaches the reader
/// until another one connects. `deliver` never waits on the socket.
pub struct StreamSink {
    name: String,
    local_addr: SocketAddr,
    peer: PeerSlot,
    accept_task: JoinHandle<()>,
}

impl StreamSink {
    /// Bind the listener and start accepting in the background
    ///
    /// Returns as soon as the socket is bound; never waits for a reader.
    #[instrument(name = "stream_sink_bind", skip(name, config), fields(addr = %config.addr))]
    pub async fn bind(name: impl Into<String>, config: StreamSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let listener = TcpListener::bind(config.addr).await?;
        let local_addr = listener.local_addr()?;

        info!(sink = %name, addr = %local_addr, "StreamSink listening");

        let peer: PeerSlot = Arc::new(Mutex::new(None));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&peer),
            name.clone(),
            config.write_timeout,
        ));

        Ok(Self {
            name,
            local_addr,
            peer,
            accept_task,
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = StreamSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks[{name}].params"), e))?;

        Self::bind(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(name, e.to_string()))
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether a reader is currently attached
    pub fn has_peer(&self) -> bool {
        lock_slot(&self.peer).is_some()
    }

    /// Remote address of the attached reader
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        lock_slot(&self.peer).as_ref().map(|p| p.addr)
    }
}

impl Drop for StreamSink {
    fn drop(&mut self) {
        self.accept_task.abort();
        if let Some(peer) = lock_slot(&self.peer).take() {
            peer.writer.abort();
        }
    }
}

/// Accept readers for the sink's lifetime, each one replacing the last
async fn accept_loop(listener: TcpListener, slot: PeerSlot, name: String, write_timeout: Duration) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(sink = %name, peer = %addr, error = %e, "set_nodelay failed");
                }

                let (tx, rx) = mpsc::channel(PEER_QUEUE_CAPACITY);
                let writer = tokio::spawn(peer_writer(
                    stream,
                    rx,
                    addr,
                    name.clone(),
                    write_timeout,
                ));

                let previous = lock_slot(&slot).replace(Peer { addr, tx, writer });
                match previous {
                    Some(old) => {
                        old.writer.abort();
                        info!(
                            sink = %name,
                            peer = %addr,
                            replaced = %old.addr,
                            "Client connected, replacing previous reader"
                        );
                    }
                    None => info!(sink = %name, peer = %addr, "Client connected"),
                }
            }
            Err(e) => {
                warn!(sink = %name, error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

/// Owns one reader's socket; exits on the first failed or stalled write.
///
/// Exiting closes the queue, which `deliver` reads as "reader gone".
async fn peer_writer(
    mut stream: TcpStream,
    mut rx: mpsc::Receiver<String>,
    addr: SocketAddr,
    name: String,
    write_timeout: Duration,
) {
    while let Some(line) = rx.recv().await {
        match tokio::time::timeout(write_timeout, stream.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(sink = %name, peer = %addr, error = %e, "Write failed, detaching reader");
                return;
            }
            Err(_) => {
                warn!(
                    sink = %name,
                    peer = %addr,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "Reader stalled, detaching"
                );
                return;
            }
        }
    }

    // queue closed: sink is closing
    if let Err(e) = stream.shutdown().await {
        debug!(sink = %name, peer = %addr, error = %e, "Shutdown failed");
    }
}

/// `<patientId>,<timestamp>,<label>,<value>\n`
fn format_wire(event: &PatientEvent) -> String {
    format!(
        "{},{},{},{}\n",
        event.patient_id(),
        event.timestamp(),
        event.label(),
        event.value()
    )
}

impl OutputSink for StreamSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "stream_sink_deliver",
        skip(self, event),
        fields(sink = %self.name, patient_id = %event.patient_id(), label = event.label())
    )]
    async fn deliver(&self, event: &PatientEvent) -> Result<(), ContractError> {
        let mut slot = lock_slot(&self.peer);
        let Some(peer) = slot.as_ref() else {
            trace!(sink = %self.name, "No reader attached, event dropped");
            return Ok(());
        };

        match peer.tx.try_send(format_wire(event)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(ContractError::sink_write(
                &self.name,
                format!("reader {} is not keeping up, event dropped", peer.addr),
            )),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                let addr = peer.addr;
                *slot = None;
                drop(slot);
                debug!(sink = %self.name, peer = %addr, "Reader detached");
                Err(ContractError::sink_write(
                    &self.name,
                    format!("peer {addr}: connection lost"),
                ))
            }
        }
    }

    #[instrument(name = "stream_sink_flush", skip(self))]
    async fn flush(&self) -> Result<(), ContractError> {
        // lines go straight to the socket from the writer task
        Ok(())
    }

    #[instrument(name = "stream_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        self.accept_task.abort();
        let peer = lock_slot(&self.peer).take();
        if let Some(Peer { addr, tx, mut writer }) = peer {
            drop(tx);
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
                writer.abort();
                debug!(sink = %self.name, peer = %addr, "Reader did not drain before close");
            }
        }
        debug!(sink = %self.name, "StreamSink closed");
        Ok(())
    }
}
