//! Bingo session coordinator.
//!
//! This crate provides the coordinator that pairs two peers into a session,
//! announces the start and relays their game events, using:
//! - Tokio TCP for transport
//! - Length-prefixed CBOR frames from `bingo-proto`
//! - System time and OS randomness
//!
//! ## Architecture
//!
//! ```text
//! bingo-server
//!   ├─ SystemEnv     (production Environment impl)
//!   ├─ Server        (accept loop, per-connection reader and writer tasks)
//!   └─ RoomManager   (Sans-IO pairing, start and relay)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod room_manager;
mod system_env;

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use bingo_core::Environment;
use bingo_proto::{Message, frame, frame::FrameBuffer};
use bytes::BytesMut;
pub use error::ServerError;
pub use room_manager::{ConnectionId, CoordinatorConfig, RoomAction, RoomError, RoomManager};
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4700")
    pub bind_address: String,
    /// Messages buffered per connection before it is dropped as too slow
    pub outbound_queue: usize,
    /// Coordinator limits
    pub coordinator: CoordinatorConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4700".to_string(),
            outbound_queue: 256,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

/// Coordinator state shared by all connection tasks.
struct Shared {
    rooms: RoomManager<SystemEnv>,
    /// Outbound queue of every live connection.
    writers: HashMap<ConnectionId, mpsc::Sender<Message>>,
}

impl Shared {
    fn execute(&mut self, actions: Vec<RoomAction>) {
        for action in actions {
            match action {
                RoomAction::Send { conn, message } => {
                    let Some(tx) = self.writers.get(&conn) else {
                        tracing::debug!(conn, kind = %message.kind(), "no writer for connection");
                        continue;
                    };
                    if let Err(e) = tx.try_send(message) {
                        // Dropping the sender ends the writer, which closes the
                        // socket; the reader then reports the disconnect.
                        tracing::warn!(conn, "outbound queue rejected message: {}", e);
                        self.writers.remove(&conn);
                    }
                },
            }
        }
    }
}

/// Production bingo coordinator.
///
/// Wraps `RoomManager` with a Tokio TCP listener and the system environment.
pub struct Server {
    listener: TcpListener,
    shared: Arc<Mutex<Shared>>,
    env: SystemEnv,
    outbound_queue: usize,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The configuration is unusable
    /// - Binding to the address fails
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.coordinator.room_capacity < 2 {
            return Err(ServerError::Config("room capacity must be at least 2".to_string()));
        }
        if config.outbound_queue == 0 {
            return Err(ServerError::Config("outbound queue must be non-zero".to_string()));
        }

        let env = SystemEnv::new();
        let listener = TcpListener::bind(&config.bind_address).await?;
        let shared = Shared {
            rooms: RoomManager::new(env.clone(), config.coordinator),
            writers: HashMap::new(),
        };

        Ok(Self {
            listener,
            shared: Arc::new(Mutex::new(shared)),
            env,
            outbound_queue: config.outbound_queue,
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections and relaying messages.
    ///
    /// This method runs until the task is cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let (tx, rx) = mpsc::channel(self.outbound_queue);
                    let conn = {
                        let mut shared = self.shared.lock().await;
                        let conn = loop {
                            let id = self.env.random_u64();
                            if !shared.writers.contains_key(&id) {
                                break id;
                            }
                        };
                        shared.writers.insert(conn, tx);
                        conn
                    };

                    tracing::debug!(conn, %peer, "new connection");
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, stream, rx, shared).await {
                            tracing::debug!(conn, "connection error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }
}

/// Drive one TCP connection until either side closes it.
async fn handle_connection(
    conn: ConnectionId,
    stream: TcpStream,
    outbound: mpsc::Receiver<Message>,
    shared: Arc<Mutex<Shared>>,
) -> Result<(), ServerError> {
    let (mut reader, writer) = stream.into_split();
    let writer_task = tokio::spawn(write_loop(conn, writer, outbound));

    let result = read_loop(conn, &mut reader, &shared).await;

    {
        let mut shared = shared.lock().await;
        shared.writers.remove(&conn);
        let actions = shared.rooms.disconnect(conn);
        shared.execute(actions);
    }

    let _ = writer_task.await;
    tracing::debug!(conn, "connection closed");
    result
}

/// Decode inbound frames and feed them to the room manager.
async fn read_loop(
    conn: ConnectionId,
    reader: &mut OwnedReadHalf,
    shared: &Mutex<Shared>,
) -> Result<(), ServerError> {
    let mut frames = FrameBuffer::new();
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        buf.clear();
        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
        frames.extend(&buf);

        loop {
            let message = match frames.next_message() {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(conn, "dropping invalid message: {}", e);
                    continue;
                },
            };

            let mut shared = shared.lock().await;
            if !shared.writers.contains_key(&conn) {
                return Err(ServerError::Closed("outbound queue overflow".to_string()));
            }

            match shared.rooms.handle(conn, message) {
                Ok(actions) => shared.execute(actions),
                Err(e) if e.is_fatal() => {
                    tracing::warn!(conn, "closing connection: {}", e);
                    return Err(ServerError::Closed(e.to_string()));
                },
                Err(e) => tracing::debug!(conn, "message dropped: {}", e),
            }
        }
    }
}

/// Encode queued messages onto the socket.
async fn write_loop(
    conn: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Message>,
) {
    let mut buf = Vec::new();

    while let Some(message) = outbound.recv().await {
        buf.clear();
        if let Err(e) = frame::encode(&message, &mut buf) {
            tracing::error!(conn, "failed to encode {}: {}", message.kind(), e);
            continue;
        }
        if let Err(e) = writer.write_all(&buf).await {
            tracing::debug!(conn, "write error: {}", e);
            break;
        }
    }

    let _ = writer.shutdown().await;
}
