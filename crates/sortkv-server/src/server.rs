//! TCP server implementation

use crate::commands::{dispatch, Command};
use crate::config::ServerConfig;
use crate::protocol::{read_request, ProtocolError};
use crate::reply::Reply;
use sortkv::Keyspace;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// sortkv server
pub struct KvServer {
    keyspace: Keyspace,
    config: ServerConfig,
}

impl KvServer {
    /// Create a server over an open keyspace
    pub fn new(keyspace: Keyspace, config: ServerConfig) -> Self {
        Self { keyspace, config }
    }

    /// Bind `addr` and serve until the task is dropped
    pub async fn run(&self, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", addr);
        self.serve(listener).await
    }

    /// Accept connections from an already bound listener
    ///
    /// Connection tasks belong to this future: dropping or aborting it aborts
    /// every open connection, and each aborted connection cancels its scan.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (socket, peer_addr) = accepted?;
                    let keyspace = self.keyspace.clone();
                    let config = self.config;

                    connections.spawn(async move {
                        debug!("New connection from {}", peer_addr);
                        if let Err(e) = handle_connection(socket, keyspace, config).await {
                            warn!("Connection error from {}: {}", peer_addr, e);
                        }
                        debug!("Connection closed: {}", peer_addr);
                    });
                }
                // Reap finished connections
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    keyspace: Keyspace,
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Disable Nagle's algorithm for lower latency
    socket.set_nodelay(true)?;

    let (read_half, write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    // Fires on every exit path, including task abort
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let mut out = Vec::with_capacity(4096);
    loop {
        let args = match read_request(&mut reader, &config).await {
            Ok(Some(args)) => args,
            Ok(None) => break,
            Err(ProtocolError::Io(e)) => return Err(e.into()),
            Err(e) => {
                debug!("Protocol error: {}", e);
                out.clear();
                Reply::error(format!("ERR Protocol error: {}", e)).encode(&mut out);
                writer.write_all(&out).await?;
                writer.flush().await?;
                break;
            }
        };
        if args.is_empty() {
            continue;
        }

        if Command::parse(&args[0]) == Some(Command::Quit) {
            writer.write_all(&Reply::ok().to_bytes()).await?;
            writer.flush().await?;
            break;
        }

        let ks = keyspace.clone();
        let token = cancel.clone();
        let mut task = tokio::task::spawn_blocking(move || dispatch(&ks, &args, &token));

        // Watch for the client going away while the command runs. Pipelined
        // bytes stay buffered for the next read_request.
        let mut watching = reader.buffer().is_empty();
        let mut client_gone = false;
        let reply = loop {
            tokio::select! {
                joined = &mut task => break joined?,
                filled = reader.fill_buf(), if watching => {
                    watching = false;
                    match filled {
                        Ok(buf) if !buf.is_empty() => {}
                        Ok(_) | Err(_) => {
                            debug!("Client left mid-command, cancelling");
                            client_gone = true;
                            cancel.cancel();
                        }
                    }
                }
            }
        };
        if client_gone {
            return Ok(());
        }

        if let Some(reply) = reply {
            out.clear();
            reply.encode(&mut out);
            writer.write_all(&out).await?;
        }

        // Pipelined requests share one flush
        if reader.buffer().is_empty() {
            writer.flush().await?;
        }
    }
    writer.flush().await?;
    Ok(())
}
