//! Client connection handling for the Kafka server.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

use crate::constants::DEFAULT_MAX_MESSAGE_SIZE;
use crate::error::{Error, Result};

use super::session::Session;

/// A client connection to the Kafka server.
///
/// Requests are handled concurrently, each on its own task, and responses
/// are written in the order they complete.
pub struct ClientConnection {
    stream: TcpStream,
    addr: SocketAddr,
    max_message_size: usize,
}

impl ClientConnection {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        Self::with_max_message_size(stream, addr, DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(
        stream: TcpStream,
        addr: SocketAddr,
        max_message_size: usize,
    ) -> Self {
        Self {
            stream,
            addr,
            max_message_size,
        }
    }

    /// Handle requests until the client disconnects. The session is closed
    /// on the way out, aborting whatever is still pending.
    pub async fn handle_requests(self, session: Arc<Session>) -> Result<()> {
        let addr = self.addr;
        let max_message_size = self.max_message_size;
        let (mut reader, writer) = self.stream.into_split();
        let (responses, outbox) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_responses(writer, outbox, addr));

        let result = loop {
            match read_request(&mut reader, max_message_size).await {
                Ok(data) => {
                    let session = session.clone();
                    let responses = responses.clone();
                    tokio::spawn(async move {
                        match session.handle_request(data).await {
                            Ok(Some(response)) => {
                                // The writer is gone once the client is.
                                let _ = responses.send(response);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::error!(client = %addr, error = %e, "Failed to encode response");
                            }
                        }
                    });
                }
                Err(Error::MissingData(_)) => {
                    tracing::debug!(client = %addr, "Client disconnected");
                    break Ok(());
                }
                Err(e) => {
                    tracing::warn!(client = %addr, error = %e, "Error reading request");
                    break Err(e);
                }
            }
        };

        session.close();
        drop(responses);
        if let Err(e) = writer.await {
            tracing::error!(client = %addr, error = %e, "Response writer panicked");
        }
        result
    }
}

/// Read one size-prefixed request frame.
async fn read_request(reader: &mut OwnedReadHalf, max_message_size: usize) -> Result<Bytes> {
    let size = match reader.read_i32().await {
        Ok(size) => size,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(Error::MissingData("Connection closed".to_owned()));
        }
        Err(e) => return Err(e.into()),
    };

    if size < 0 {
        tracing::warn!(size, "Invalid negative message size");
        return Err(Error::IoError(io::ErrorKind::InvalidData));
    }
    let size = size as usize;
    if size > max_message_size {
        tracing::warn!(size, max_message_size, "Message size exceeds maximum");
        return Err(Error::IoError(io::ErrorKind::InvalidData));
    }

    let mut data = vec![0u8; size];
    match reader.read_exact(&mut data).await {
        Ok(_) => Ok(Bytes::from(data)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::MissingData(
            "Connection closed mid-message".to_owned(),
        )),
        Err(e) => Err(e.into()),
    }
}

async fn write_responses(
    mut writer: OwnedWriteHalf,
    mut outbox: mpsc::UnboundedReceiver<Bytes>,
    addr: SocketAddr,
) {
    while let Some(response) = outbox.recv().await {
        if let Err(e) = writer.write_all(&response).await {
            tracing::debug!(client = %addr, error = %e, "Failed to write response");
            return;
        }
        tracing::trace!(client = %addr, bytes = response.len(), "Wrote response");
    }
    let _ = writer.shutdown().await;
}
