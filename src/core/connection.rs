//! The byte-stream connection to an adb server, and the capability that dials one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate as adb;
use crate::core::AbortSignal;

/// Readable half of a [ServerConnection].
pub type ReadHalf = Box<dyn AsyncRead + Send + Unpin>;

/// Writable half of a [ServerConnection].
pub type WriteHalf = Box<dyn AsyncWrite + Send + Unpin>;

/// Options forwarded to [Connector::connect].
#[derive(Clone, Default)]
pub struct ConnectOptions {
  /// Abort signal honoured while dialing and while awaiting the server's acknowledgement.
  pub signal: Option<AbortSignal>,

  /// Advisory hint that the connection should not hold the process alive.
  /// Connectors without such a notion ignore it.
  pub unref: bool,
}

impl ConnectOptions {
  pub(crate) fn signals(&self) -> &[AbortSignal] {
    self.signal.as_ref().map(std::slice::from_ref).unwrap_or(&[])
  }
}

/// Callback invoked for each incoming socket the server directs at a reverse tunnel.
pub type TunnelHandler = Arc<dyn Fn(ServerConnection) + Send + Sync>;

/// Capability that opens raw byte streams to an adb server.
///
/// The protocol core never dials on its own; everything it opens goes through a
/// `Connector`. Connectors also own reverse-tunnel registration, which the client
/// only forwards.
pub trait Connector: Send + Sync {
  /// Opens a fresh connection to the server. Dial failures propagate verbatim.
  fn connect<'a>(
    &'a self,
    options: &'a ConnectOptions,
  ) -> Pin<Box<dyn Future<Output = adb::Result<ServerConnection>> + Send + 'a>>;

  /// Registers a handler for sockets the server opens toward this client, returning
  /// the address it is published under. An address is chosen if none is supplied.
  fn add_reverse_tunnel(&self, handler: TunnelHandler, address: Option<String>) -> adb::Result<String>;

  /// Removes a handler previously registered with [Connector::add_reverse_tunnel].
  fn remove_reverse_tunnel(&self, address: &str) -> adb::Result<()>;

  /// Drops every registered reverse-tunnel handler.
  fn clear_reverse_tunnels(&self);
}

/// A bidirectional byte stream to an adb server.
///
/// Exactly one owner closes it; once closed neither half is usable. Dropping the
/// connection releases both halves without a graceful shutdown.
pub struct ServerConnection {
  read: ReadHalf,
  write: WriteHalf,
}

impl ServerConnection {
  /// Assembles a connection from its two halves.
  pub fn from_split(read: ReadHalf, write: WriteHalf) -> ServerConnection {
    ServerConnection { read, write }
  }

  /// Tears the connection into independently owned halves.
  pub fn into_split(self) -> (ReadHalf, WriteHalf) {
    (self.read, self.write)
  }

  /// Closes the writable half, letting the server observe end-of-stream.
  pub async fn close(&mut self) -> adb::Result<()> {
    self.write.close().await?;
    Ok(())
  }
}

impl AsyncRead for ServerConnection {
  fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
    Pin::new(&mut self.read).poll_read(cx, buf)
  }
}

impl AsyncWrite for ServerConnection {
  fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
    Pin::new(&mut self.write).poll_write(cx, buf)
  }

  fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
    Pin::new(&mut self.write).poll_flush(cx)
  }

  fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
    Pin::new(&mut self.write).poll_close(cx)
  }
}
