//! The service socket handed to callers once a transport is bound.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate as adb;
use crate::core::{ReadHalf, WriteHalf};
use crate::host::TransportId;

/// A bidirectional byte stream to a service on a bound device.
///
/// Whatever the service speaks (`shell:`, `sync:`, ...) flows through this socket
/// untouched; the socket itself only carries the resolved transport id and the
/// post-handshake streams. Both halves belong to the same underlying connection,
/// and closing the socket closes that connection.
pub struct ServiceSocket {
  transport_id: TransportId,
  service: String,
  read: ReadHalf,
  write: WriteHalf,
}

impl ServiceSocket {
  pub(crate) fn new(
    transport_id: TransportId,
    service: impl Into<String>,
    read: ReadHalf,
    write: WriteHalf,
  ) -> ServiceSocket {
    ServiceSocket {
      transport_id,
      service: service.into(),
      read,
      write,
    }
  }

  /// The transport id the server resolved while binding.
  pub fn transport_id(&self) -> TransportId {
    self.transport_id
  }

  /// The service this socket is connected to.
  pub fn service(&self) -> &str {
    &self.service
  }

  /// Tears the socket into independently owned halves.
  pub fn split(self) -> (ReadHalf, WriteHalf) {
    (self.read, self.write)
  }

  /// Closes the writable half, which shuts down the underlying connection.
  pub async fn close(&mut self) -> adb::Result<()> {
    self.write.close().await?;
    Ok(())
  }
}

impl AsyncRead for ServiceSocket {
  fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
    Pin::new(&mut self.read).poll_read(cx, buf)
  }
}

impl AsyncWrite for ServiceSocket {
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
