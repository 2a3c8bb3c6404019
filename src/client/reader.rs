//! Buffered reading with hand-off of speculative residue.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::io::AsyncRead;
use futures::ready;

const CHUNK_SIZE: usize = 4096;

/// Chunk-buffered wrapper around the readable half of a connection.
///
/// Framing handshakes issue many tiny reads; this wrapper pulls whole chunks off
/// the transport and serves the small reads from memory. Bytes pulled
/// speculatively stay owned by the reader, so handing the reader itself to the
/// caller after the handshake yields the residue first and then continues with
/// the raw stream. Large reads bypass the chunk once the residue is drained.
pub(crate) struct BufferedReader<R> {
  inner: R,
  chunk: Box<[u8]>,
  pos: usize,
  filled: usize,
}

impl<R> BufferedReader<R> {
  pub(crate) fn new(inner: R) -> BufferedReader<R> {
    BufferedReader {
      inner,
      chunk: vec![0; CHUNK_SIZE].into_boxed_slice(),
      pos: 0,
      filled: 0,
    }
  }

  /// Bytes pulled from the transport but not yet consumed.
  #[cfg(test)]
  pub(crate) fn residue(&self) -> &[u8] {
    &self.chunk[self.pos..self.filled]
  }
}

impl<R: AsyncRead + Unpin> AsyncRead for BufferedReader<R> {
  fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
    let this = self.get_mut();
    if this.pos >= this.filled {
      if buf.len() >= this.chunk.len() {
        return Pin::new(&mut this.inner).poll_read(cx, buf);
      }
      let filled = ready!(Pin::new(&mut this.inner).poll_read(cx, &mut this.chunk))?;
      this.pos = 0;
      this.filled = filled;
      if filled == 0 {
        return Poll::Ready(Ok(0));
      }
    }

    let len = buf.len().min(this.filled - this.pos);
    buf[..len].copy_from_slice(&this.chunk[this.pos..this.pos + len]);
    this.pos += len;
    Poll::Ready(Ok(len))
  }
}

#[cfg(test)]
mod test {
  use futures::executor::block_on;
  use futures::io::{AsyncReadExt, Cursor};

  use super::*;
  use crate::client::framing::read_exact_bytes;
  use crate::Error;

  #[test]
  fn small_reads_leave_residue() {
    let mut reader = BufferedReader::new(Cursor::new(b"OKAYleftover".to_vec()));
    let status = block_on(read_exact_bytes(&mut reader, 4)).unwrap();
    assert_eq!(&status, b"OKAY");
    assert_eq!(reader.residue(), b"leftover");
  }

  #[test]
  fn residue_drains_before_the_stream_continues() {
    let mut reader = BufferedReader::new(Cursor::new(b"OKAYresidue-then-rest".to_vec()));
    block_on(read_exact_bytes(&mut reader, 4)).unwrap();

    let mut rest = Vec::new();
    block_on(reader.read_to_end(&mut rest)).unwrap();
    assert_eq!(&rest, b"residue-then-rest");
  }

  #[test]
  fn large_reads_bypass_the_chunk() {
    let payload = vec![0x5au8; CHUNK_SIZE * 2];
    let mut reader = BufferedReader::new(Cursor::new(payload.clone()));
    let mut buf = vec![0u8; CHUNK_SIZE * 2];
    let n = block_on(reader.read(&mut buf)).unwrap();
    assert!(n > 0);
    assert_eq!(&buf[..n], &payload[..n]);
    assert_eq!(reader.residue(), b"");
  }

  #[test]
  fn short_stream_fails_exact_reads() {
    let mut reader = BufferedReader::new(Cursor::new(b"ab".to_vec()));
    assert!(matches!(
      block_on(read_exact_bytes(&mut reader, 4)),
      Err(Error::UnexpectedEof)
    ));
  }
}
