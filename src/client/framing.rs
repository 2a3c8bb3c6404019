//! Length-prefixed text framing for the adb server protocol.

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate as adb;

/// Largest payload a single string frame can carry.
pub(crate) const MAX_FRAME_LEN: usize = 0xffff;

/// Encodes a payload length as four lower-case ASCII hex digits.
pub(crate) fn encode_hex_length(len: usize) -> adb::Result<[u8; 4]> {
  if len > MAX_FRAME_LEN {
    return Err(adb::Error::InvalidData(format!("frame payload too large: {} bytes", len)));
  }
  let mut digits = [0u8; 4];
  digits.copy_from_slice(format!("{:04x}", len).as_bytes());
  Ok(digits)
}

/// Parses four ASCII hex digits, either case, into a length.
pub(crate) fn parse_hex_length(digits: &[u8]) -> adb::Result<usize> {
  let digits = std::str::from_utf8(digits)
    .map_err(|err| adb::Error::InvalidData(format!("length prefix is not ASCII: {}", err)))?;
  usize::from_str_radix(digits, 16)
    .map_err(|err| adb::Error::InvalidData(format!("length prefix is not hex: {}", err)))
}

/// Reads exactly `n` bytes, failing with [adb::Error::UnexpectedEof] if the stream
/// ends first.
pub(crate) async fn read_exact_bytes<R>(read: &mut R, n: usize) -> adb::Result<Vec<u8>>
where
  R: AsyncRead + Unpin + ?Sized,
{
  let mut bytes = vec![0; n];
  read.read_exact(&mut bytes).await.map_err(|err| match err.kind() {
    std::io::ErrorKind::UnexpectedEof => adb::Error::UnexpectedEof,
    _ => adb::Error::Io(err),
  })?;
  Ok(bytes)
}

/// Writes one string frame as a single contiguous write.
pub(crate) async fn write_hex_length_prefixed<W>(write: &mut W, bytes: &[u8]) -> adb::Result<()>
where
  W: AsyncWrite + Unpin + ?Sized,
{
  let mut frame = Vec::with_capacity(4 + bytes.len());
  frame.extend_from_slice(&encode_hex_length(bytes.len())?);
  frame.extend_from_slice(bytes);
  write.write_all(&frame).await?;
  Ok(())
}

/// Reads one length-prefixed frame as raw bytes.
pub(crate) async fn read_hex_length_prefixed<R>(read: &mut R) -> adb::Result<Vec<u8>>
where
  R: AsyncRead + Unpin + ?Sized,
{
  let digits = read_exact_bytes(read, 4).await?;
  let length = parse_hex_length(&digits)?;
  read_exact_bytes(read, length).await
}

/// Reads one length-prefixed frame and decodes it as UTF-8.
pub(crate) async fn read_string_frame<R>(read: &mut R) -> adb::Result<String>
where
  R: AsyncRead + Unpin + ?Sized,
{
  let bytes = read_hex_length_prefixed(read).await?;
  String::from_utf8(bytes).map_err(|err| adb::Error::InvalidData(format!("frame payload is not UTF-8: {}", err)))
}

/// Reads the server's acknowledgement.
///
/// `OKAY` succeeds. `FAIL` is followed by a string frame carrying the reason.
pub(crate) async fn read_okay<R>(read: &mut R) -> adb::Result<()>
where
  R: AsyncRead + Unpin + ?Sized,
{
  let status = read_exact_bytes(read, 4).await?;
  match &status[..] {
    b"OKAY" => Ok(()),
    b"FAIL" => {
      let reason = read_string_frame(read).await?;
      Err(adb::Error::ServiceError(reason))
    }
    _ => {
      let mut bytes = [0u8; 4];
      bytes.copy_from_slice(&status);
      Err(adb::Error::UnexpectedStatus(bytes))
    }
  }
}
