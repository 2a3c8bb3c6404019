use thiserror::Error;

/// Error type returned by library functions.
#[derive(Debug, Error)]
pub enum Error {
  /// An I/O error occurred while dialing or using a server connection.
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  /// The server answered a request with `FAIL` and a reason.
  #[error("service failed: {0}")]
  ServiceError(String),

  /// The server's acknowledgement was neither `OKAY` nor `FAIL`.
  #[error("expected OKAY or FAIL, got {0:?}")]
  UnexpectedStatus([u8; 4]),

  /// The stream ended in the middle of a read.
  #[error("connection closed mid-read")]
  UnexpectedEof,

  /// Received bytes that failed to decode as hex or UTF-8.
  #[error("invalid data: {0}")]
  InvalidData(String),

  /// A device selector failed to parse.
  #[error("invalid device selector: {0}")]
  InvalidCriteria(String),

  /// A `devices-l` entry carried no usable transport id.
  #[error("device {0} reported no transport id")]
  MissingTransportId(String),

  /// The server speaks a different protocol version than this client.
  #[error("adb server version {server} does not match client version {client}")]
  VersionMismatch { server: u32, client: u32 },

  /// An abort signal fired; carries the signal's reason.
  #[error("aborted: {0}")]
  Aborted(String),

  /// SocketSpec failed to parse.
  #[error("invalid socket spec")]
  SocketSpecInvalid,

  /// Attempted to connect to a tcp or vsock SocketSpec that didn't have a host.
  #[error("socket spec has no host")]
  SocketSpecMissingHost,

  /// Attempted to use a SocketSpec that is unavailable on the current platform.
  #[error("socket spec unsupported on this platform")]
  SocketSpecUnsupportedType,
}

/// `Result` typedef using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;
