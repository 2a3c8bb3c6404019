use std::str::FromStr;

use crate as adb;

#[cfg(feature = "connector")]
use crate::core::{ConnectOptions, Connector, ServerConnection, TunnelHandler};

/// An implementation of adb's socket address specifiers.
///
/// `SocketSpec`s of all types can be constructed on every platform, because
/// they have meaning when talking to a remote device, but actually connecting
/// to an address can fail on unsupported platforms.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketSpec {
  /// A TCP address and port.
  Tcp { host: Option<String>, port: u16 },

  /// A Unix domain socket in the Linux-only abstract namespace.
  UnixAbstract { path: String },

  /// A Unix domain socket on the filesystem.
  UnixFilesystem { path: String },

  /// A socket in the Linux vsock(7) address family.
  Vsock { host: Option<String>, port: u32 },
}

impl SocketSpec {
  /// Constructs a TCP [SocketSpec].
  pub fn tcp(host: Option<String>, port: u16) -> SocketSpec {
    SocketSpec::Tcp { host, port }
  }

  /// Constructs an abstract Unix domain socket [SocketSpec].
  pub fn unix_abstract(path: impl Into<String>) -> SocketSpec {
    SocketSpec::UnixAbstract { path: path.into() }
  }

  /// Constructs a Unix domain socket [SocketSpec].
  pub fn unix_filesystem(path: impl Into<String>) -> SocketSpec {
    SocketSpec::UnixFilesystem { path: path.into() }
  }

  /// Constructs a vsock [SocketSpec].
  pub fn vsock(host: Option<String>, port: u32) -> SocketSpec {
    SocketSpec::Vsock { host, port }
  }

  /// The default adb server location (127.0.0.1:5037).
  pub fn default_server() -> SocketSpec {
    // TODO: Support IPv6 localhost?
    SocketSpec::tcp(Some("127.0.0.1".into()), 5037)
  }

  /// Connects a byte stream to the address described by the [SocketSpec].
  ///
  /// This function can fail for multiple reasons:
  ///   - network failure
  ///   - attempt to connect to a `Tcp` or `Vsock` [SocketSpec] with no host
  ///   - lack of support (e.g. attempting to use Unix domain sockets on Windows)
  #[cfg(feature = "connector")]
  pub async fn connect(&self) -> adb::Result<ServerConnection> {
    match self {
      SocketSpec::Tcp { host, port } => {
        use tokio::net::TcpStream;
        let host = host.as_ref().ok_or(adb::Error::SocketSpecMissingHost)?;
        let stream = TcpStream::connect((host.as_str(), *port)).await?;
        let (read, write) = stream.into_split();
        Ok(split_connection(read, write))
      }

      SocketSpec::UnixAbstract { path } => connect_unix_abstract(path).await,
      SocketSpec::UnixFilesystem { path } => connect_unix_stream(path).await,

      SocketSpec::Vsock { .. } => Err(adb::Error::SocketSpecUnsupportedType),
    }
  }
}

#[cfg(feature = "connector")]
fn split_connection<R, W>(read: R, write: W) -> ServerConnection
where
  R: tokio::io::AsyncRead + Send + Unpin + 'static,
  W: tokio::io::AsyncWrite + Send + Unpin + 'static,
{
  use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
  ServerConnection::from_split(Box::new(read.compat()), Box::new(write.compat_write()))
}

#[cfg(all(unix, feature = "connector"))]
async fn connect_unix_stream(path: impl AsRef<std::path::Path>) -> adb::Result<ServerConnection> {
  use tokio::net::UnixStream;
  let stream = UnixStream::connect(path).await?;
  let (read, write) = stream.into_split();
  Ok(split_connection(read, write))
}

#[cfg(all(not(unix), feature = "connector"))]
async fn connect_unix_stream(_path: impl AsRef<std::path::Path>) -> adb::Result<ServerConnection> {
  Err(adb::Error::SocketSpecUnsupportedType)
}

#[cfg(all(target_os = "linux", feature = "connector"))]
async fn connect_unix_abstract(name: &str) -> adb::Result<ServerConnection> {
  use std::os::linux::net::SocketAddrExt;
  use std::os::unix::net::{SocketAddr, UnixStream as StdUnixStream};

  // Abstract-namespace connects are local and immediate; dial with std and
  // hand the stream to the reactor.
  let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
  let stream = StdUnixStream::connect_addr(&addr)?;
  stream.set_nonblocking(true)?;
  let stream = tokio::net::UnixStream::from_std(stream)?;
  let (read, write) = stream.into_split();
  Ok(split_connection(read, write))
}

#[cfg(all(not(target_os = "linux"), feature = "connector"))]
async fn connect_unix_abstract(_name: &str) -> adb::Result<ServerConnection> {
  Err(adb::Error::SocketSpecUnsupportedType)
}

impl std::fmt::Display for SocketSpec {
  fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      SocketSpec::Tcp { host, port } => {
        if let Some(h) = host {
          write!(fmt, "tcp:{}:{}", h, port)
        } else {
          write!(fmt, "tcp:{}", port)
        }
      }

      SocketSpec::UnixAbstract { path } => write!(fmt, "localabstract:{}", path),
      SocketSpec::UnixFilesystem { path } => write!(fmt, "localfilesystem:{}", path),

      SocketSpec::Vsock { host, port } => {
        if let Some(h) = host {
          write!(fmt, "vsock:{}:{}", h, port)
        } else {
          write!(fmt, "vsock:{}", port)
        }
      }
    }
  }
}

impl TryFrom<&str> for SocketSpec {
  type Error = adb::Error;
  fn try_from(value: &str) -> adb::Result<SocketSpec> {
    if let Some(tail) = value.strip_prefix("tcp:") {
      if let Ok(port) = tail.parse::<u16>() {
        Ok(SocketSpec::tcp(None, port))
      } else {
        let (addr, tail) = if tail.starts_with('[') {
          // IPv6 bracket-enclosed address.
          let close = tail.find(']').ok_or(adb::Error::SocketSpecInvalid)?;
          tail.split_at(close + 1)
        } else {
          let colon = tail.find(':').ok_or(adb::Error::SocketSpecInvalid)?;
          tail.split_at(colon)
        };

        if !tail.starts_with(':') {
          return Err(adb::Error::SocketSpecInvalid);
        }
        let port = tail[1..].parse().map_err(|_err| adb::Error::SocketSpecInvalid)?;

        Ok(SocketSpec::tcp(Some(addr.into()), port))
      }
    } else if let Some(tail) = value.strip_prefix("localabstract:") {
      Ok(SocketSpec::unix_abstract(tail))
    } else if let Some(tail) = value.strip_prefix("localfilesystem:") {
      Ok(SocketSpec::unix_filesystem(tail))
    } else if let Some(tail) = value.strip_prefix("local:") {
      Ok(SocketSpec::unix_filesystem(tail))
    } else {
      Err(adb::Error::SocketSpecInvalid)
    }
  }
}

impl FromStr for SocketSpec {
  type Err = adb::Error;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    SocketSpec::try_from(s)
  }
}

/// [Connector] that dials a fixed [SocketSpec].
#[cfg(feature = "connector")]
pub struct SpecConnector {
  spec: SocketSpec,
  tunnels: std::sync::Mutex<TunnelRegistry>,
}

#[cfg(feature = "connector")]
#[derive(Default)]
struct TunnelRegistry {
  next_address: u32,
  handlers: std::collections::HashMap<String, TunnelHandler>,
}

#[cfg(feature = "connector")]
impl SpecConnector {
  /// Constructs a connector dialing `spec`.
  pub fn new(spec: SocketSpec) -> SpecConnector {
    SpecConnector {
      spec,
      tunnels: std::sync::Mutex::new(TunnelRegistry::default()),
    }
  }

  /// Constructs a connector dialing the default adb server location.
  pub fn default_server() -> SpecConnector {
    SpecConnector::new(SocketSpec::default_server())
  }

  /// The address this connector dials.
  pub fn spec(&self) -> &SocketSpec {
    &self.spec
  }
}

#[cfg(feature = "connector")]
impl Connector for SpecConnector {
  fn connect<'a>(
    &'a self,
    options: &'a ConnectOptions,
  ) -> std::pin::Pin<Box<dyn std::future::Future<Output = adb::Result<ServerConnection>> + Send + 'a>> {
    // The unref hint has no tokio equivalent and is ignored.
    Box::pin(async move { crate::core::race_with_signals(self.spec.connect(), options.signals()).await })
  }

  fn add_reverse_tunnel(&self, handler: TunnelHandler, address: Option<String>) -> adb::Result<String> {
    let mut tunnels = self.tunnels.lock().unwrap();
    let address = address.unwrap_or_else(|| {
      tunnels.next_address += 1;
      format!("tcp:{}", tunnels.next_address)
    });
    tunnels.handlers.insert(address.clone(), handler);
    Ok(address)
  }

  fn remove_reverse_tunnel(&self, address: &str) -> adb::Result<()> {
    self.tunnels.lock().unwrap().handlers.remove(address);
    Ok(())
  }

  fn clear_reverse_tunnels(&self) {
    self.tunnels.lock().unwrap().handlers.clear();
  }
}

#[cfg(test)]
mod test {
  use super::SocketSpec;
  use std::str::FromStr;

  #[test]
  fn parse_tcp_hostless() {
    assert_eq!(
      Some(SocketSpec::Tcp { host: None, port: 5037 }),
      SocketSpec::from_str("tcp:5037").ok()
    );
    assert_eq!(None, SocketSpec::from_str("tcp:").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:-1").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:65536").ok());
  }

  #[test]
  fn parse_tcp_with_host() {
    assert_eq!(
      Some(SocketSpec::Tcp {
        host: Some("localhost".into()),
        port: 1234
      }),
      SocketSpec::from_str("tcp:localhost:1234").ok()
    );
    assert_eq!(None, SocketSpec::from_str("tcp:localhost").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:localhost:").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:localhost:-1").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:localhost:65536").ok());
  }

  #[test]
  fn parse_tcp_ipv6() {
    assert_eq!(
      Some(SocketSpec::Tcp {
        host: Some("[::1]".into()),
        port: 1234
      }),
      SocketSpec::from_str("tcp:[::1]:1234").ok()
    );
    assert_eq!(None, SocketSpec::from_str("tcp:[::1]").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:[::1]:").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:[::1]:-1").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:::1:-1").ok());
    assert_eq!(None, SocketSpec::from_str("tcp:::1:1234").ok());
  }

  #[test]
  fn parse_local_variants() {
    assert_eq!(
      Some(SocketSpec::UnixAbstract { path: "adbd".into() }),
      SocketSpec::from_str("localabstract:adbd").ok()
    );
    assert_eq!(
      Some(SocketSpec::UnixFilesystem {
        path: "/tmp/adb.sock".into()
      }),
      SocketSpec::from_str("localfilesystem:/tmp/adb.sock").ok()
    );
    assert_eq!(
      Some(SocketSpec::UnixFilesystem {
        path: "/tmp/adb.sock".into()
      }),
      SocketSpec::from_str("local:/tmp/adb.sock").ok()
    );
    assert_eq!(None, SocketSpec::from_str("vsock").ok());
  }

  #[test]
  fn display_round_trips() {
    for spec in [
      "tcp:5037",
      "tcp:localhost:1234",
      "localabstract:adbd",
      "localfilesystem:/tmp/adb.sock",
    ] {
      assert_eq!(spec, SocketSpec::from_str(spec).unwrap().to_string());
    }
  }
}

#[cfg(all(test, feature = "connector"))]
mod connector_test {
  use std::sync::Arc;

  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  use super::{SocketSpec, SpecConnector};
  use crate::client::Client;

  #[tokio::test]
  async fn get_version_against_a_live_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
      let (mut stream, _) = listener.accept().await.unwrap();
      let mut request = [0u8; 16];
      stream.read_exact(&mut request).await.unwrap();
      assert_eq!(&request, b"000chost:version");
      stream.write_all(b"OKAY00040029").await.unwrap();
    });

    let connector = Arc::new(SpecConnector::new(SocketSpec::tcp(Some("127.0.0.1".into()), port)));
    let client = Client::new(connector);
    assert_eq!(client.get_version().await.unwrap(), 41);
    server.await.unwrap();
  }
}
