//! Types and functions for client implementations.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use futures::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, trace};

use crate as adb;
use crate::core::{race_with_signals, ConnectOptions, Connector, ServerConnection, TunnelHandler};
use crate::host::{Banner, DeviceCriteria, DeviceFeatures, DeviceInfo, TransportId, WaitState};

mod framing;
mod reader;
mod socket;
mod transport;

pub use socket::ServiceSocket;
pub use transport::Transport;

use framing::{read_exact_bytes, read_okay, read_string_frame, write_hex_length_prefixed};
use reader::BufferedReader;

/// Protocol version this client speaks.
pub const VERSION: u32 = 41;

/// Formats the host-side service prefix for `command` addressed per `criteria`.
pub fn format_device_service(criteria: &DeviceCriteria, command: &str) -> String {
  match criteria {
    DeviceCriteria::Any => format!("host:{}", command),
    DeviceCriteria::TransportId(id) => format!("host-transport-id:{}:{}", id, command),
    DeviceCriteria::Serial(serial) => format!("host-serial:{}:{}", serial, command),
    DeviceCriteria::Usb => format!("host-usb:{}", command),
    DeviceCriteria::Tcp => format!("host-local:{}", command),
  }
}

/// Service that switches the connection it arrives on over to the selected device.
fn switch_service(criteria: &DeviceCriteria) -> String {
  match criteria {
    DeviceCriteria::Any => "host:tport:any".to_string(),
    DeviceCriteria::TransportId(id) => format!("host:transport-id:{}", id),
    DeviceCriteria::Serial(serial) => format!("host:tport:serial:{}", serial),
    DeviceCriteria::Usb => "host:tport:usb".to_string(),
    DeviceCriteria::Tcp => "host:tport:local".to_string(),
  }
}

/// Device-type token for `wait-for-{type}-{state}` services.
fn wait_for_type(criteria: &DeviceCriteria) -> &'static str {
  match criteria {
    DeviceCriteria::Usb => "usb",
    DeviceCriteria::Tcp => "local",
    _ => "any",
  }
}

fn split_features(payload: &str) -> Vec<String> {
  payload
    .split(',')
    .filter(|feature| !feature.is_empty())
    .map(str::to_owned)
    .collect()
}

async fn close_quietly<W>(write: &mut W)
where
  W: AsyncWrite + Unpin + ?Sized,
{
  let _ = write.close().await;
}

async fn read_version_frame<R>(read: &mut R) -> adb::Result<u32>
where
  R: futures::io::AsyncRead + Unpin + ?Sized,
{
  // The version response is a hex number inside a hex-framed string; the double
  // encoding is historical.
  let version = read_string_frame(read).await?;
  u32::from_str_radix(&version, 16)
    .map_err(|err| adb::Error::InvalidData(format!("version {:?} is not hex: {}", version, err)))
}

/// A client of a locally running adb server.
///
/// Holds no I/O state of its own; every request dials a fresh connection through
/// the shared [Connector]. Cloning is cheap and clones share the connector.
#[derive(Clone)]
pub struct Client {
  connector: Arc<dyn Connector>,
}

impl Client {
  /// Constructs a client that dials through `connector`.
  pub fn new(connector: Arc<dyn Connector>) -> Client {
    Client { connector }
  }

  /// The connector used to dial the server.
  pub fn connector(&self) -> &Arc<dyn Connector> {
    &self.connector
  }

  /// Performs one request/acknowledgement exchange.
  ///
  /// On `OKAY` the returned connection carries whatever the server sends next,
  /// including bytes that arrived together with the acknowledgement. On any
  /// failure the dialed connection is closed before the error surfaces, and an
  /// abort signal that already fired prevents the dial entirely.
  pub async fn connect(&self, request: &str, options: &ConnectOptions) -> adb::Result<ServerConnection> {
    if let Some(reason) = options.signal.as_ref().and_then(|signal| signal.reason()) {
      return Err(adb::Error::Aborted(reason));
    }

    trace!("connecting to adb server for {:?}", request);
    let connection = self.connector.connect(options).await?;
    let (read, mut write) = connection.into_split();

    if let Err(err) = write_hex_length_prefixed(&mut write, request.as_bytes()).await {
      close_quietly(&mut write).await;
      return Err(err);
    }

    let mut reader = BufferedReader::new(read);
    let ack = race_with_signals(read_okay(&mut reader), options.signals()).await;
    match ack {
      Ok(()) => Ok(ServerConnection::from_split(Box::new(reader), write)),
      Err(err) => {
        if let adb::Error::ServiceError(reason) = &err {
          error!("server rejected {:?}: {}", request, reason);
        }
        close_quietly(&mut write).await;
        Err(err)
      }
    }
  }

  /// Get the server's protocol version.
  pub async fn get_version(&self) -> adb::Result<u32> {
    let mut connection = self.connect("host:version", &ConnectOptions::default()).await?;
    let version = read_version_frame(&mut connection).await;
    let _ = connection.close().await;
    version
  }

  /// Fails with [adb::Error::VersionMismatch] unless the server speaks [VERSION].
  pub async fn validate_version(&self) -> adb::Result<()> {
    let server = self.get_version().await?;
    if server != VERSION {
      return Err(adb::Error::VersionMismatch {
        server,
        client: VERSION,
      });
    }
    Ok(())
  }

  /// Asks the server to exit.
  pub async fn kill_server(&self) -> adb::Result<()> {
    let mut connection = self.connect("host:kill", &ConnectOptions::default()).await?;
    let _ = connection.close().await;
    Ok(())
  }

  /// The feature set of the server itself.
  pub async fn get_server_features(&self) -> adb::Result<Vec<String>> {
    let mut connection = self.connect("host:host-features", &ConnectOptions::default()).await?;
    let payload = read_string_frame(&mut connection).await;
    let _ = connection.close().await;
    Ok(split_features(&payload?))
  }

  /// Lists attached devices that are online.
  pub async fn get_devices(&self) -> adb::Result<Vec<DeviceInfo>> {
    let mut connection = self.connect("host:devices-l", &ConnectOptions::default()).await?;
    let payload = read_string_frame(&mut connection).await;
    let _ = connection.close().await;
    DeviceInfo::parse_list(&payload?)
  }

  /// The feature set of the selected device, along with the transport id the
  /// bind resolved.
  pub async fn get_device_features(&self, criteria: &DeviceCriteria) -> adb::Result<DeviceFeatures> {
    let mut socket = self.connect_device(criteria, "host:features").await?;
    let transport_id = socket.transport_id();
    let payload = read_string_frame(&mut socket).await;
    let _ = socket.close().await;
    Ok(DeviceFeatures {
      transport_id,
      features: split_features(&payload?),
    })
  }

  /// Binds a fresh connection to the selected device and opens `service` on it.
  ///
  /// The server protocol version is validated before anything is dialed, so a
  /// mismatched server is reported as such rather than as a bind failure.
  pub async fn connect_device(&self, criteria: &DeviceCriteria, service: &str) -> adb::Result<ServiceSocket> {
    self.validate_version().await?;

    // `host:transport-id:` binds carry no id prefix on the wire; the id is
    // already in hand. Every `host:tport:` variant sends 8 bytes of id.
    let known_id = match criteria {
      DeviceCriteria::TransportId(id) => Some(*id),
      _ => None,
    };

    debug!("binding device transport for {:?}", service);
    let connection = self.connect(&switch_service(criteria), &ConnectOptions::default()).await?;
    let (read, mut write) = connection.into_split();

    if let Err(err) = write_hex_length_prefixed(&mut write, service.as_bytes()).await {
      close_quietly(&mut write).await;
      return Err(err);
    }

    let mut reader = BufferedReader::new(read);
    let handshake: adb::Result<TransportId> = async {
      let transport_id = match known_id {
        Some(id) => id,
        None => {
          let bytes = read_exact_bytes(&mut reader, 8).await?;
          TransportId(LittleEndian::read_u64(&bytes))
        }
      };
      read_okay(&mut reader).await?;
      Ok(transport_id)
    }
    .await;

    match handshake {
      Ok(transport_id) => {
        trace!("transport {} bound for {:?}", transport_id, service);
        Ok(ServiceSocket::new(transport_id, service, Box::new(reader), write))
      }
      Err(err) => {
        close_quietly(&mut write).await;
        Err(err)
      }
    }
  }

  /// Waits until the selected device reaches `state`.
  ///
  /// The server acknowledges only once the condition holds, so the optional
  /// abort signal in `options` is honoured for the entire wait. Resolution of
  /// the request is the success signal; no payload follows.
  pub async fn wait_for(&self, criteria: &DeviceCriteria, state: WaitState, options: &ConnectOptions) -> adb::Result<()> {
    let command = format!("wait-for-{}-{}", wait_for_type(criteria), state);
    let mut connection = self.connect(&format_device_service(criteria, &command), options).await?;
    let _ = connection.close().await;
    Ok(())
  }

  /// Resolves the selected device into a [Transport] ready for a packet dispatcher.
  pub async fn create_transport(&self, criteria: &DeviceCriteria) -> adb::Result<Transport> {
    let DeviceFeatures {
      transport_id,
      features,
    } = self.get_device_features(criteria).await?;

    // The device can detach between the two queries. The feature set is
    // authoritative either way; identity fields default to empty.
    let devices = self.get_devices().await?;
    let entry = devices.into_iter().find(|device| device.transport_id == transport_id);
    let (serial, product, model, device) = match entry {
      Some(info) => (info.serial, info.product, info.model, info.device),
      None => (String::new(), None, None, None),
    };

    let banner = Banner {
      product,
      model,
      device,
      features,
    };
    Ok(Transport::new(self.clone(), serial, banner, transport_id))
  }

  /// Registers a reverse-tunnel handler with the connector.
  pub fn add_reverse_tunnel(&self, handler: TunnelHandler, address: Option<String>) -> adb::Result<String> {
    self.connector.add_reverse_tunnel(handler, address)
  }

  /// Removes a reverse-tunnel handler from the connector.
  pub fn remove_reverse_tunnel(&self, address: &str) -> adb::Result<()> {
    self.connector.remove_reverse_tunnel(address)
  }

  /// Drops every reverse-tunnel handler registered with the connector.
  pub fn clear_reverse_tunnels(&self) {
    self.connector.clear_reverse_tunnels()
  }
}
