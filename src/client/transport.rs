//! Assembled transport handles, ready for a device-packet dispatcher.

use crate as adb;
use crate::client::{Client, ServiceSocket};
use crate::host::{Banner, DeviceCriteria, TransportId};

/// One resolved device transport.
///
/// Holds everything a device-side packet layer needs: the owning client, the
/// device's serial and banner, and the transport id to bind service channels
/// with. The serial and banner identity fields are best-effort; the banner's
/// feature list is authoritative.
#[derive(Clone)]
pub struct Transport {
  client: Client,
  serial: String,
  banner: Banner,
  transport_id: TransportId,
}

impl Transport {
  pub(crate) fn new(client: Client, serial: String, banner: Banner, transport_id: TransportId) -> Transport {
    Transport {
      client,
      serial,
      banner,
      transport_id,
    }
  }

  /// The client this transport was resolved through.
  pub fn client(&self) -> &Client {
    &self.client
  }

  /// The device's serial, or empty if the device vanished from the listing
  /// while the transport was being resolved.
  pub fn serial(&self) -> &str {
    &self.serial
  }

  /// The device's capability banner.
  pub fn banner(&self) -> &Banner {
    &self.banner
  }

  /// The transport id the server assigned to this device connection.
  pub fn transport_id(&self) -> TransportId {
    self.transport_id
  }

  /// Opens a service channel on this transport.
  pub async fn open(&self, service: &str) -> adb::Result<ServiceSocket> {
    self
      .client
      .connect_device(&DeviceCriteria::TransportId(self.transport_id), service)
      .await
  }
}
