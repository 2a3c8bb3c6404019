//! Types and functions shared across host implementations (client and server).

use crate as adb;

/// Integral identifier for transports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransportId(pub u64);

impl std::fmt::Display for TransportId {
  fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(fmt, "{}", self.0)
  }
}

/// Selection criteria for a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceCriteria {
  /// Any device (default in the CLI).
  Any,

  /// Specific serial (-s or `$ANDROID_SERIAL` in the CLI).
  Serial(String),

  /// Transport id (-t in the CLI).
  TransportId(TransportId),

  /// USB device (-d in the CLI).
  Usb,

  /// TCP device (-e in the CLI).
  Tcp,
}

impl TryFrom<&str> for DeviceCriteria {
  type Error = adb::Error;

  fn try_from(value: &str) -> adb::Result<DeviceCriteria> {
    match value {
      "any" => return Ok(DeviceCriteria::Any),
      "usb" => return Ok(DeviceCriteria::Usb),
      "tcp" | "local" => return Ok(DeviceCriteria::Tcp),
      _ => {}
    }

    if let Some(serial) = value.strip_prefix("serial:") {
      if serial.is_empty() {
        return Err(adb::Error::InvalidCriteria(value.into()));
      }
      return Ok(DeviceCriteria::Serial(serial.into()));
    }

    if let Some(id) = value.strip_prefix("transport-id:") {
      let id = id.parse().map_err(|_err| adb::Error::InvalidCriteria(value.into()))?;
      return Ok(DeviceCriteria::TransportId(TransportId(id)));
    }

    Err(adb::Error::InvalidCriteria(value.into()))
  }
}

impl std::str::FromStr for DeviceCriteria {
  type Err = adb::Error;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    DeviceCriteria::try_from(s)
  }
}

/// Target state for waiting on a device lifecycle transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitState {
  /// Wait until the device is attached and online.
  Device,

  /// Wait until the device detaches.
  Disconnect,
}

impl std::fmt::Display for WaitState {
  fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      WaitState::Device => write!(fmt, "device"),
      WaitState::Disconnect => write!(fmt, "disconnect"),
    }
  }
}

/// One online device parsed from the server's `devices-l` listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
  pub serial: String,
  pub product: Option<String>,
  pub model: Option<String>,
  pub device: Option<String>,
  pub transport_id: TransportId,
}

impl DeviceInfo {
  /// Parses one `devices-l` line of the form `SERIAL STATUS [KEY:VALUE]...`.
  ///
  /// Lines whose status is not `device` describe offline or unauthorized entries
  /// and yield `None`. Unknown keys are ignored.
  fn parse_line(line: &str) -> adb::Result<Option<DeviceInfo>> {
    let mut tokens = line.split_whitespace();
    let serial = match tokens.next() {
      Some(serial) => serial,
      None => return Ok(None),
    };
    if tokens.next() != Some("device") {
      return Ok(None);
    }

    let mut product = None;
    let mut model = None;
    let mut device = None;
    let mut transport_id = None;
    for token in tokens {
      if let Some((key, value)) = token.split_once(':') {
        match key {
          "product" => product = Some(value.to_owned()),
          "model" => model = Some(value.to_owned()),
          "device" => device = Some(value.to_owned()),
          "transport_id" => transport_id = value.parse::<u64>().ok(),
          _ => {}
        }
      }
    }

    match transport_id {
      Some(id) if id != 0 => Ok(Some(DeviceInfo {
        serial: serial.to_owned(),
        product,
        model,
        device,
        transport_id: TransportId(id),
      })),
      _ => Err(adb::Error::MissingTransportId(serial.to_owned())),
    }
  }

  /// Parses a full `devices-l` payload, skipping empty lines and non-`device` entries.
  pub fn parse_list(payload: &str) -> adb::Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();
    for line in payload.lines() {
      if line.trim().is_empty() {
        continue;
      }
      if let Some(device) = DeviceInfo::parse_line(line)? {
        devices.push(device);
      }
    }
    Ok(devices)
  }
}

/// Capability banner for a bound device.
///
/// The feature list is the authoritative capability set; the identity fields are
/// best-effort and may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Banner {
  pub product: Option<String>,
  pub model: Option<String>,
  pub device: Option<String>,
  pub features: Vec<String>,
}

/// Feature set of a bound device, along with the transport id the server resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceFeatures {
  pub transport_id: TransportId,
  pub features: Vec<String>,
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn parse_devices_long_listing() {
    let payload =
      "emulator-5554\tdevice product:sdk_phone model:Phone device:generic transport_id:2\noffline-1\toffline\n";
    let devices = DeviceInfo::parse_list(payload).unwrap();
    assert_eq!(
      devices,
      vec![DeviceInfo {
        serial: "emulator-5554".into(),
        product: Some("sdk_phone".into()),
        model: Some("Phone".into()),
        device: Some("generic".into()),
        transport_id: TransportId(2),
      }]
    );
  }

  #[test]
  fn parse_tolerates_spaces_and_blank_lines() {
    let payload = "\nserialno device transport_id:11\n\n";
    let devices = DeviceInfo::parse_list(payload).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].serial, "serialno");
    assert_eq!(devices[0].transport_id, TransportId(11));
    assert_eq!(devices[0].product, None);
  }

  #[test]
  fn parse_skips_unknown_keys() {
    let payload = "serialno device usb:1-2 product:p transport_id:3\n";
    let devices = DeviceInfo::parse_list(payload).unwrap();
    assert_eq!(devices[0].product.as_deref(), Some("p"));
    assert_eq!(devices[0].model, None);
  }

  #[test]
  fn parse_rejects_missing_transport_id() {
    let payload = "serialno device product:p\n";
    match DeviceInfo::parse_list(payload) {
      Err(adb::Error::MissingTransportId(serial)) => assert_eq!(serial, "serialno"),
      other => panic!("expected MissingTransportId, got {:?}", other),
    }
  }

  #[test]
  fn parse_rejects_zero_transport_id() {
    let payload = "serialno device transport_id:0\n";
    assert!(matches!(
      DeviceInfo::parse_list(payload),
      Err(adb::Error::MissingTransportId(_))
    ));
  }

  #[test]
  fn parse_skips_unauthorized_and_offline() {
    let payload = "a unauthorized transport_id:1\nb offline transport_id:2\nc device transport_id:3\n";
    let devices = DeviceInfo::parse_list(payload).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].serial, "c");
  }

  #[test]
  fn criteria_from_str() {
    assert_eq!(DeviceCriteria::try_from("any").unwrap(), DeviceCriteria::Any);
    assert_eq!(DeviceCriteria::try_from("usb").unwrap(), DeviceCriteria::Usb);
    assert_eq!(DeviceCriteria::try_from("tcp").unwrap(), DeviceCriteria::Tcp);
    assert_eq!(DeviceCriteria::try_from("local").unwrap(), DeviceCriteria::Tcp);
    assert_eq!(
      DeviceCriteria::try_from("serial:emulator-5554").unwrap(),
      DeviceCriteria::Serial("emulator-5554".into())
    );
    assert_eq!(
      DeviceCriteria::try_from("transport-id:7").unwrap(),
      DeviceCriteria::TransportId(TransportId(7))
    );

    for bad in ["", "serial:", "transport-id:x", "transport-id:", "emulator-5554"] {
      assert!(matches!(
        DeviceCriteria::try_from(bad),
        Err(adb::Error::InvalidCriteria(_))
      ));
    }
  }
}
