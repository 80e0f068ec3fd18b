//! Mock transport for integration tests.
//!
//! Records every command so tests can assert on the full history without
//! a bus, and fails on demand.  Events are injected by the test itself
//! through `Device::handle_event`.

use std::sync::Mutex;

use bcmf::frame::{BssInfo, build_event_frame, encode_escan_result};
use bcmf::ioctl::EventType;
use bcmf::transport::{ControlTransport, Interface, IoError};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Ioctl { opcode: u32, write: bool, data: Vec<u8> },
    Iovar { name: String, write: bool, data: Vec<u8> },
    IovarUnsafe { name: String, data: Vec<u8> },
}

impl Call {
    pub fn key(&self) -> String {
        match self {
            Call::Ioctl { opcode, .. } => format!("ioctl:{opcode}"),
            Call::Iovar { name, .. } | Call::IovarUnsafe { name, .. } => format!("iovar:{name}"),
        }
    }
}

// ── MockTransport ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockTransport {
    pub calls: Mutex<Vec<Call>>,
    fail_names: Mutex<Vec<String>>,
    fail_opcodes: Mutex<Vec<u32>>,
    version: Mutex<Option<Vec<u8>>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_iovar(&self, name: &str) {
        self.fail_names.lock().unwrap().push(name.into());
    }

    pub fn fail_ioctl(&self, opcode: u32) {
        self.fail_opcodes.lock().unwrap().push(opcode);
    }

    pub fn clear_failures(&self) {
        self.fail_names.lock().unwrap().clear();
        self.fail_opcodes.lock().unwrap().clear();
    }

    pub fn set_version(&self, raw: &[u8]) {
        *self.version.lock().unwrap() = Some(raw.to_vec());
    }

    pub fn keys(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(Call::key).collect()
    }

    pub fn count(&self, key: &str) -> usize {
        self.keys().iter().filter(|k| *k == key).count()
    }

    pub fn last(&self) -> Option<Call> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn find(&self, key: &str) -> Option<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.key() == key)
            .cloned()
    }

    fn check_name(&self, name: &str) -> Result<(), IoError> {
        if self.fail_names.lock().unwrap().iter().any(|n| n == name) {
            Err(IoError::Firmware(-1))
        } else {
            Ok(())
        }
    }
}

impl ControlTransport for MockTransport {
    fn ioctl(&self, _iface: Interface, write: bool, opcode: u32, buf: &mut [u8]) -> Result<(), IoError> {
        self.calls.lock().unwrap().push(Call::Ioctl { opcode, write, data: buf.to_vec() });
        if self.fail_opcodes.lock().unwrap().contains(&opcode) {
            return Err(IoError::BusFault);
        }
        Ok(())
    }

    fn iovar(&self, _iface: Interface, write: bool, name: &str, buf: &mut [u8]) -> Result<(), IoError> {
        self.calls.lock().unwrap().push(Call::Iovar { name: name.into(), write, data: buf.to_vec() });
        self.check_name(name)?;
        if !write {
            buf.fill(0);
            if name == "ver" {
                if let Some(v) = self.version.lock().unwrap().as_ref() {
                    let n = v.len().min(buf.len());
                    buf[..n].copy_from_slice(&v[..n]);
                }
            }
        }
        Ok(())
    }

    fn iovar_unsafe(&self, _iface: Interface, name: &str, buf: &[u8]) -> Result<(), IoError> {
        self.calls.lock().unwrap().push(Call::IovarUnsafe { name: name.into(), data: buf.to_vec() });
        self.check_name(name)
    }
}

// ── Frame helpers ─────────────────────────────────────────────

#[allow(dead_code)]
pub fn escan_frame(status: u32, records: &[BssInfo]) -> Vec<u8> {
    let payload = encode_escan_result(0xabcd, records);
    build_event_frame(EventType::EscanResult.id(), status, 0, &payload)
}

#[allow(dead_code)]
pub fn event(ty: EventType, status: u32) -> Vec<u8> {
    build_event_frame(ty.id(), status, 0, &[])
}

#[allow(dead_code)]
pub fn bss(ssid: &str, channel: u8, rssi: i16) -> BssInfo {
    BssInfo {
        bssid: [0x02, 0xaa, 0xbb, 0xcc, 0xdd, channel],
        ssid: heapless::Vec::from_slice(ssid.as_bytes()).unwrap(),
        beacon_period: 100,
        capability: 0x0431,
        chanspec: 0x1000 | u16::from(channel),
        rssi,
    }
}
