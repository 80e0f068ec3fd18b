//! Simulated firmware.
//!
//! Implements [`ControlTransport`] on the host and answers the way adapter
//! firmware does: commands complete synchronously, and the asynchronous
//! outcomes (escan results, join status) are pushed as event frames into
//! an [`EventQueue`] for the pump to deliver.
//!
//! Every command is recorded.  Faults and silences can be injected to drive
//! the timeout and I/O-failure paths.

use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::events::EventQueue;
use crate::frame::{BssInfo, build_event_frame, encode_escan_result};
use crate::ioctl::{EventType, Ioctl, MAX_SSID_LEN, iovar, status};
use crate::sync::lock;
use crate::transport::{ControlTransport, Interface, IoError};

/// A network the simulated radio can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimNetwork {
    pub ssid: String,
    pub bssid: [u8; 6],
    pub channel: u8,
    pub rssi: i16,
}

impl SimNetwork {
    pub fn new(ssid: &str, channel: u8, rssi: i16) -> Self {
        let mut bssid = [0x02, 0x00, 0x00, 0x00, 0x00, channel];
        for (i, b) in ssid.bytes().take(4).enumerate() {
            bssid[1 + i] = b;
        }
        Self {
            ssid: ssid.into(),
            bssid,
            channel,
            rssi,
        }
    }

    fn to_bss(&self) -> BssInfo {
        let take = self.ssid.len().min(MAX_SSID_LEN);
        let mut ssid = heapless::Vec::new();
        // Length is clamped to capacity above.
        let _ = ssid.extend_from_slice(&self.ssid.as_bytes()[..take]);
        BssInfo {
            bssid: self.bssid,
            ssid,
            beacon_period: 100,
            capability: 0x0411,
            chanspec: 0x1000 | u16::from(self.channel),
            rssi: self.rssi,
        }
    }
}

/// One command as the firmware saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCommand {
    Ioctl { opcode: u32, write: bool, data: Vec<u8> },
    Iovar { name: String, write: bool, data: Vec<u8> },
}

impl SimCommand {
    pub fn name(&self) -> String {
        match self {
            Self::Ioctl { opcode, .. } => format!("ioctl:{opcode}"),
            Self::Iovar { name, .. } => format!("iovar:{name}"),
        }
    }
}

struct SimState {
    networks: Vec<SimNetwork>,
    version: String,
    mac: [u8; 6],
    up: bool,
    join_status: Option<u32>,
    scan_status: u32,
    respond_to_scan: bool,
    respond_to_join: bool,
    fail_iovar: Option<String>,
    fail_ioctl: Option<u32>,
    commands: Vec<SimCommand>,
}

pub struct SimFirmware {
    events: Arc<EventQueue>,
    state: Mutex<SimState>,
}

impl SimFirmware {
    pub fn new(events: Arc<EventQueue>) -> Self {
        Self {
            events,
            state: Mutex::new(SimState {
                networks: Vec::new(),
                version: "wl0: Oct 19 2026 version 7.45.98.sim (r1) FWID 01-0000".into(),
                mac: [0x02, 0x42, 0xbc, 0x00, 0x00, 0x01],
                up: false,
                join_status: None,
                scan_status: status::SUCCESS,
                respond_to_scan: true,
                respond_to_join: true,
                fail_iovar: None,
                fail_ioctl: None,
                commands: Vec::new(),
            }),
        }
    }

    pub fn add_network(&self, net: SimNetwork) {
        lock(&self.state).networks.push(net);
    }

    /// Force the status reported for the next joins.  `None` restores
    /// "success if the SSID is known".
    pub fn set_join_status(&self, status: Option<u32>) {
        lock(&self.state).join_status = status;
    }

    /// Status carried by the terminal escan frame.
    pub fn set_scan_status(&self, status: u32) {
        lock(&self.state).scan_status = status;
    }

    pub fn set_scan_response(&self, respond: bool) {
        lock(&self.state).respond_to_scan = respond;
    }

    pub fn set_join_response(&self, respond: bool) {
        lock(&self.state).respond_to_join = respond;
    }

    pub fn fail_iovar(&self, name: Option<&str>) {
        lock(&self.state).fail_iovar = name.map(Into::into);
    }

    pub fn fail_ioctl(&self, opcode: Option<u32>) {
        lock(&self.state).fail_ioctl = opcode;
    }

    pub fn is_up(&self) -> bool {
        lock(&self.state).up
    }

    pub fn commands(&self) -> Vec<SimCommand> {
        lock(&self.state).commands.clone()
    }

    pub fn command_names(&self) -> Vec<String> {
        lock(&self.state).commands.iter().map(SimCommand::name).collect()
    }

    // ── Firmware behaviour ───────────────────────────────────────

    fn emit(&self, event: EventType, status: u32, payload: &[u8]) {
        let frame = build_event_frame(event.id(), status, 0, payload);
        if !self.events.push_frame(&frame) {
            debug!("sim: event {:?} lost, queue full", event);
        }
    }

    fn run_escan(&self, request: &[u8]) {
        let sync_id = request
            .get(6..8)
            .map_or(0, |b| u16::from_le_bytes([b[0], b[1]]));
        let (networks, terminal) = {
            let st = lock(&self.state);
            if !st.respond_to_scan {
                debug!("sim: escan accepted, staying silent");
                return;
            }
            (st.networks.clone(), st.scan_status)
        };
        for net in &networks {
            let payload = encode_escan_result(sync_id, &[net.to_bss()]);
            self.emit(EventType::EscanResult, status::PARTIAL, &payload);
        }
        self.emit(EventType::EscanResult, terminal, &encode_escan_result(sync_id, &[]));
        info!("sim: escan reported {} network(s)", networks.len());
    }

    fn run_join(&self, param: &[u8]) {
        let len = param
            .get(0..4)
            .map_or(0, |b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .min(MAX_SSID_LEN);
        let ssid = param.get(4..4 + len).unwrap_or_default();
        let result = {
            let st = lock(&self.state);
            if !st.respond_to_join {
                debug!("sim: join accepted, staying silent");
                return;
            }
            st.join_status.unwrap_or_else(|| {
                if st.networks.iter().any(|n| n.ssid.as_bytes() == ssid) {
                    status::SUCCESS
                } else {
                    status::NO_NETWORKS
                }
            })
        };
        self.emit(EventType::Link, result, &[]);
        self.emit(EventType::SetSsid, result, &[]);
    }
}

impl ControlTransport for SimFirmware {
    fn ioctl(&self, _iface: Interface, write: bool, opcode: u32, buf: &mut [u8]) -> Result<(), IoError> {
        {
            let mut st = lock(&self.state);
            st.commands.push(SimCommand::Ioctl { opcode, write, data: buf.to_vec() });
            if st.fail_ioctl == Some(opcode) {
                return Err(IoError::BusFault);
            }
            if opcode == Ioctl::Up.code() {
                st.up = true;
            } else if opcode == Ioctl::Down.code() {
                st.up = false;
            }
        }
        if !write {
            buf.fill(0);
        }
        if write && opcode == Ioctl::SetSsid.code() {
            self.run_join(buf);
        }
        Ok(())
    }

    fn iovar(&self, _iface: Interface, write: bool, name: &str, buf: &mut [u8]) -> Result<(), IoError> {
        let mut st = lock(&self.state);
        st.commands.push(SimCommand::Iovar { name: name.into(), write, data: buf.to_vec() });
        if st.fail_iovar.as_deref() == Some(name) {
            return Err(IoError::Firmware(-23));
        }
        match (name, write) {
            (iovar::VERSION, false) => {
                buf.fill(0);
                let text = format!("{}\n", st.version);
                let n = text.len().min(buf.len().saturating_sub(1));
                buf[..n].copy_from_slice(&text.as_bytes()[..n]);
            }
            (iovar::CUR_ETHERADDR, false) => {
                let n = buf.len().min(6);
                buf[..n].copy_from_slice(&st.mac[..n]);
            }
            (iovar::CUR_ETHERADDR, true) => {
                if buf.len() >= 6 {
                    st.mac.copy_from_slice(&buf[..6]);
                }
            }
            (_, false) => buf.fill(0),
            (_, true) => {}
        }
        Ok(())
    }

    fn iovar_unsafe(&self, _iface: Interface, name: &str, buf: &[u8]) -> Result<(), IoError> {
        {
            let mut st = lock(&self.state);
            st.commands.push(SimCommand::Iovar { name: name.into(), write: true, data: buf.to_vec() });
            if st.fail_iovar.as_deref() == Some(name) {
                return Err(IoError::Firmware(-23));
            }
        }
        if name == iovar::ESCAN {
            self.run_escan(buf);
        }
        Ok(())
    }
}
