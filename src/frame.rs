//! Inbound event frame layout and the escan result parser.
//!
//! Event frame:
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────┬───────────────┬─────────────┐
//! │ type (4) │status (4)│reason (4)│ payload_len  │ src_name (16) │ payload (N) │
//! │ LE u32   │ LE u32   │ LE u32   │ LE u32 (4)   │ NUL-padded    │             │
//! └──────────┴──────────┴──────────┴──────────────┴───────────────┴─────────────┘
//! ```
//!
//! Escan result payload:
//! ```text
//! ┌────────────┬─────────────┬─────────────┬───────────────┬─────────────────┐
//! │ buflen (4) │ version (4) │ sync_id (2) │ bss_count (2) │ BSS records ... │
//! └────────────┴─────────────┴─────────────┴───────────────┴─────────────────┘
//! ```
//!
//! Every multi-byte field is read through a bounds-checked helper.  A frame
//! whose declared lengths disagree with its actual size is rejected as a
//! whole; nothing from it is committed.

use heapless::Vec as HVec;

use crate::error::{Error, Result};
use crate::ioctl::MAX_SSID_LEN;

// ───────────────────────────────────────────────────────────────
// Bounds-checked little-endian readers
// ───────────────────────────────────────────────────────────────

pub(crate) fn read_u16(buf: &[u8], off: usize) -> Option<u16> {
    let b = buf.get(off..off.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn read_u32(buf: &[u8], off: usize) -> Option<u32> {
    let b = buf.get(off..off.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_i16(buf: &[u8], off: usize) -> Option<i16> {
    read_u16(buf, off).map(|v| v as i16)
}

// ───────────────────────────────────────────────────────────────
// Event header
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub event_type: u32,
    pub status: u32,
    pub reason: u32,
    /// Length the firmware claims for the payload.  Not trusted.
    pub payload_len: u32,
    pub src_name: [u8; 16],
}

impl EventHeader {
    pub const LEN: usize = 32;

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut src_name = [0u8; 16];
        src_name.copy_from_slice(buf.get(16..Self::LEN)?);
        Some(Self {
            event_type: read_u32(buf, 0)?,
            status: read_u32(buf, 4)?,
            reason: read_u32(buf, 8)?,
            payload_len: read_u32(buf, 12)?,
            src_name,
        })
    }

    pub fn encode(&self, out: &mut [u8]) -> Option<()> {
        let out = out.get_mut(..Self::LEN)?;
        out[0..4].copy_from_slice(&self.event_type.to_le_bytes());
        out[4..8].copy_from_slice(&self.status.to_le_bytes());
        out[8..12].copy_from_slice(&self.reason.to_le_bytes());
        out[12..16].copy_from_slice(&self.payload_len.to_le_bytes());
        out[16..32].copy_from_slice(&self.src_name);
        Some(())
    }

    /// Interface name the event originated from, up to the first NUL.
    pub fn src_name_str(&self) -> &str {
        let end = self.src_name.iter().position(|&b| b == 0).unwrap_or(self.src_name.len());
        core::str::from_utf8(&self.src_name[..end]).unwrap_or("?")
    }
}

/// A received event frame: decoded header plus the raw bytes it came from.
#[derive(Debug, Clone, Copy)]
pub struct EventFrame<'a> {
    pub header: EventHeader,
    bytes: &'a [u8],
}

impl<'a> EventFrame<'a> {
    /// Decode the fixed header.  Fails only if the frame is shorter than it.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let header = EventHeader::decode(bytes).ok_or(Error::MalformedFrame("short event header"))?;
        Ok(Self { header, bytes })
    }

    pub fn event_type(&self) -> u32 {
        self.header.event_type
    }

    pub fn status(&self) -> u32 {
        self.header.status
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload bytes, clipped to whichever is smaller of the declared and
    /// the actual length.
    pub fn payload(&self) -> &'a [u8] {
        let actual = self.bytes.len().saturating_sub(EventHeader::LEN);
        let n = actual.min(self.header.payload_len as usize);
        &self.bytes[EventHeader::LEN..EventHeader::LEN + n]
    }

    /// True when the header claims more payload than the frame carries.
    pub fn is_truncated(&self) -> bool {
        self.header.payload_len as usize > self.bytes.len().saturating_sub(EventHeader::LEN)
    }
}

/// Build a complete event frame.  Used by the simulator and tests.
pub fn build_event_frame(event_type: u32, status: u32, reason: u32, payload: &[u8]) -> Vec<u8> {
    let mut src_name = [0u8; 16];
    src_name[..3].copy_from_slice(b"wl0");
    let header = EventHeader {
        event_type,
        status,
        reason,
        payload_len: payload.len() as u32,
        src_name,
    };
    let mut out = vec![0u8; EventHeader::LEN + payload.len()];
    // Buffer is sized for the header above; encode cannot fail.
    let _ = header.encode(&mut out);
    out[EventHeader::LEN..].copy_from_slice(payload);
    out
}

// ───────────────────────────────────────────────────────────────
// Escan results
// ───────────────────────────────────────────────────────────────

/// Fixed escan result envelope preceding the BSS records.
pub const ESCAN_FIXED_LEN: usize = 12;

/// Packed BSS descriptor size up to and including `phy_noise`.
pub const BSS_INFO_FIXED_LEN: usize = 79;

mod bss_off {
    pub const LENGTH: usize = 4;
    pub const BSSID: usize = 8;
    pub const BEACON_PERIOD: usize = 14;
    pub const CAPABILITY: usize = 16;
    pub const SSID_LEN: usize = 18;
    pub const SSID: usize = 19;
    pub const CHANSPEC: usize = 71;
    pub const RSSI: usize = 76;
}

/// One discovered network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BssInfo {
    pub bssid: [u8; 6],
    pub ssid: HVec<u8, MAX_SSID_LEN>,
    pub beacon_period: u16,
    pub capability: u16,
    pub chanspec: u16,
    pub rssi: i16,
}

impl BssInfo {
    pub fn ssid_str(&self) -> &str {
        core::str::from_utf8(&self.ssid).unwrap_or("<non-utf8>")
    }

    /// Channel number carried in the low byte of the chanspec.
    pub fn channel(&self) -> u8 {
        (self.chanspec & 0xff) as u8
    }
}

/// Decoded escan result payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscanResult {
    pub sync_id: u16,
    pub records: Vec<BssInfo>,
}

/// Parse an escan result payload.
///
/// A payload that is exactly the fixed envelope carries no records and is
/// valid.  Records are walked while bytes remain and fewer than `bss_count`
/// have been read.
pub fn parse_escan(payload: &[u8]) -> Result<EscanResult> {
    if payload.len() < ESCAN_FIXED_LEN {
        return Err(Error::MalformedFrame("escan envelope too short"));
    }
    let buflen = read_u32(payload, 0).ok_or(Error::MalformedFrame("escan buflen"))? as usize;
    let sync_id = read_u16(payload, 8).ok_or(Error::MalformedFrame("escan sync id"))?;
    let bss_count = read_u16(payload, 10).ok_or(Error::MalformedFrame("escan bss count"))? as usize;

    if payload.len() == ESCAN_FIXED_LEN {
        return Ok(EscanResult { sync_id, records: Vec::new() });
    }
    if buflen < ESCAN_FIXED_LEN || buflen > payload.len() {
        return Err(Error::MalformedFrame("escan buflen disagrees with payload"));
    }

    let mut records = Vec::new();
    let mut rest = &payload[ESCAN_FIXED_LEN..buflen];
    while !rest.is_empty() && records.len() < bss_count {
        let len = read_u32(rest, bss_off::LENGTH).ok_or(Error::MalformedFrame("bss length"))? as usize;
        if len < BSS_INFO_FIXED_LEN || len > rest.len() {
            return Err(Error::MalformedFrame("bss record length"));
        }
        records.push(parse_bss(&rest[..len])?);
        rest = &rest[len..];
    }

    Ok(EscanResult { sync_id, records })
}

fn parse_bss(rec: &[u8]) -> Result<BssInfo> {
    let bad = || Error::MalformedFrame("bss record");

    let mut bssid = [0u8; 6];
    bssid.copy_from_slice(rec.get(bss_off::BSSID..bss_off::BSSID + 6).ok_or_else(bad)?);

    let ssid_len = usize::from(*rec.get(bss_off::SSID_LEN).ok_or_else(bad)?).min(MAX_SSID_LEN);
    let raw_ssid = rec.get(bss_off::SSID..bss_off::SSID + ssid_len).ok_or_else(bad)?;
    let ssid = HVec::from_slice(raw_ssid).map_err(|()| bad())?;

    Ok(BssInfo {
        bssid,
        ssid,
        beacon_period: read_u16(rec, bss_off::BEACON_PERIOD).ok_or_else(bad)?,
        capability: read_u16(rec, bss_off::CAPABILITY).ok_or_else(bad)?,
        chanspec: read_u16(rec, bss_off::CHANSPEC).ok_or_else(bad)?,
        rssi: read_i16(rec, bss_off::RSSI).ok_or_else(bad)?,
    })
}

/// Encode one BSS record in firmware layout.
pub fn encode_bss(bss: &BssInfo) -> Vec<u8> {
    let mut rec = vec![0u8; BSS_INFO_FIXED_LEN];
    rec[0..4].copy_from_slice(&109u32.to_le_bytes());
    rec[bss_off::LENGTH..bss_off::LENGTH + 4].copy_from_slice(&(BSS_INFO_FIXED_LEN as u32).to_le_bytes());
    rec[bss_off::BSSID..bss_off::BSSID + 6].copy_from_slice(&bss.bssid);
    rec[bss_off::BEACON_PERIOD..bss_off::BEACON_PERIOD + 2].copy_from_slice(&bss.beacon_period.to_le_bytes());
    rec[bss_off::CAPABILITY..bss_off::CAPABILITY + 2].copy_from_slice(&bss.capability.to_le_bytes());
    rec[bss_off::SSID_LEN] = bss.ssid.len() as u8;
    rec[bss_off::SSID..bss_off::SSID + bss.ssid.len()].copy_from_slice(&bss.ssid);
    rec[bss_off::CHANSPEC..bss_off::CHANSPEC + 2].copy_from_slice(&bss.chanspec.to_le_bytes());
    rec[bss_off::RSSI..bss_off::RSSI + 2].copy_from_slice(&bss.rssi.to_le_bytes());
    rec
}

/// Encode an escan result payload (envelope plus records).
pub fn encode_escan_result(sync_id: u16, records: &[BssInfo]) -> Vec<u8> {
    let body: Vec<u8> = records.iter().flat_map(encode_bss).collect();
    let buflen = ESCAN_FIXED_LEN + body.len();
    let mut out = Vec::with_capacity(buflen);
    out.extend_from_slice(&(buflen as u32).to_le_bytes());
    out.extend_from_slice(&ESCAN_RESULT_VERSION.to_le_bytes());
    out.extend_from_slice(&sync_id.to_le_bytes());
    out.extend_from_slice(&(records.len() as u16).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

const ESCAN_RESULT_VERSION: u32 = 109;
