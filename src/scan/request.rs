//! Escan request buffer.
//!
//! Packed layout (74 bytes, little-endian):
//! ```text
//!  0  version u32        = 1
//!  4  action u16         = start
//!  6  sync_id u16          echoed back in every result frame
//!  8  ssid_len u32       = 0 (any SSID)
//! 12  ssid [32]
//! 44  bssid [6]          = ff:ff:ff:ff:ff:ff
//! 50  bss_type u8        = any
//! 51  scan_type u8       = active / passive
//! 52  nprobes i32        = -1 (firmware default)
//! 56  active_time i32    = -1
//! 60  passive_time i32   = -1
//! 64  home_time i32      = -1
//! 68  channel_num u32    = 0 (all channels)
//! 72  channel_list [u16; 1]
//! ```

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ioctl::{DOT11_BSSTYPE_ANY, ESCAN_REQ_VERSION, SCAN_TYPE_ACTIVE, SCAN_TYPE_PASSIVE, WL_SCAN_ACTION_START};

pub const ESCAN_PARAMS_LEN: usize = 74;

const FIRMWARE_DEFAULT: i32 = -1;

/// Owner token for the in-flight scan command payload.
///
/// Cloning shares the bytes.  The transport borrows a clone for the duration
/// of the `escan` call, so a completion path dropping the stored token never
/// invalidates a buffer the transport is still reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest(Arc<Vec<u8>>);

impl ScanRequest {
    /// `OutOfMemory` if the payload buffer cannot be reserved.  The payload
    /// is moved into the shared token as is; only the small reference-count
    /// header is allocated infallibly.
    pub fn build(sync_id: u16, active: bool) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(ESCAN_PARAMS_LEN)
            .map_err(|_| Error::OutOfMemory)?;
        buf.resize(ESCAN_PARAMS_LEN, 0);

        buf[0..4].copy_from_slice(&ESCAN_REQ_VERSION.to_le_bytes());
        buf[4..6].copy_from_slice(&WL_SCAN_ACTION_START.to_le_bytes());
        buf[6..8].copy_from_slice(&sync_id.to_le_bytes());
        buf[44..50].fill(0xff);
        buf[50] = DOT11_BSSTYPE_ANY;
        buf[51] = if active { SCAN_TYPE_ACTIVE } else { SCAN_TYPE_PASSIVE };
        for off in [52, 56, 60, 64] {
            buf[off..off + 4].copy_from_slice(&FIRMWARE_DEFAULT.to_le_bytes());
        }

        Ok(Self(Arc::new(buf)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn sync_id(&self) -> u16 {
        u16::from_le_bytes([self.0[6], self.0[7]])
    }

    /// Number of live references to the buffer, including this one.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}
