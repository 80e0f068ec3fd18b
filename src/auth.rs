//! Association and authentication workflow.
//!
//! Each configuration step is one blocking request: resolve the interface,
//! translate the caller's wireless-extension code into the firmware
//! encoding, issue the command(s).  Only the SSID commit waits on an
//! asynchronous outcome, delivered by [`handle_auth_event`] through the
//! auth completion.
//!
//! Translation happens before any command is sent, so an unknown value
//! never leaves partial configuration in firmware.  An I/O failure part way
//! through a multi-command step is not rolled back.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::EventFrame;
use crate::ioctl::{
    AES_ENABLED, EventType, Ioctl, MAX_SSID_LEN, TKIP_ENABLED, WEP_ENABLED, WPA_AUTH_DISABLED,
    WPA_AUTH_PSK, WPA2_AUTH_PSK, WSEC_MAX_PSK_LEN, WSEC_PASSPHRASE, iovar, iw, status,
};
use crate::sync::Completion;
use crate::transport::{ControlTransport, Interface};

// ───────────────────────────────────────────────────────────────
// Caller requests
// ───────────────────────────────────────────────────────────────

/// Set one authentication parameter.  `flags & iw::AUTH_INDEX` selects it.
#[derive(Debug, Clone, Copy)]
pub struct AuthParamRequest<'a> {
    pub ifname: &'a str,
    pub flags: u32,
    pub value: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ModeRequest<'a> {
    pub ifname: &'a str,
    pub mode: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct EncodeExtRequest<'a> {
    pub ifname: &'a str,
    pub alg: u16,
    pub key: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct SsidRequest<'a> {
    pub ifname: &'a str,
    pub ssid: &'a [u8],
}

/// Map a request's interface name to a firmware interface.
///
/// Only the station interface exists, so every name resolves to it.
pub fn resolve_interface(_ifname: &str) -> Interface {
    Interface::STA
}

// ───────────────────────────────────────────────────────────────
// Translation tables
// ───────────────────────────────────────────────────────────────

/// WPA version → (`sup_wpa` value, WPA auth mode).
const WPA_VERSION_TABLE: &[(u32, u32, u32)] = &[
    (iw::AUTH_WPA_VERSION_DISABLED, 0, WPA_AUTH_DISABLED),
    (iw::AUTH_WPA_VERSION_WPA, 1, WPA_AUTH_PSK),
    (iw::AUTH_WPA_VERSION_WPA2, 1, WPA2_AUTH_PSK),
];

/// Cipher → (wsec bits, 802.11 auth: 0 open, 1 shared key).
const CIPHER_TABLE: &[(u32, u32, u32)] = &[
    (iw::AUTH_CIPHER_WEP40, WEP_ENABLED, 1),
    (iw::AUTH_CIPHER_WEP104, WEP_ENABLED, 1),
    (iw::AUTH_CIPHER_TKIP, TKIP_ENABLED, 0),
    (iw::AUTH_CIPHER_CCMP, AES_ENABLED, 0),
];

fn lookup(table: &[(u32, u32, u32)], value: u32) -> Option<(u32, u32)> {
    table
        .iter()
        .find(|(k, _, _)| *k == value)
        .map(|&(_, a, b)| (a, b))
}

pub fn wpa_version_encoding(value: u32) -> Result<(u32, u32)> {
    lookup(WPA_VERSION_TABLE, value).ok_or(Error::InvalidArgument("wpa version"))
}

pub fn cipher_encoding(value: u32) -> Result<(u32, u32)> {
    lookup(CIPHER_TABLE, value).ok_or(Error::InvalidArgument("cipher"))
}

// ───────────────────────────────────────────────────────────────
// Configuration steps
// ───────────────────────────────────────────────────────────────

fn set_u32<T: ControlTransport>(t: &T, iface: Interface, op: Ioctl, value: u32) -> Result<()> {
    let mut buf = value.to_le_bytes();
    t.ioctl(iface, true, op.code(), &mut buf)?;
    Ok(())
}

pub fn set_auth_param<T: ControlTransport>(t: &T, req: &AuthParamRequest<'_>) -> Result<()> {
    let iface = resolve_interface(req.ifname);
    let index = req.flags & iw::AUTH_INDEX;

    match index {
        iw::AUTH_WPA_VERSION => {
            let (sup_wpa, auth_mode) = wpa_version_encoding(req.value)?;
            let mut buf = [0u8; 8];
            buf[0..4].copy_from_slice(&iface.index().to_le_bytes());
            buf[4..8].copy_from_slice(&sup_wpa.to_le_bytes());
            t.iovar(iface, true, iovar::SUP_WPA, &mut buf)?;
            set_u32(t, iface, Ioctl::SetWpaAuth, auth_mode)?;
            debug!("auth: wpa version {:#x} -> sup_wpa={sup_wpa} mode={auth_mode:#x}", req.value);
            Ok(())
        }
        iw::AUTH_CIPHER_PAIRWISE | iw::AUTH_CIPHER_GROUP => {
            let (wsec, wep_auth) = cipher_encoding(req.value)?;
            set_u32(t, iface, Ioctl::SetWsec, wsec)?;
            set_u32(t, iface, Ioctl::SetAuth, wep_auth)?;
            debug!("auth: cipher {:#x} -> wsec={wsec:#x} auth={wep_auth}", req.value);
            Ok(())
        }
        _ => {
            warn!("auth: unsupported auth parameter {index} (flags={:#x})", req.flags);
            Err(Error::NotSupported(index))
        }
    }
}

pub fn set_mode<T: ControlTransport>(t: &T, req: &ModeRequest<'_>) -> Result<()> {
    let iface = resolve_interface(req.ifname);
    let infra = u32::from(req.mode == iw::MODE_INFRA);
    set_u32(t, iface, Ioctl::SetInfra, infra)
}

/// PMK request body: `{key_len u16, flags u16, key[64]}`.
pub const PMK_LEN: usize = 4 + WSEC_MAX_PSK_LEN;

pub fn set_encryption_key<T: ControlTransport>(t: &T, req: &EncodeExtRequest<'_>) -> Result<()> {
    let iface = resolve_interface(req.ifname);
    match req.alg {
        iw::ENCODE_ALG_TKIP | iw::ENCODE_ALG_CCMP => {}
        other => {
            warn!("auth: unknown key algorithm {other}");
            return Err(Error::InvalidArgument("key algorithm"));
        }
    }
    if req.key.len() > WSEC_MAX_PSK_LEN {
        return Err(Error::InvalidArgument("key too long"));
    }

    let mut pmk = [0u8; PMK_LEN];
    pmk[0..2].copy_from_slice(&(req.key.len() as u16).to_le_bytes());
    pmk[2..4].copy_from_slice(&WSEC_PASSPHRASE.to_le_bytes());
    pmk[4..4 + req.key.len()].copy_from_slice(req.key);
    t.ioctl(iface, true, Ioctl::SetWsecPmk.code(), &mut pmk)?;
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// SSID commit
// ───────────────────────────────────────────────────────────────

/// Join outcome shared between the SSID commit and the auth handler.
pub struct AuthState {
    signal: Completion,
    status: AtomicU32,
}

impl AuthState {
    pub const fn new() -> Self {
        Self {
            signal: Completion::new(),
            status: AtomicU32::new(status::SUCCESS),
        }
    }

    /// Status of the last concluded join.
    pub fn status(&self) -> u32 {
        self.status.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> u32 {
        self.signal.pending()
    }

    fn conclude(&self, fw_status: u32) {
        self.status.store(fw_status, Ordering::Release);
        self.signal.post();
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

/// `{SSID_len u32, SSID[32]}`.
pub const SSID_PARAM_LEN: usize = 4 + MAX_SSID_LEN;

pub fn set_ssid<T: ControlTransport>(
    t: &T,
    state: &AuthState,
    req: &SsidRequest<'_>,
    timeout: Duration,
) -> Result<()> {
    let iface = resolve_interface(req.ifname);
    if req.ssid.len() > MAX_SSID_LEN {
        return Err(Error::InvalidArgument("ssid longer than 32 bytes"));
    }

    let mut param = [0u8; SSID_PARAM_LEN];
    param[0..4].copy_from_slice(&(req.ssid.len() as u32).to_le_bytes());
    param[4..4 + req.ssid.len()].copy_from_slice(req.ssid);

    let stale = state.signal.drain();
    if stale > 0 {
        debug!("auth: dropped {stale} stale join signal(s)");
    }
    t.ioctl(iface, true, Ioctl::SetSsid.code(), &mut param)?;

    if !state.signal.wait_timeout(timeout) {
        warn!("auth: join timed out after {} ms", timeout.as_millis());
        return Err(Error::InvalidState("association wait expired"));
    }

    match state.status() {
        status::SUCCESS => {
            info!("auth: joined {}", String::from_utf8_lossy(req.ssid));
            Ok(())
        }
        code => {
            warn!("auth: join failed, status {code}");
            Err(Error::AssociationFailed(code))
        }
    }
}

/// Event types the auth handler observes.
pub const AUTH_EVENTS: &[EventType] = &[
    EventType::AssocIndNdis,
    EventType::Auth,
    EventType::Assoc,
    EventType::Link,
    EventType::PskSup,
    EventType::Join,
    EventType::SetSsid,
    EventType::DeauthInd,
    EventType::Disassoc,
    EventType::DisassocInd,
];

/// Auth-side event handling.  Returns `true` if the frame concluded a join.
///
/// A SET_SSID event concludes the join whatever its status; the waiter in
/// [`set_ssid`] turns a non-success status into `AssociationFailed`.
pub fn handle_auth_event(state: &AuthState, frame: &EventFrame<'_>) -> bool {
    let h = &frame.header;
    if EventType::from_id(h.event_type) == Some(EventType::SetSsid) {
        debug!("auth: set_ssid event status={} reason={}", h.status, h.reason);
        state.conclude(h.status);
        return true;
    }
    info!(
        "auth: event {} status={} reason={} from {}",
        h.event_type,
        h.status,
        h.reason,
        h.src_name_str()
    );
    false
}
