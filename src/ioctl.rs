//! Firmware constant catalog.
//!
//! Opcodes, iovar names, event identifiers and the numeric encodings the
//! firmware expects.  Meanings are opaque to the core; it only needs the
//! values to address commands and recognise events.

// ───────────────────────────────────────────────────────────────
// Fixed-opcode control operations
// ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Ioctl {
    Up = 2,
    Down = 3,
    SetInfra = 20,
    SetAuth = 22,
    SetSsid = 26,
    SetPassiveScan = 49,
    SetPm = 86,
    SetGmode = 110,
    SetWsec = 134,
    SetWpaAuth = 165,
    SetWsecPmk = 268,
}

impl Ioctl {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

// ───────────────────────────────────────────────────────────────
// Named control operations
// ───────────────────────────────────────────────────────────────

pub mod iovar {
    pub const TX_GLOM: &str = "bus:txglom";
    pub const ROAM_OFF: &str = "roam_off";
    pub const SUP_WPA2_EAPVER: &str = "bsscfg:sup_wpa2_eapver";
    pub const SUP_WPA: &str = "bsscfg:sup_wpa";
    pub const VERSION: &str = "ver";
    pub const EVENT_MSGS: &str = "event_msgs";
    pub const ESCAN: &str = "escan";
    pub const CUR_ETHERADDR: &str = "cur_etheraddr";
}

// ───────────────────────────────────────────────────────────────
// Asynchronous events
// ───────────────────────────────────────────────────────────────

/// Size of the firmware's event id space.  Ids at or above this are never
/// registered and always reach the default handler.
pub const EVENT_COUNT: u32 = 139;

/// Bytes needed for one bit per event id.
pub const EVENT_MASK_LEN: usize = (EVENT_COUNT as usize).div_ceil(8);

/// Event identifiers the driver registers handlers for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum EventType {
    SetSsid = 0,
    Join = 1,
    Auth = 3,
    DeauthInd = 6,
    Assoc = 7,
    Disassoc = 11,
    DisassocInd = 12,
    Link = 16,
    Radio = 40,
    PskSup = 46,
    EscanResult = 69,
    AssocIndNdis = 82,
}

impl EventType {
    pub const fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::SetSsid),
            1 => Some(Self::Join),
            3 => Some(Self::Auth),
            6 => Some(Self::DeauthInd),
            7 => Some(Self::Assoc),
            11 => Some(Self::Disassoc),
            12 => Some(Self::DisassocInd),
            16 => Some(Self::Link),
            40 => Some(Self::Radio),
            46 => Some(Self::PskSup),
            69 => Some(Self::EscanResult),
            82 => Some(Self::AssocIndNdis),
            _ => None,
        }
    }
}

/// Event status codes.
pub mod status {
    pub const SUCCESS: u32 = 0;
    pub const FAIL: u32 = 1;
    pub const TIMEOUT: u32 = 2;
    pub const NO_NETWORKS: u32 = 3;
    pub const ABORT: u32 = 4;
    /// More escan result frames follow for the same attempt.
    pub const PARTIAL: u32 = 8;
}

// ───────────────────────────────────────────────────────────────
// Firmware-side encodings
// ───────────────────────────────────────────────────────────────

pub const GMODE_AUTO: u32 = 1;

pub const WPA_AUTH_DISABLED: u32 = 0x0000;
pub const WPA_AUTH_PSK: u32 = 0x0004;
pub const WPA2_AUTH_PSK: u32 = 0x0080;

pub const WEP_ENABLED: u32 = 0x0001;
pub const TKIP_ENABLED: u32 = 0x0002;
pub const AES_ENABLED: u32 = 0x0004;

/// PMK buffer carries a passphrase rather than a derived key.
pub const WSEC_PASSPHRASE: u16 = 1;
pub const WSEC_MAX_PSK_LEN: usize = 64;

pub const MAX_SSID_LEN: usize = 32;

pub const ESCAN_REQ_VERSION: u32 = 1;
pub const WL_SCAN_ACTION_START: u16 = 1;
pub const DOT11_BSSTYPE_ANY: u8 = 2;
pub const SCAN_TYPE_ACTIVE: u8 = 0;
pub const SCAN_TYPE_PASSIVE: u8 = 1;

// ───────────────────────────────────────────────────────────────
// Wireless-extension request codes (caller side)
// ───────────────────────────────────────────────────────────────

/// Codes callers use in configuration requests.  Translated into the
/// firmware encodings above by the auth workflow.
pub mod iw {
    pub const AUTH_INDEX: u32 = 0x0FFF;

    pub const AUTH_WPA_VERSION: u32 = 0;
    pub const AUTH_CIPHER_PAIRWISE: u32 = 1;
    pub const AUTH_CIPHER_GROUP: u32 = 2;
    pub const AUTH_KEY_MGMT: u32 = 3;
    pub const AUTH_TKIP_COUNTERMEASURES: u32 = 4;
    pub const AUTH_DROP_UNENCRYPTED: u32 = 5;
    pub const AUTH_80211_AUTH_ALG: u32 = 6;
    pub const AUTH_WPA_ENABLED: u32 = 7;
    pub const AUTH_RX_UNENCRYPTED_EAPOL: u32 = 8;
    pub const AUTH_ROAMING_CONTROL: u32 = 9;
    pub const AUTH_PRIVACY_INVOKED: u32 = 10;

    pub const AUTH_WPA_VERSION_DISABLED: u32 = 0x0000_0001;
    pub const AUTH_WPA_VERSION_WPA: u32 = 0x0000_0002;
    pub const AUTH_WPA_VERSION_WPA2: u32 = 0x0000_0004;

    pub const AUTH_CIPHER_NONE: u32 = 0x0000_0001;
    pub const AUTH_CIPHER_WEP40: u32 = 0x0000_0002;
    pub const AUTH_CIPHER_TKIP: u32 = 0x0000_0004;
    pub const AUTH_CIPHER_CCMP: u32 = 0x0000_0008;
    pub const AUTH_CIPHER_WEP104: u32 = 0x0000_0010;

    pub const MODE_AUTO: u32 = 0;
    pub const MODE_ADHOC: u32 = 1;
    pub const MODE_INFRA: u32 = 2;

    pub const ENCODE_ALG_NONE: u16 = 0;
    pub const ENCODE_ALG_WEP: u16 = 1;
    pub const ENCODE_ALG_TKIP: u16 = 2;
    pub const ENCODE_ALG_CCMP: u16 = 3;
}
