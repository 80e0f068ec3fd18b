//! Driver configuration parameters
//!
//! All tunables for one adapter instance.  Defaults match the firmware's
//! expected behaviour; overrides come from a JSON document.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    // --- Scan ---
    /// Scan timeout, armed when the escan request is accepted
    pub scan_timeout_ms: u32,
    /// Correlation id echoed back in every escan result frame
    pub scan_sync_id: u16,
    /// Active (probe) scan; passive listens for beacons only
    pub active_scan: bool,

    // --- Association ---
    /// Bounded wait for the SET_SSID completion event
    pub auth_timeout_ms: u32,

    // --- Bring-up ---
    /// Power-management mode passed to SET_PM
    pub pm_mode: u32,
    /// Disable firmware roaming
    pub roam_off: bool,
    /// Bus TX glomming
    pub tx_glom: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            // Scan
            scan_timeout_ms: 5000,
            scan_sync_id: 0xabcd,
            active_scan: true,

            // Association
            auth_timeout_ms: 10_000,

            // Bring-up
            pm_mode: 0,
            roam_off: true,
            tx_glom: false,
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scan_timeout_ms == 0 {
            return Err(Error::InvalidArgument("scan_timeout_ms must be non-zero"));
        }
        if self.auth_timeout_ms == 0 {
            return Err(Error::InvalidArgument("auth_timeout_ms must be non-zero"));
        }
        Ok(())
    }

    /// Parse a JSON override document.  Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| Error::InvalidArgument("config json"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.scan_timeout_ms))
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.auth_timeout_ms))
    }
}
