//! Driver statistics and firmware identification.
//!
//! Counters are bumped from all three execution contexts (caller, event
//! pump, timer worker), so they are plain relaxed atomics.  A
//! [`StatsSnapshot`] is a consistent-enough copy for logging or export.

use core::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct DriverStats {
    events_dispatched: AtomicU32,
    events_unhandled: AtomicU32,
    malformed_frames: AtomicU32,
    handler_faults: AtomicU32,
    scans_started: AtomicU32,
    scans_completed: AtomicU32,
    scans_timed_out: AtomicU32,
    stale_scan_events: AtomicU32,
    auth_attempts: AtomicU32,
    auth_failures: AtomicU32,
}

/// Which counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    EventDispatched,
    EventUnhandled,
    MalformedFrame,
    HandlerFault,
    ScanStarted,
    ScanCompleted,
    ScanTimedOut,
    StaleScanEvent,
    AuthAttempt,
    AuthFailure,
}

impl DriverStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, stat: Stat) -> &AtomicU32 {
        match stat {
            Stat::EventDispatched => &self.events_dispatched,
            Stat::EventUnhandled => &self.events_unhandled,
            Stat::MalformedFrame => &self.malformed_frames,
            Stat::HandlerFault => &self.handler_faults,
            Stat::ScanStarted => &self.scans_started,
            Stat::ScanCompleted => &self.scans_completed,
            Stat::ScanTimedOut => &self.scans_timed_out,
            Stat::StaleScanEvent => &self.stale_scan_events,
            Stat::AuthAttempt => &self.auth_attempts,
            Stat::AuthFailure => &self.auth_failures,
        }
    }

    pub fn bump(&self, stat: Stat) {
        self.counter(stat).fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, stat: Stat) -> u32 {
        self.counter(stat).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_dispatched: self.get(Stat::EventDispatched),
            events_unhandled: self.get(Stat::EventUnhandled),
            malformed_frames: self.get(Stat::MalformedFrame),
            handler_faults: self.get(Stat::HandlerFault),
            scans_started: self.get(Stat::ScanStarted),
            scans_completed: self.get(Stat::ScanCompleted),
            scans_timed_out: self.get(Stat::ScanTimedOut),
            stale_scan_events: self.get(Stat::StaleScanEvent),
            auth_attempts: self.get(Stat::AuthAttempt),
            auth_failures: self.get(Stat::AuthFailure),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub events_dispatched: u32,
    pub events_unhandled: u32,
    pub malformed_frames: u32,
    pub handler_faults: u32,
    pub scans_started: u32,
    pub scans_completed: u32,
    pub scans_timed_out: u32,
    pub stale_scan_events: u32,
    pub auth_attempts: u32,
    pub auth_failures: u32,
}

/// Identification returned by firmware bring-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub version: heapless::String<64>,
}

impl FirmwareInfo {
    /// Build from the raw `ver` reply: NUL-terminated, newline-suffixed.
    /// Longer strings are cut at a character boundary.
    pub fn from_raw(raw: &[u8]) -> Self {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let text = String::from_utf8_lossy(&raw[..end]);
        let mut version = heapless::String::new();
        for c in text.trim_end_matches(['\n', '\r']).chars() {
            if version.push(c).is_err() {
                break;
            }
        }
        Self { version }
    }
}
