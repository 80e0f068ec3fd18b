//! Device context: one per adapter, owning every workflow's shared state.
//!
//! ```text
//!   caller threads              event pump               timer worker
//!        │                          │                          │
//!        ▼                          ▼                          ▼
//! ┌──────────────┐        ┌───────────────────┐      ┌──────────────────┐
//! │ Device<T>    │        │ EventDispatcher   │      │ on_timeout(token)│
//! │  start_scan  │        │  escan / auth /   │      └────────┬─────────┘
//! │  set_ssid .. │        │  radio / default  │               │
//! └──────┬───────┘        └─────────┬─────────┘               │
//!        │       ┌──────────────────┴─────────────────────────┘
//!        ▼       ▼
//!   ┌─────────────────────────────────────────────┐
//!   │ DeviceState: ScanMachine │ AuthState │ stats │
//!   └─────────────────────────────────────────────┘
//! ```
//!
//! Handlers receive `&DeviceState` only; they cannot reach the transport,
//! so the event path never issues commands.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, info, warn};

use crate::auth::{
    self, AUTH_EVENTS, AuthParamRequest, AuthState, EncodeExtRequest, ModeRequest, SsidRequest,
};
use crate::config::DriverConfig;
use crate::diagnostics::{DriverStats, FirmwareInfo, Stat, StatsSnapshot};
use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::error::{Error, Result};
use crate::frame::{BssInfo, EventFrame};
use crate::ioctl::{EVENT_MASK_LEN, EventType, GMODE_AUTO, Ioctl, iovar};
use crate::scan::{ResultDisposition, ScanMachine, ScanState};
use crate::sync::{TimerHandle, TimerWorker, lock};
use crate::transport::{ControlTransport, Interface};

/// Size of the `ver` reply buffer.
const VERSION_BUF_LEN: usize = 128;

// ───────────────────────────────────────────────────────────────
// Shared state
// ───────────────────────────────────────────────────────────────

/// State touched from more than one execution context.
pub struct DeviceState {
    scan: ScanMachine,
    auth: AuthState,
    stats: DriverStats,
}

impl DeviceState {
    fn new(timer: TimerHandle, scan_timeout: Duration) -> Self {
        Self {
            scan: ScanMachine::new(timer, scan_timeout),
            auth: AuthState::new(),
            stats: DriverStats::new(),
        }
    }

    fn on_scan_timeout(&self, attempt: u64) {
        if self.scan.on_timeout(attempt) {
            self.stats.bump(Stat::ScanTimedOut);
        }
    }
}

// ── Event handlers ───────────────────────────────────────────

fn escan_handler(st: &DeviceState, frame: &EventFrame<'_>) {
    if frame.is_truncated() {
        debug!(
            "event: escan frame declares {} payload bytes, carries {}",
            frame.header.payload_len,
            frame.payload().len()
        );
    }
    match st.scan.on_result(frame.status(), frame.payload()) {
        ResultDisposition::Completed(_) => st.stats.bump(Stat::ScanCompleted),
        ResultDisposition::Malformed => st.stats.bump(Stat::MalformedFrame),
        ResultDisposition::Stale | ResultDisposition::AlreadyResolved => {
            st.stats.bump(Stat::StaleScanEvent);
        }
        ResultDisposition::Partial(_) => {}
    }
}

fn auth_handler(st: &DeviceState, frame: &EventFrame<'_>) {
    auth::handle_auth_event(&st.auth, frame);
}

/// Radio state changes are explicitly ignored.
fn radio_handler(_st: &DeviceState, _frame: &EventFrame<'_>) {}

fn default_handler(st: &DeviceState, frame: &EventFrame<'_>) {
    st.stats.bump(Stat::EventUnhandled);
    debug!(
        "event: unhandled type {} status={} len={}",
        frame.event_type(),
        frame.status(),
        frame.len()
    );
}

fn build_dispatcher() -> Result<EventDispatcher<DeviceState>> {
    let mut d = EventDispatcher::new(default_handler);
    d.register(EventType::Radio.id(), radio_handler)?;
    d.register(EventType::EscanResult.id(), escan_handler)?;
    for ev in AUTH_EVENTS {
        d.register(ev.id(), auth_handler)?;
    }
    Ok(d)
}

// ───────────────────────────────────────────────────────────────
// Device
// ───────────────────────────────────────────────────────────────

/// Handle the surrounding driver registers with its network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetifHandle {
    pub iface: Interface,
    pub mac: Option<[u8; 6]>,
}

pub struct Device<T: ControlTransport> {
    transport: T,
    config: DriverConfig,
    state: Arc<DeviceState>,
    dispatcher: EventDispatcher<DeviceState>,
    mac: Mutex<Option<[u8; 6]>>,
    timer: Option<TimerWorker>,
}

impl<T: ControlTransport> Device<T> {
    /// Build the context.  Nothing is sent to firmware until [`initialize`].
    ///
    /// [`initialize`]: Self::initialize
    pub fn new(transport: T, config: DriverConfig) -> Result<Self> {
        config.validate()?;

        let timer = TimerHandle::new();
        let state = Arc::new(DeviceState::new(timer.clone(), config.scan_timeout()));
        let dispatcher = build_dispatcher()?;

        let weak: Weak<DeviceState> = Arc::downgrade(&state);
        let worker = TimerWorker::spawn("bcmf-scan-timer", timer, move |attempt| {
            if let Some(st) = weak.upgrade() {
                st.on_scan_timeout(attempt);
            }
        })
        .map_err(|e| {
            warn!("bcmf: timer worker spawn failed: {e}");
            Error::OutOfMemory
        })?;

        Ok(Self {
            transport,
            config,
            state,
            dispatcher,
            mac: Mutex::new(None),
            timer: Some(worker),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn set_u32(&self, op: Ioctl, value: u32) -> Result<()> {
        let mut buf = value.to_le_bytes();
        self.transport.ioctl(Interface::STA, true, op.code(), &mut buf)?;
        Ok(())
    }

    fn set_iovar_u32(&self, name: &str, value: u32) -> Result<()> {
        let mut buf = value.to_le_bytes();
        self.transport.iovar(Interface::STA, true, name, &mut buf)?;
        Ok(())
    }

    // ── Bring-up ─────────────────────────────────────────────────

    /// Firmware bring-up: bus, power and roaming knobs, version query, and
    /// the event mask for every registered handler.
    pub fn initialize(&self) -> Result<FirmwareInfo> {
        let iface = Interface::STA;

        self.set_iovar_u32(iovar::TX_GLOM, u32::from(self.config.tx_glom))?;
        self.set_u32(Ioctl::SetPm, self.config.pm_mode)?;
        self.set_u32(Ioctl::SetGmode, GMODE_AUTO)?;

        if let Err(e) = self.set_iovar_u32(iovar::ROAM_OFF, u32::from(self.config.roam_off)) {
            warn!("bcmf: roam_off not applied: {e}");
        }

        let mut eapver = [0u8; 8];
        eapver[0..4].copy_from_slice(&iface.index().to_le_bytes());
        eapver[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        self.transport.iovar(iface, true, iovar::SUP_WPA2_EAPVER, &mut eapver)?;

        let mut ver = [0u8; VERSION_BUF_LEN];
        self.transport.iovar(iface, false, iovar::VERSION, &mut ver)?;
        let info = FirmwareInfo::from_raw(&ver);
        info!("bcmf: firmware <{}>", info.version);

        let mut mask = self.dispatcher.event_mask();
        self.transport.iovar(iface, true, iovar::EVENT_MSGS, &mut mask)?;
        debug!("bcmf: event mask pushed ({EVENT_MASK_LEN} bytes)");

        Ok(info)
    }

    pub fn event_mask(&self) -> [u8; EVENT_MASK_LEN] {
        self.dispatcher.event_mask()
    }

    pub fn enable(&self, on: bool) -> Result<()> {
        let op = if on { Ioctl::Up } else { Ioctl::Down };
        self.transport.ioctl(Interface::STA, true, op.code(), &mut [])?;
        info!("bcmf: interface {}", if on { "up" } else { "down" });
        Ok(())
    }

    pub fn set_mac_address(&self, mac: [u8; 6]) -> Result<()> {
        let mut buf = mac;
        self.transport.iovar(Interface::STA, true, iovar::CUR_ETHERADDR, &mut buf)?;
        *lock(&self.mac) = Some(mac);
        info!(
            "bcmf: MAC address updated {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        );
        Ok(())
    }

    /// Read the station MAC from firmware and remember it.
    pub fn read_mac_address(&self) -> Result<[u8; 6]> {
        let mut buf = [0u8; 6];
        self.transport.iovar(Interface::STA, false, iovar::CUR_ETHERADDR, &mut buf)?;
        *lock(&self.mac) = Some(buf);
        Ok(buf)
    }

    pub fn mac_address(&self) -> Option<[u8; 6]> {
        *lock(&self.mac)
    }

    pub fn netif(&self) -> NetifHandle {
        NetifHandle {
            iface: Interface::STA,
            mac: self.mac_address(),
        }
    }

    // ── Scan ─────────────────────────────────────────────────────

    /// Start an escan.  Returns the attempt number once firmware accepted
    /// the request; results arrive through [`handle_event`](Self::handle_event).
    pub fn start_scan(&self) -> Result<u64> {
        let scan = &self.state.scan;
        scan.check_idle()?;

        let passive = u32::from(!self.config.active_scan);
        self.set_u32(Ioctl::SetPassiveScan, passive)?;

        let (attempt, request) = scan.begin(self.config.scan_sync_id, self.config.active_scan)?;
        self.state.stats.bump(Stat::ScanStarted);

        if let Err(e) = self
            .transport
            .iovar_unsafe(Interface::STA, iovar::ESCAN, request.as_bytes())
        {
            warn!("scan: escan request failed: {e}");
            scan.abort_issue(attempt);
            return Err(e.into());
        }
        drop(request);

        scan.arm_timeout(attempt);
        Ok(attempt)
    }

    pub fn is_scan_done(&self) -> Result<()> {
        self.state.scan.is_done()
    }

    /// Bounded wait for `attempt` to resolve.
    pub fn wait_scan(&self, attempt: u64, timeout: Duration) -> Result<()> {
        self.state.scan.wait(attempt, timeout)
    }

    /// Start, then wait up to `timeout` for the outcome.
    pub fn scan(&self, timeout: Duration) -> Result<Vec<BssInfo>> {
        let attempt = self.start_scan()?;
        self.wait_scan(attempt, timeout)?;
        Ok(self.scan_results())
    }

    pub fn scan_results(&self) -> Vec<BssInfo> {
        self.state.scan.results()
    }

    pub fn last_scan_status(&self) -> Option<u32> {
        self.state.scan.last_status()
    }

    pub fn scan_state(&self) -> ScanState {
        self.state.scan.state()
    }

    pub fn has_pending_scan_request(&self) -> bool {
        self.state.scan.has_pending_request()
    }

    pub fn scan_gate_permits(&self) -> u32 {
        self.state.scan.gate_permits()
    }

    // ── Association ──────────────────────────────────────────────

    pub fn set_auth_param(&self, req: &AuthParamRequest<'_>) -> Result<()> {
        auth::set_auth_param(&self.transport, req)
    }

    pub fn set_mode(&self, req: &ModeRequest<'_>) -> Result<()> {
        auth::set_mode(&self.transport, req)
    }

    pub fn set_encryption_key(&self, req: &EncodeExtRequest<'_>) -> Result<()> {
        auth::set_encryption_key(&self.transport, req)
    }

    pub fn set_ssid(&self, req: &SsidRequest<'_>) -> Result<()> {
        self.state.stats.bump(Stat::AuthAttempt);
        let r = auth::set_ssid(&self.transport, &self.state.auth, req, self.config.auth_timeout());
        if matches!(r, Err(Error::AssociationFailed(_) | Error::InvalidState(_))) {
            self.state.stats.bump(Stat::AuthFailure);
        }
        r
    }

    pub fn auth_status(&self) -> u32 {
        self.state.auth.status()
    }

    // ── Event delivery ───────────────────────────────────────────

    /// Entry point for the event-delivery context.  Never fails.
    pub fn handle_event(&self, bytes: &[u8]) -> DispatchOutcome {
        let outcome = self.dispatcher.dispatch(&self.state, bytes);
        match outcome {
            DispatchOutcome::Handled(_) | DispatchOutcome::Default => {
                self.state.stats.bump(Stat::EventDispatched);
            }
            DispatchOutcome::Malformed => self.state.stats.bump(Stat::MalformedFrame),
            DispatchOutcome::HandlerFaulted => self.state.stats.bump(Stat::HandlerFault),
        }
        outcome
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.state.stats.snapshot()
    }
}

impl<T: ControlTransport + 'static> Device<T> {
    /// Frame sink for an [`EventPump`](crate::events::EventPump).
    pub fn event_sink(self: &Arc<Self>) -> impl FnMut(&[u8]) + Send + 'static {
        let dev = Arc::clone(self);
        move |frame| {
            dev.handle_event(frame);
        }
    }
}

impl<T: ControlTransport> Drop for Device<T> {
    fn drop(&mut self) {
        // Stop the timer first so it cannot race the release below.
        drop(self.timer.take());
        if self.state.scan.release_pending() {
            info!("bcmf: released pending scan request at teardown");
        }
    }
}
