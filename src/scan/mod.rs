//! Scan workflow state machine.
//!
//! ```text
//!            start                 terminal result
//! Disabled ────────▶ Running ─────────────────────▶ Done
//!    ▲                  │                             │
//!    │                  │ timer fires                 │
//!    │                  ▼                             │
//!    │              TimedOut                          │
//!    └──────────────────┴──── next start ◀────────────┘
//! ```
//!
//! Three parties touch an attempt: the foreground caller (start, wait,
//! read), the event-delivery context (result frames) and the timer worker
//! (expiry).  Every transition into a terminal state happens under the
//! single `slot` lock together with the owner-token check, the gate
//! release and the completion post, so exactly one of the two completion
//! paths wins and the other becomes a no-op.
//!
//! Waiters are keyed on the attempt number `begin` hands out.  Once the
//! gate is released another caller may open the next attempt before the
//! first waiter runs; the outcome of the attempt it replaced is kept so
//! that waiter still reads its own result.

pub mod request;

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::frame::{BssInfo, parse_escan};
use crate::ioctl::status;
use crate::sync::{Completion, Gate, TimerHandle, lock};

pub use request::ScanRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanState {
    Disabled,
    Running,
    Done,
    TimedOut,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::TimedOut)
    }
}

/// What a result frame did to the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultDisposition {
    /// No attempt was running; the frame was dropped.
    Stale,
    /// Lengths disagreed; nothing was committed.
    Malformed,
    /// More frames to come.  Records appended.
    Partial(usize),
    /// The attempt completed with this firmware status.
    Completed(u32),
    /// Terminal frame for an attempt whose token was already consumed.
    AlreadyResolved,
}

struct ScanSlot {
    state: ScanState,
    request: Option<ScanRequest>,
    attempt: u64,
    results: Vec<BssInfo>,
    last_status: Option<u32>,
    /// Final state of the attempt replaced by the last `begin`.
    previous: Option<(u64, ScanState)>,
}

pub struct ScanMachine {
    slot: Mutex<ScanSlot>,
    settled: Condvar,
    gate: Gate,
    done: Completion,
    timer: TimerHandle,
    timeout: Duration,
}

impl ScanMachine {
    pub fn new(timer: TimerHandle, timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(ScanSlot {
                state: ScanState::Disabled,
                request: None,
                attempt: 0,
                results: Vec::new(),
                last_status: None,
                previous: None,
            }),
            settled: Condvar::new(),
            gate: Gate::new(),
            done: Completion::new(),
            timer,
            timeout,
        }
    }

    pub fn state(&self) -> ScanState {
        lock(&self.slot).state
    }

    pub fn has_pending_request(&self) -> bool {
        lock(&self.slot).request.is_some()
    }

    /// `Busy` while an attempt is running.
    pub fn check_idle(&self) -> Result<()> {
        if lock(&self.slot).state == ScanState::Running {
            Err(Error::Busy)
        } else {
            Ok(())
        }
    }

    // ── Start ────────────────────────────────────────────────────

    /// Take the gate and open a new attempt.
    ///
    /// Returns the attempt number and a clone of the request token for the
    /// caller to hand to the transport without holding the slot lock.
    pub fn begin(&self, sync_id: u16, active: bool) -> Result<(u64, ScanRequest)> {
        self.gate.acquire();

        let request = match ScanRequest::build(sync_id, active) {
            Ok(r) => r,
            Err(e) => {
                self.gate.release();
                return Err(e);
            }
        };

        let mut slot = lock(&self.slot);
        if slot.attempt != 0 {
            slot.previous = Some((slot.attempt, slot.state));
        }
        let stale = self.done.drain();
        if stale > 0 {
            debug!("scan: dropped {stale} stale completion post(s)");
        }
        slot.results.clear();
        slot.last_status = None;
        slot.attempt = slot.attempt.wrapping_add(1);
        slot.state = ScanState::Running;
        slot.request = Some(request.clone());
        let attempt = slot.attempt;
        drop(slot);

        info!("scan: attempt {attempt} running (sync_id={sync_id:#06x})");
        Ok((attempt, request))
    }

    /// Undo `begin` after the escan command failed to issue.
    pub fn abort_issue(&self, attempt: u64) -> bool {
        let mut slot = lock(&self.slot);
        if slot.attempt != attempt || slot.state != ScanState::Running {
            return false;
        }
        slot.request = None;
        slot.state = ScanState::Disabled;
        self.gate.release();
        self.settled.notify_all();
        true
    }

    /// Arm the timeout for `attempt` if it is still running.
    pub fn arm_timeout(&self, attempt: u64) -> bool {
        let slot = lock(&self.slot);
        if slot.attempt != attempt || slot.state != ScanState::Running {
            return false;
        }
        self.timer.arm(self.timeout, attempt);
        true
    }

    // ── Completion paths ─────────────────────────────────────────

    /// Handle one escan result payload.
    pub fn on_result(&self, fw_status: u32, payload: &[u8]) -> ResultDisposition {
        let mut slot = lock(&self.slot);
        if slot.state != ScanState::Running {
            warn!("scan: result (status={fw_status}) while {:?}, ignored", slot.state);
            return ResultDisposition::Stale;
        }

        let parsed = match parse_escan(payload) {
            Ok(p) => p,
            Err(e) => {
                warn!("scan: dropped result frame: {e}");
                return ResultDisposition::Malformed;
            }
        };
        let added = parsed.records.len();
        slot.results.extend(parsed.records);

        if fw_status == status::PARTIAL {
            debug!("scan: partial frame, {added} record(s)");
            return ResultDisposition::Partial(added);
        }

        self.timer.cancel();
        if slot.request.take().is_none() {
            return ResultDisposition::AlreadyResolved;
        }
        slot.state = ScanState::Done;
        slot.last_status = Some(fw_status);
        self.gate.release();
        self.done.post();
        self.settled.notify_all();
        info!(
            "scan: attempt {} done, status={fw_status}, {} network(s)",
            slot.attempt,
            slot.results.len()
        );
        ResultDisposition::Completed(fw_status)
    }

    /// Timer expiry for `attempt`.  Returns `true` if it resolved the attempt.
    pub fn on_timeout(&self, attempt: u64) -> bool {
        let mut slot = lock(&self.slot);
        if slot.attempt != attempt {
            debug!("scan: timer for attempt {attempt} fired during attempt {}", slot.attempt);
            return false;
        }
        if slot.state != ScanState::Running {
            warn!("scan: timer fired while {:?}; should have been cancelled", slot.state);
            return false;
        }
        slot.state = ScanState::TimedOut;
        slot.request = None;
        self.gate.release();
        self.done.post();
        self.settled.notify_all();
        warn!("scan: attempt {attempt} timed out");
        true
    }

    // ── Foreground read side ─────────────────────────────────────

    pub fn is_done(&self) -> Result<()> {
        match lock(&self.slot).state {
            ScanState::Disabled => Err(Error::InvalidState("no scan started")),
            other => outcome(other),
        }
    }

    /// Block up to `timeout` until `attempt` leaves Running, then report how
    /// it ended.  Consumes that attempt's completion post if still queued.
    pub fn wait(&self, attempt: u64, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut slot = lock(&self.slot);
        while slot.attempt == attempt && slot.state == ScanState::Running {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::InvalidState("scan wait expired"));
            }
            let (guard, _) = self
                .settled
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            slot = guard;
        }

        if slot.attempt == attempt {
            self.done.try_wait();
            return outcome(slot.state);
        }
        match slot.previous {
            Some((prev, state)) if prev == attempt => {
                debug!("scan: attempt {attempt} already replaced by {}", slot.attempt);
                outcome(state)
            }
            _ => Err(Error::InvalidState("scan attempt not current")),
        }
    }

    pub fn results(&self) -> Vec<BssInfo> {
        lock(&self.slot).results.clone()
    }

    pub fn last_status(&self) -> Option<u32> {
        lock(&self.slot).last_status
    }

    /// Drop a still-pending request without assuming the attempt ended
    /// cleanly.  Used at teardown.
    pub fn release_pending(&self) -> bool {
        self.timer.cancel();
        let mut slot = lock(&self.slot);
        let had = slot.request.take().is_some();
        if had {
            slot.state = ScanState::Disabled;
            self.gate.release();
            self.settled.notify_all();
        }
        had
    }

    pub fn gate_permits(&self) -> u32 {
        self.gate.available()
    }

    pub fn pending_completions(&self) -> u32 {
        self.done.pending()
    }
}

fn outcome(state: ScanState) -> Result<()> {
    match state {
        ScanState::Running => Err(Error::Retry),
        ScanState::Done => Ok(()),
        ScanState::Disabled => Err(Error::InvalidState("scan released")),
        ScanState::TimedOut => Err(Error::InvalidState("scan timed out")),
    }
}
