//! Function-pointer event dispatch table.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  EventDispatcher<C>                                  │
//! │  ┌──────────┬──────────────────────────────────────┐ │
//! │  │ event id │ handlers (registration order, max 4) │ │
//! │  ├──────────┼──────────────────────────────────────┤ │
//! │  │ 0        │ fn(&C, &EventFrame)                  │ │
//! │  │ ...      │ ...                                  │ │
//! │  │ 138      │ (empty → default handler)            │ │
//! │  └──────────┴──────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The table is filled once at device construction and then only read.
//! Each handler runs under an unwind guard: a panicking handler is logged
//! and counted, and the dispatcher stays usable for the next frame.

use std::panic::{AssertUnwindSafe, catch_unwind};

use heapless::Vec as HVec;
use log::{debug, error, warn};

use crate::error::{Error, Result};
use crate::frame::EventFrame;
use crate::ioctl::{EVENT_COUNT, EVENT_MASK_LEN};

/// Most handlers one event id can carry.
pub const MAX_HANDLERS_PER_EVENT: usize = 4;

/// Handler signature.  `C` is the shared device state.
pub type EventHandlerFn<C> = fn(&C, &EventFrame<'_>);

/// What happened to a dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Registered handlers ran; count given.
    Handled(usize),
    /// No handler registered; the default handler ran.
    Default,
    /// The frame was too short to carry a header and was dropped.
    Malformed,
    /// At least one handler panicked.  Remaining handlers still ran.
    HandlerFaulted,
}

pub struct EventDispatcher<C> {
    table: Vec<HVec<EventHandlerFn<C>, MAX_HANDLERS_PER_EVENT>>,
    default: EventHandlerFn<C>,
}

impl<C> EventDispatcher<C> {
    pub fn new(default: EventHandlerFn<C>) -> Self {
        Self {
            table: (0..EVENT_COUNT).map(|_| HVec::new()).collect(),
            default,
        }
    }

    /// Append `handler` to the list for `event_type`.
    pub fn register(&mut self, event_type: u32, handler: EventHandlerFn<C>) -> Result<()> {
        let slot = self
            .table
            .get_mut(event_type as usize)
            .ok_or(Error::InvalidArgument("event type out of range"))?;
        slot.push(handler)
            .map_err(|_| Error::InvalidArgument("too many handlers for event"))
    }

    pub fn is_registered(&self, event_type: u32) -> bool {
        self.table
            .get(event_type as usize)
            .is_some_and(|s| !s.is_empty())
    }

    /// Bitmask of every event id with at least one handler, in the layout
    /// the firmware's `event_msgs` variable expects.
    pub fn event_mask(&self) -> [u8; EVENT_MASK_LEN] {
        let mut mask = [0u8; EVENT_MASK_LEN];
        for id in (0..self.table.len()).filter(|&id| self.is_registered(id as u32)) {
            mask[id / 8] |= 1 << (id % 8);
        }
        mask
    }

    /// Route one raw frame to its handlers.
    pub fn dispatch(&self, ctx: &C, bytes: &[u8]) -> DispatchOutcome {
        let Ok(frame) = EventFrame::parse(bytes) else {
            warn!("Dispatch: dropped {}-byte frame, header incomplete", bytes.len());
            return DispatchOutcome::Malformed;
        };
        self.dispatch_frame(ctx, &frame)
    }

    pub fn dispatch_frame(&self, ctx: &C, frame: &EventFrame<'_>) -> DispatchOutcome {
        let ty = frame.event_type();
        let handlers = match self.table.get(ty as usize) {
            Some(h) if !h.is_empty() => h,
            _ => {
                debug!("Dispatch: event {ty} unhandled, using default");
                return if run_guarded(self.default, ctx, frame) {
                    DispatchOutcome::Default
                } else {
                    DispatchOutcome::HandlerFaulted
                };
            }
        };

        let mut faulted = false;
        for &h in handlers {
            if !run_guarded(h, ctx, frame) {
                faulted = true;
            }
        }
        if faulted {
            DispatchOutcome::HandlerFaulted
        } else {
            DispatchOutcome::Handled(handlers.len())
        }
    }
}

fn run_guarded<C>(h: EventHandlerFn<C>, ctx: &C, frame: &EventFrame<'_>) -> bool {
    if catch_unwind(AssertUnwindSafe(|| h(ctx, frame))).is_ok() {
        true
    } else {
        error!(
            "Dispatch: handler for event {} panicked (status={})",
            frame.event_type(),
            frame.status()
        );
        false
    }
}
