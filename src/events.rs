//! Event delivery: bounded frame queue plus the pump thread that drains it.
//!
//! Frames are produced by the bus receive path (or the simulated firmware)
//! and consumed by a single pump thread, which hands each one to the
//! device's dispatcher in arrival order.
//!
//! ```text
//! ┌─────────────┐ push_frame ┌──────────────────┐  pop().await  ┌────────────┐
//! │ bus rx path │──────────▶│   EventQueue      │─────────────▶│ EventPump  │──▶ dispatch
//! │ sim fw      │ (no block) │ (embassy channel) │               │ (thread)   │
//! └─────────────┘            └──────────────────┘               └────────────┘
//! ```
//!
//! `push_frame` never blocks; a full queue drops the frame and reports it.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::{debug, error, info, warn};

/// Queue depth in frames.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Largest frame the queue carries.
pub const MAX_EVENT_FRAME: usize = 2048;

pub enum EventMsg {
    Frame(Vec<u8, MAX_EVENT_FRAME>),
    /// Tells the pump to exit after everything queued before it.
    Shutdown,
}

pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, EventMsg, EVENT_QUEUE_DEPTH>,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueue a copy of `bytes`.  Returns `false` if the frame was dropped
    /// (too large or queue full).
    pub fn push_frame(&self, bytes: &[u8]) -> bool {
        let Ok(frame) = Vec::from_slice(bytes) else {
            warn!("event: {}-byte frame exceeds queue slot, dropped", bytes.len());
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        if self.channel.try_send(EventMsg::Frame(frame)).is_err() {
            warn!("event: queue full, frame dropped");
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    pub fn try_pop(&self) -> Option<EventMsg> {
        self.channel.try_receive().ok()
    }

    pub async fn pop(&self) -> EventMsg {
        self.channel.receive().await
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drain everything queued, synchronously, into `sink`.  Returns the
    /// number of frames delivered.  Stops at a shutdown marker.
    pub fn drain(&self, mut sink: impl FnMut(&[u8])) -> usize {
        let mut n = 0;
        while let Some(msg) = self.try_pop() {
            match msg {
                EventMsg::Frame(f) => {
                    sink(&f);
                    n += 1;
                }
                EventMsg::Shutdown => break,
            }
        }
        n
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Pump thread ───────────────────────────────────────────────

pub struct EventPump {
    queue: Arc<EventQueue>,
    thread: Option<JoinHandle<usize>>,
}

impl EventPump {
    /// Spawn the pump.  `sink` runs on the pump thread for every frame.
    pub fn spawn<F>(queue: Arc<EventQueue>, mut sink: F) -> std::io::Result<Self>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let q = Arc::clone(&queue);
        let thread = std::thread::Builder::new()
            .name("bcmf-events".into())
            .spawn(move || {
                let mut delivered = 0usize;
                loop {
                    match futures_lite::future::block_on(q.pop()) {
                        EventMsg::Frame(f) => {
                            sink(&f);
                            delivered += 1;
                        }
                        EventMsg::Shutdown => break,
                    }
                }
                debug!("event: pump exiting after {delivered} frame(s)");
                delivered
            })?;
        info!("event: pump started (depth {EVENT_QUEUE_DEPTH})");
        Ok(Self {
            queue,
            thread: Some(thread),
        })
    }

    /// Deliver what is already queued, then stop and join.  Returns the
    /// total number of frames the pump delivered.
    pub fn stop(mut self) -> usize {
        self.shutdown()
    }

    fn shutdown(&mut self) -> usize {
        let Some(t) = self.thread.take() else {
            return 0;
        };
        futures_lite::future::block_on(self.queue.channel.send(EventMsg::Shutdown));
        t.join().unwrap_or_else(|_| {
            error!("event: pump thread panicked");
            0
        })
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.shutdown();
    }
}
