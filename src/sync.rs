//! Blocking synchronization primitives shared by the workflows.
//!
//! - [`Gate`]: single-permit semaphore, one scan in flight at a time.
//! - [`Completion`]: zero-initialised counting signal, posted by an event
//!   handler and awaited by the issuing thread with a bounded wait.
//! - [`TimerHandle`] / [`TimerWorker`]: a one-shot, re-armable timer whose
//!   expiry runs on its own thread, never on the caller's.
//!
//! All locks recover from poisoning: a panicking event handler must not
//! wedge the caller waiting on the same primitive.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────
// Counting semaphore
// ───────────────────────────────────────────────────────────────

struct Semaphore {
    count: Mutex<u32>,
    cv: Condvar,
}

impl Semaphore {
    const fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
            cv: Condvar::new(),
        }
    }

    fn post(&self) {
        *lock(&self.count) += 1;
        self.cv.notify_one();
    }

    fn try_take(&self) -> bool {
        let mut n = lock(&self.count);
        if *n > 0 {
            *n -= 1;
            true
        } else {
            false
        }
    }

    fn take(&self) {
        let mut n = lock(&self.count);
        while *n == 0 {
            n = self.cv.wait(n).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        *n -= 1;
    }

    fn take_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut n = lock(&self.count);
        while *n == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cv
                .wait_timeout(n, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            n = guard;
        }
        *n -= 1;
        true
    }

    fn value(&self) -> u32 {
        *lock(&self.count)
    }

    fn drain(&self) -> u32 {
        core::mem::take(&mut *lock(&self.count))
    }
}

// ───────────────────────────────────────────────────────────────
// Gate
// ───────────────────────────────────────────────────────────────

/// Mutual-exclusion permit that may be released from a different thread
/// than the one that acquired it.
pub struct Gate(Semaphore);

impl Gate {
    pub const fn new() -> Self {
        Self(Semaphore::new(1))
    }

    pub fn acquire(&self) {
        self.0.take();
    }

    pub fn try_acquire(&self) -> bool {
        self.0.try_take()
    }

    /// Return the permit.  Never raises the count above one.
    pub fn release(&self) {
        let mut n = lock(&self.0.count);
        if *n == 0 {
            *n = 1;
            self.0.cv.notify_one();
        } else {
            log::warn!("Sync: gate released while already open");
        }
    }

    pub fn available(&self) -> u32 {
        self.0.value()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Completion
// ───────────────────────────────────────────────────────────────

pub struct Completion(Semaphore);

impl Completion {
    pub const fn new() -> Self {
        Self(Semaphore::new(0))
    }

    pub fn post(&self) {
        self.0.post();
    }

    /// Wait up to `timeout`.  Returns `false` on expiry.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.0.take_timeout(timeout)
    }

    pub fn try_wait(&self) -> bool {
        self.0.try_take()
    }

    /// Discard stale posts.  Returns how many were dropped.
    pub fn drain(&self) -> u32 {
        self.0.drain()
    }

    pub fn pending(&self) -> u32 {
        self.0.value()
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// One-shot timer
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct TimerSlot {
    deadline: Option<(Instant, u64)>,
    shutdown: bool,
}

struct TimerShared {
    slot: Mutex<TimerSlot>,
    cv: Condvar,
}

/// Arms and cancels the one-shot timer.  Cloning shares the same timer.
#[derive(Clone)]
pub struct TimerHandle(Arc<TimerShared>);

impl TimerHandle {
    pub fn new() -> Self {
        Self(Arc::new(TimerShared {
            slot: Mutex::new(TimerSlot::default()),
            cv: Condvar::new(),
        }))
    }

    /// Schedule expiry `after` from now, tagged with `token`.  Replaces any
    /// deadline already armed.
    pub fn arm(&self, after: Duration, token: u64) {
        lock(&self.0.slot).deadline = Some((Instant::now() + after, token));
        self.0.cv.notify_all();
    }

    /// Disarm.  Returns `true` if a deadline was pending.
    pub fn cancel(&self) -> bool {
        let was = lock(&self.0.slot).deadline.take().is_some();
        self.0.cv.notify_all();
        was
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.0.slot).deadline.is_some()
    }

    fn shutdown(&self) {
        let mut slot = lock(&self.0.slot);
        slot.shutdown = true;
        slot.deadline = None;
        drop(slot);
        self.0.cv.notify_all();
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread that fires a [`TimerHandle`]'s deadlines.  Stops and joins on drop.
pub struct TimerWorker {
    handle: TimerHandle,
    thread: Option<JoinHandle<()>>,
}

impl TimerWorker {
    pub fn spawn<F>(name: &str, handle: TimerHandle, mut on_expiry: F) -> std::io::Result<Self>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let shared = handle.clone();
        let thread = std::thread::Builder::new().name(name.into()).spawn(move || {
            while let Some(token) = next_expiry(&shared) {
                on_expiry(token);
            }
        })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

/// Block until the armed deadline passes.  `None` once shut down.
fn next_expiry(timer: &TimerHandle) -> Option<u64> {
    let shared = &timer.0;
    let mut slot = lock(&shared.slot);
    loop {
        if slot.shutdown {
            return None;
        }
        match slot.deadline {
            None => {
                slot = shared.cv.wait(slot).unwrap_or_else(std::sync::PoisonError::into_inner);
            }
            Some((at, token)) => {
                let now = Instant::now();
                if now >= at {
                    slot.deadline = None;
                    return Some(token);
                }
                let (guard, _) = shared
                    .cv
                    .wait_timeout(slot, at - now)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                slot = guard;
            }
        }
    }
}

impl Drop for TimerWorker {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(t) = self.thread.take() {
            if t.join().is_err() {
                log::error!("Sync: timer worker panicked");
            }
        }
    }
}
