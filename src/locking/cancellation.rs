// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cancellation tokens observed at every suspension point of a [`Cond`].
//!
//! A token fires at most once, either because [`CancellationToken::cancel`]
//! was called (on it or on an ancestor) or because its deadline passed.
//! Threads blocked on a token register a listener for the duration of the
//! blocking section so that `cancel` can wake them. Deadlines are honoured
//! with bounded waits instead of timer threads, so an expired deadline does
//! not run listeners.
//!
//! [`Cond`]: crate::locking::Cond

use crate::error::{CancelError, Result};
use crate::locking::timeout::WaitTimeoutValue;
use log::{debug, warn};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant};

const LIVE: u8 = 0;
const CANCELLED: u8 = 1;
const DEADLINE_EXCEEDED: u8 = 2;

pub(crate) type CancelListener = Arc<dyn Fn() + Send + Sync>;

/// Token used to abort blocking `acquire` and `wait` calls.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    state: AtomicU8,
    deadline: Option<Instant>,
    listeners: Mutex<Listeners>,
    parent: Mutex<Option<ListenerRegistration>>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, CancelListener)>,
}

impl TokenInner {
    fn new(deadline: Option<Instant>) -> Self {
        Self {
            state: AtomicU8::new(LIVE),
            deadline,
            listeners: Mutex::new(Listeners::default()),
            parent: Mutex::new(None),
        }
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, reason: u8) -> bool {
        if self
            .state
            .compare_exchange(LIVE, reason, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let entries = std::mem::take(&mut self.listeners().entries);
        for (_, listener) in entries {
            listener();
        }
        true
    }

    fn error(&self) -> Option<CancelError> {
        match self.state.load(Ordering::Acquire) {
            CANCELLED => Some(CancelError::Cancelled),
            DEADLINE_EXCEEDED => Some(CancelError::DeadlineExceeded),
            _ => match self.deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    // Listeners are not run here: the observer may hold a lock they
                    // take, and every deadline-bound wait wakes up on its own.
                    let _ = self.state.compare_exchange(
                        LIVE,
                        DEADLINE_EXCEEDED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    self.error_from_state()
                }
                _ => None,
            },
        }
    }

    fn error_from_state(&self) -> Option<CancelError> {
        match self.state.load(Ordering::Acquire) {
            CANCELLED => Some(CancelError::Cancelled),
            DEADLINE_EXCEEDED => Some(CancelError::DeadlineExceeded),
            _ => None,
        }
    }
}

impl CancellationToken {
    /// A live token that only fires when cancelled explicitly.
    pub fn new() -> Self {
        Self::with_optional_deadline(None)
    }

    /// A token for callers that never intend to cancel.
    pub fn background() -> Self {
        Self::new()
    }

    /// A token that reports [`CancelError::DeadlineExceeded`] once `deadline` passes.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::with_optional_deadline(Some(deadline))
    }

    /// A token that reports [`CancelError::DeadlineExceeded`] after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_optional_deadline(Instant::now().checked_add(timeout))
    }

    /// Builds a token from a resolved wait budget; `infinite` never expires.
    pub fn from_timeout_value(value: WaitTimeoutValue) -> Self {
        match value.as_duration() {
            Some(timeout) => Self::with_timeout(timeout),
            None => Self::new(),
        }
    }

    fn with_optional_deadline(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(TokenInner::new(deadline)),
        }
    }

    /// Derives a token that fires whenever this one does.
    ///
    /// Cancelling the child leaves the parent untouched. The child inherits
    /// the parent's deadline and detaches from the parent when dropped.
    pub fn child_token(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// Derives a child token whose deadline is the earlier of the parent's and `timeout`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now().checked_add(timeout);
        let deadline = match (self.inner.deadline, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        self.derive(deadline)
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let child = Self::with_optional_deadline(deadline);
        let child_ref = Arc::downgrade(&child.inner);
        let parent_ref = Arc::downgrade(&self.inner);
        let registration = self.register(Arc::new(move || {
            propagate(&parent_ref, &child_ref);
        }));
        *child
            .inner
            .parent
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(registration);
        child
    }

    /// Fires the token and wakes every thread blocked on it. Idempotent.
    pub fn cancel(&self) {
        if self.inner.fire(CANCELLED) {
            debug!("Cancellation token fired");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.error().is_some()
    }

    /// Reason the token fired, or `None` while it is live.
    pub fn error(&self) -> Option<CancelError> {
        self.inner.error()
    }

    /// Returns the cancellation error if the token has fired.
    pub fn check(&self) -> Result<()> {
        match self.inner.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline; `None` when the token has no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Registers `listener` to run when the token fires.
    ///
    /// If the token has already fired the listener runs immediately on the
    /// calling thread, so callers must not hold any lock the listener takes.
    pub(crate) fn register(&self, listener: CancelListener) -> ListenerRegistration {
        let mut listeners = self.inner.listeners();
        if self.inner.state.load(Ordering::Acquire) != LIVE {
            drop(listeners);
            listener();
            return ListenerRegistration {
                token: Weak::new(),
                id: 0,
            };
        }

        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, listener));
        ListenerRegistration {
            token: Arc::downgrade(&self.inner),
            id,
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.inner.listeners().entries.len()
    }
}

fn propagate(parent: &Weak<TokenInner>, child: &Weak<TokenInner>) {
    let reason = parent
        .upgrade()
        .map(|parent| parent.state.load(Ordering::Acquire))
        .filter(|state| *state != LIVE)
        .unwrap_or(CANCELLED);
    if let Some(child) = child.upgrade() {
        child.fire(reason);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("error", &self.inner.error_from_state())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

/// Keeps a listener attached to a token; detaches it when dropped.
pub(crate) struct ListenerRegistration {
    token: Weak<TokenInner>,
    id: u64,
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        if let Some(token) = self.token.upgrade() {
            token.listeners().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

fn registered_signals() -> &'static [i32] {
    #[cfg(windows)]
    {
        use signal_hook::consts::signal::{SIGBREAK, SIGINT, SIGTERM};
        static SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGBREAK];
        &SIGNALS
    }

    #[cfg(not(windows))]
    {
        use signal_hook::consts::signal::{SIGINT, SIGTERM};
        static SIGNALS: [i32; 2] = [SIGINT, SIGTERM];
        &SIGNALS
    }
}

#[cfg(not(windows))]
fn spawn_signal_watcher(token: CancellationToken) {
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new(registered_signals()) {
        Ok(signals) => signals,
        Err(err) => {
            warn!("Failed to register cancellation handlers: {err}");
            return;
        }
    };

    let spawned = std::thread::Builder::new()
        .name("condlock-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                debug!("Received signal {signal}; cancelling global token");
                token.cancel();
            }
        });
    if let Err(err) = spawned {
        warn!("Failed to start signal watcher thread: {err}");
    }
}

#[cfg(windows)]
fn spawn_signal_watcher(token: CancellationToken) {
    use signal_hook::flag;
    use std::sync::atomic::AtomicBool;

    let flag = Arc::new(AtomicBool::new(false));
    for signal in registered_signals() {
        if let Err(err) = flag::register(*signal, flag.clone()) {
            warn!("Failed to register cancellation handler for signal {signal}: {err}");
        }
    }

    let spawned = std::thread::Builder::new()
        .name("condlock-signals".to_string())
        .spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(50));
            }
            debug!("Received termination signal; cancelling global token");
            token.cancel();
        });
    if let Err(err) = spawned {
        warn!("Failed to start signal watcher thread: {err}");
    }
}

static GLOBAL_TOKEN: OnceLock<CancellationToken> = OnceLock::new();

/// Returns a process-wide token that fires on SIGINT or SIGTERM.
///
/// Derive per-operation tokens from it with [`CancellationToken::child_token`]
/// so that Ctrl-C aborts every blocked `acquire` and `wait`.
pub fn global_token() -> CancellationToken {
    GLOBAL_TOKEN
        .get_or_init(|| {
            let token = CancellationToken::new();
            spawn_signal_watcher(token.clone());
            token
        })
        .clone()
}
