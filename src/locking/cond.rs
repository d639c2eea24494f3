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

//! Monitor-style condition variable with an integrated single-holder lock.
//!
//! A [`Cond`] couples a binary permit with an ordered list of parked
//! waiters. Holding the permit is proven by a [`Ticket`]; a ticket holder may
//! [`Ticket::wait`] to give the permit up until a [`Cond::signal`] or
//! [`Cond::broadcast`] wakes it, after which it contends for the permit
//! again like any other caller.
//!
//! Permit grants are not fair. A caller entering [`Cond::acquire`] may win
//! the permit ahead of a waiter that was just woken ("signal stealing"); the
//! woken waiter simply keeps contending. Only the wake order is FIFO.
//!
//! The waiter-list mutex is a leaf: it is never held while blocking on the
//! permit.

use crate::config::CondConfig;
use crate::error::Result;
use crate::locking::cancellation::CancellationToken;
use crate::locking::permit::Permit;
use crate::locking::ticket::Ticket;
use crate::locking::wait_observer::WaitObserver;
use crate::locking::waiter::{WaiterHandle, WaiterList, Wakeup};
use log::{debug, trace};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_LABEL: &str = "cond";

/// Condition variable whose lock is held through [`Ticket`]s.
///
/// `Cond` is a cheap handle; clones refer to the same monitor.
#[derive(Clone)]
pub struct Cond {
    inner: Arc<CondInner>,
}

struct CondInner {
    label: String,
    permit: Permit,
    waiters: Mutex<WaiterList>,
    observer: Option<Arc<dyn WaitObserver>>,
    next_ticket: AtomicU64,
}

/// Builder for a labelled and/or observed [`Cond`].
#[derive(Default)]
pub struct CondBuilder {
    label: Option<String>,
    observer: Option<Arc<dyn WaitObserver>>,
}

impl CondBuilder {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn observer(mut self, observer: Arc<dyn WaitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Cond {
        Cond {
            inner: Arc::new(CondInner {
                label: self.label.unwrap_or_else(|| DEFAULT_LABEL.to_string()),
                permit: Permit::new(),
                waiters: Mutex::new(WaiterList::new()),
                observer: self.observer,
                next_ticket: AtomicU64::new(1),
            }),
        }
    }
}

impl Cond {
    /// Creates an unheld Cond with no waiters.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn named(label: impl Into<String>) -> Self {
        Self::builder().label(label).build()
    }

    pub fn builder() -> CondBuilder {
        CondBuilder::default()
    }

    pub fn from_config(config: &CondConfig) -> Self {
        Self::named(config.cond.label.clone())
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Blocks until the permit is granted or `token` fires.
    ///
    /// A token that has already fired fails immediately, even if the permit
    /// is free. On failure no permit is held and nothing is left queued.
    pub fn acquire(&self, token: &CancellationToken) -> Result<Ticket> {
        let id = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.acquire_as(token, id)
    }

    /// Takes the permit only if it is free right now.
    pub fn try_acquire(&self) -> Option<Ticket> {
        if !self.inner.permit.try_acquire() {
            return None;
        }
        let id = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        Some(self.grant(id, Duration::ZERO))
    }

    /// Wakes the oldest parked waiter, if any. Never blocks on the permit.
    pub fn signal(&self) {
        let woken = {
            let mut waiters = self.waiter_list();
            match waiters.pop_front() {
                Some(wakeup) => usize::from(wakeup.fire()),
                None => 0,
            }
        };
        trace!("{}: signal woke {woken} waiter(s)", self.label());
        self.observe(|observer| observer.on_signal(self.label(), woken));
    }

    /// Wakes every parked waiter, oldest first. Never blocks on the permit.
    pub fn broadcast(&self) {
        let woken = {
            let mut waiters = self.waiter_list();
            waiters
                .drain()
                .into_iter()
                .filter(|wakeup| wakeup.fire())
                .count()
        };
        if woken > 0 {
            debug!("{}: broadcast woke {woken} waiter(s)", self.label());
        }
        self.observe(|observer| observer.on_broadcast(self.label(), woken));
    }

    /// Number of callers currently parked in [`Ticket::wait`].
    pub fn waiters(&self) -> usize {
        self.waiter_list().len()
    }

    /// Whether some ticket currently holds the permit.
    pub fn is_held(&self) -> bool {
        self.inner.permit.is_held()
    }

    pub(crate) fn acquire_as(&self, token: &CancellationToken, id: u64) -> Result<Ticket> {
        if let Err(err) = token.check() {
            debug!("{}: acquire refused, token already fired ({err})", self.label());
            self.observe(|observer| {
                observer.on_acquire_cancelled(self.label(), Duration::ZERO, err)
            });
            return Err(err);
        }

        let waited = if self.inner.permit.try_acquire() {
            Duration::ZERO
        } else {
            self.observe(|observer| observer.on_acquire_blocked(self.label()));
            let started = Instant::now();
            if let Err(err) = self.inner.permit.acquire(token) {
                let waited = started.elapsed();
                debug!(
                    "{}: acquire abandoned after {:.3}s ({err})",
                    self.label(),
                    waited.as_secs_f64()
                );
                self.observe(|observer| observer.on_acquire_cancelled(self.label(), waited, err));
                return Err(err);
            }
            started.elapsed()
        };

        Ok(self.grant(id, waited))
    }

    fn grant(&self, id: u64, waited: Duration) -> Ticket {
        trace!(
            "{}: ticket #{id} granted after {:.3}s",
            self.label(),
            waited.as_secs_f64()
        );
        self.observe(|observer| observer.on_acquired(self.label(), id, waited));
        Ticket::new(self.clone(), id)
    }

    /// Appends a wakeup to the waiter list, returning its handle and the queue length.
    pub(crate) fn enqueue(&self, wakeup: Wakeup) -> (WaiterHandle, usize) {
        let mut waiters = self.waiter_list();
        let handle = waiters.push_back(wakeup);
        (handle, waiters.len())
    }

    /// Unlinks a waiter; a no-op if a waker already took it.
    pub(crate) fn dequeue(&self, handle: WaiterHandle) -> bool {
        self.waiter_list().remove(handle)
    }

    pub(crate) fn release_permit(&self) {
        self.inner.permit.release();
    }

    pub(crate) fn observe(&self, notify: impl FnOnce(&dyn WaitObserver)) {
        if let Some(observer) = &self.inner.observer {
            notify(observer.as_ref());
        }
    }

    fn waiter_list(&self) -> MutexGuard<'_, WaiterList> {
        self.inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Cond {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cond")
            .field("label", &self.inner.label)
            .field("held", &self.is_held())
            .field("waiters", &self.waiters())
            .finish()
    }
}
