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

use crate::error::Result;
use crate::locking::cancellation::CancellationToken;
use crate::locking::cond::Cond;
use crate::locking::waiter::Wakeup;
use log::{debug, trace, warn};
use std::time::Instant;

/// Proof that the caller currently holds a [`Cond`]'s permit.
///
/// A ticket is consumed exactly once, by [`Ticket::release`] or by a
/// [`Ticket::wait`] that ends in cancellation. Any later `release` or `wait`
/// is a bug at the call site and panics. A successful `wait` leaves the
/// same ticket valid again.
///
/// Dropping a ticket that still holds the permit releases it.
#[derive(Debug)]
pub struct Ticket {
    cond: Cond,
    id: u64,
    consumed: bool,
}

impl Ticket {
    pub(crate) fn new(cond: Cond, id: u64) -> Self {
        Self {
            cond,
            id,
            consumed: false,
        }
    }

    /// Identifier stable across successful waits; unique per Cond.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cond(&self) -> &Cond {
        &self.cond
    }

    pub fn is_valid(&self) -> bool {
        !self.consumed
    }

    /// Returns the permit to the Cond.
    ///
    /// # Panics
    ///
    /// Panics if the ticket was already released or invalidated by a
    /// cancelled [`Ticket::wait`].
    pub fn release(&mut self) {
        self.assert_valid("release");
        self.consumed = true;
        self.cond.release_permit();
        trace!("{}: ticket #{} released", self.cond.label(), self.id);
    }

    /// Releases the permit and parks until signalled, then re-acquires it.
    ///
    /// Parking and giving up the permit happen together: a signal sent by the
    /// next permit holder cannot be missed. After a wakeup the caller contends
    /// for the permit like any new acquirer and may lose to one.
    ///
    /// On `Ok` the ticket holds the permit again. On `Err` the ticket is
    /// invalid and the permit is not held: if `token` fired while parked, the
    /// waiter is unlinked and the permit stays released; if it fired during
    /// re-acquisition, the permit was never regained.
    ///
    /// # Panics
    ///
    /// Panics if the ticket was already released or invalidated.
    pub fn wait(&mut self, token: &CancellationToken) -> Result<()> {
        self.assert_valid("wait");

        let wakeup = Wakeup::new();
        let (handle, queued) = self.cond.enqueue(wakeup.clone());
        // Dormant until re-acquired.
        self.consumed = true;
        self.cond.release_permit();

        let label = self.cond.label();
        trace!("{label}: ticket #{} parked ({queued} waiting)", self.id);
        self.cond
            .observe(|observer| observer.on_parked(label, self.id, queued));
        let parked_at = Instant::now();

        if let Err(err) = wakeup.wait(token) {
            let unlinked = self.cond.dequeue(handle);
            let parked = parked_at.elapsed();
            debug!(
                "{label}: ticket #{} stopped waiting after {:.3}s ({err}, unlinked: {unlinked})",
                self.id,
                parked.as_secs_f64()
            );
            self.cond
                .observe(|observer| observer.on_wait_cancelled(label, self.id, parked, err));
            return Err(err);
        }

        let parked = parked_at.elapsed();
        self.cond
            .observe(|observer| observer.on_woken(label, self.id, parked));

        // Same acquisition path as fresh callers; the new ticket's state is
        // moved into this one so the caller keeps its handle.
        let fresh = self.cond.acquire_as(token, self.id)?;
        *self = fresh;
        Ok(())
    }

    fn assert_valid(&self, operation: &str) {
        if self.consumed {
            panic!(
                "ticket reuse: {operation} called on consumed ticket #{} of cond '{}'",
                self.id,
                self.cond.label()
            );
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.consumed {
            return;
        }

        self.consumed = true;
        warn!(
            "{}: ticket #{} dropped while holding the permit; releasing it",
            self.cond.label(),
            self.id
        );
        self.cond.release_permit();
    }
}
