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
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Mutex-protected state paired with a condvar that cancellation can interrupt.
///
/// Guarded state is only ever mutated to completion inside a single critical
/// section, so a poisoned lock still holds consistent data and is recovered.
#[derive(Debug)]
pub(crate) struct Parking<T> {
    state: Mutex<T>,
    condvar: Condvar,
}

impl<T: Send + 'static> Parking<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify_one(&self) {
        self.condvar.notify_one();
    }

    /// Wakes every parked thread after a state change visible under the lock.
    pub(crate) fn notify_all(&self) {
        // Taking the lock orders this wakeup after any in-progress check.
        drop(self.lock());
        self.condvar.notify_all();
    }

    /// Blocks until `blocked` returns false or `token` fires.
    ///
    /// `blocked` is evaluated under the lock before every suspension and
    /// takes precedence over cancellation: a ready state is always returned,
    /// even from a token that has already fired. When cancellation wins, any
    /// notification this thread may have absorbed is passed on.
    pub(crate) fn wait_while<F>(
        self: &Arc<Self>,
        token: &CancellationToken,
        mut blocked: F,
    ) -> Result<MutexGuard<'_, T>>
    where
        F: FnMut(&mut T) -> bool,
    {
        {
            let mut guard = self.lock();
            if !blocked(&mut guard) {
                return Ok(guard);
            }
        }

        let parking = Arc::clone(self);
        // Must be registered without holding the lock: an already-fired token
        // runs the listener immediately.
        let _registration = token.register(Arc::new(move || parking.notify_all()));

        let mut guard = self.lock();
        loop {
            if !blocked(&mut guard) {
                return Ok(guard);
            }

            if let Some(err) = token.error() {
                drop(guard);
                self.notify_one();
                return Err(err);
            }

            guard = match token.remaining() {
                Some(remaining) => {
                    self.condvar
                        .wait_timeout(guard, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .condvar
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}
