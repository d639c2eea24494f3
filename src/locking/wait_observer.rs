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

//! Observer interfaces for wait instrumentation.
//!
//! Observers decouple a [`Cond`](crate::locking::Cond) from whatever wants to
//! watch contention on it (logs, metrics, tests) without touching the
//! blocking paths themselves. Callbacks run on the thread performing the
//! operation and never while an internal lock is held.

use crate::error::CancelError;
use log::{debug, trace};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Observer hooks for acquire, wait and wake events.
pub trait WaitObserver: Send + Sync {
    fn on_acquire_blocked(&self, _label: &str) {}

    fn on_acquired(&self, _label: &str, _ticket: u64, _waited: Duration) {}

    fn on_acquire_cancelled(&self, _label: &str, _waited: Duration, _error: CancelError) {}

    fn on_parked(&self, _label: &str, _ticket: u64, _queued: usize) {}

    fn on_woken(&self, _label: &str, _ticket: u64, _parked: Duration) {}

    fn on_wait_cancelled(
        &self,
        _label: &str,
        _ticket: u64,
        _parked: Duration,
        _error: CancelError,
    ) {
    }

    fn on_signal(&self, _label: &str, _woken: usize) {}

    fn on_broadcast(&self, _label: &str, _woken: usize) {}
}

/// Observer implementation that performs no work.
#[derive(Debug, Default)]
pub struct NoopWaitObserver;

impl WaitObserver for NoopWaitObserver {}

/// Forwards every event to the `log` facade.
#[derive(Debug, Default)]
pub struct LoggingWaitObserver;

impl WaitObserver for LoggingWaitObserver {
    fn on_acquire_blocked(&self, label: &str) {
        trace!("{label}: permit busy, blocking");
    }

    fn on_acquired(&self, label: &str, ticket: u64, waited: Duration) {
        trace!(
            "{label}: ticket #{ticket} acquired after {}",
            format_duration(waited)
        );
    }

    fn on_acquire_cancelled(&self, label: &str, waited: Duration, error: CancelError) {
        debug!(
            "{label}: acquire abandoned after {} ({error})",
            format_duration(waited)
        );
    }

    fn on_parked(&self, label: &str, ticket: u64, queued: usize) {
        trace!("{label}: ticket #{ticket} parked ({queued} waiting)");
    }

    fn on_woken(&self, label: &str, ticket: u64, parked: Duration) {
        trace!(
            "{label}: ticket #{ticket} woken after {}",
            format_duration(parked)
        );
    }

    fn on_wait_cancelled(&self, label: &str, ticket: u64, parked: Duration, error: CancelError) {
        debug!(
            "{label}: ticket #{ticket} stopped waiting after {} ({error})",
            format_duration(parked)
        );
    }

    fn on_signal(&self, label: &str, woken: usize) {
        trace!("{label}: signal woke {woken} waiter(s)");
    }

    fn on_broadcast(&self, label: &str, woken: usize) {
        debug!("{label}: broadcast woke {woken} waiter(s)");
    }
}

/// Event captured by [`RecordingWaitObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitEvent {
    AcquireBlocked,
    Acquired { ticket: u64 },
    AcquireCancelled { error: CancelError },
    Parked { ticket: u64, queued: usize },
    Woken { ticket: u64 },
    WaitCancelled { ticket: u64, error: CancelError },
    Signal { woken: usize },
    Broadcast { woken: usize },
}

/// Collects events in the order they were observed.
#[derive(Debug, Default)]
pub struct RecordingWaitObserver {
    events: Mutex<Vec<WaitEvent>>,
}

impl RecordingWaitObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WaitEvent> {
        self.lock().clone()
    }

    /// Returns and clears the recorded events.
    pub fn take(&self) -> Vec<WaitEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn count(&self, predicate: impl Fn(&WaitEvent) -> bool) -> usize {
        self.lock().iter().filter(|event| predicate(event)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<WaitEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: WaitEvent) {
        self.lock().push(event);
    }
}

impl WaitObserver for RecordingWaitObserver {
    fn on_acquire_blocked(&self, _label: &str) {
        self.push(WaitEvent::AcquireBlocked);
    }

    fn on_acquired(&self, _label: &str, ticket: u64, _waited: Duration) {
        self.push(WaitEvent::Acquired { ticket });
    }

    fn on_acquire_cancelled(&self, _label: &str, _waited: Duration, error: CancelError) {
        self.push(WaitEvent::AcquireCancelled { error });
    }

    fn on_parked(&self, _label: &str, ticket: u64, queued: usize) {
        self.push(WaitEvent::Parked { ticket, queued });
    }

    fn on_woken(&self, _label: &str, ticket: u64, _parked: Duration) {
        self.push(WaitEvent::Woken { ticket });
    }

    fn on_wait_cancelled(&self, _label: &str, ticket: u64, _parked: Duration, error: CancelError) {
        self.push(WaitEvent::WaitCancelled { ticket, error });
    }

    fn on_signal(&self, _label: &str, woken: usize) {
        self.push(WaitEvent::Signal { woken });
    }

    fn on_broadcast(&self, _label: &str, woken: usize) {
        self.push(WaitEvent::Broadcast { woken });
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.1}s", duration.as_secs_f32())
    } else {
        format!("{:.0}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_order() {
        let observer = RecordingWaitObserver::new();
        observer.on_acquired("jobs", 1, Duration::ZERO);
        observer.on_parked("jobs", 1, 1);
        observer.on_signal("jobs", 1);
        observer.on_woken("jobs", 1, Duration::from_millis(3));

        assert_eq!(
            observer.events(),
            vec![
                WaitEvent::Acquired { ticket: 1 },
                WaitEvent::Parked {
                    ticket: 1,
                    queued: 1
                },
                WaitEvent::Signal { woken: 1 },
                WaitEvent::Woken { ticket: 1 },
            ]
        );
        assert_eq!(
            observer.count(|event| matches!(event, WaitEvent::Woken { .. })),
            1
        );
    }

    #[test]
    fn take_clears_recorded_events() {
        let observer = RecordingWaitObserver::new();
        observer.on_broadcast("jobs", 3);

        assert_eq!(observer.take(), vec![WaitEvent::Broadcast { woken: 3 }]);
        assert!(observer.events().is_empty());
    }

    #[test]
    fn default_hooks_are_no_ops() {
        let observer = NoopWaitObserver;
        observer.on_acquire_blocked("jobs");
        observer.on_wait_cancelled("jobs", 7, Duration::ZERO, CancelError::Cancelled);
    }

    #[test]
    fn durations_are_formatted_for_logs() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1_200)), "1.2s");
    }
}
