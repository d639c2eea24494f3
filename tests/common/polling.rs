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

use condlock::Cond;
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound for any single step of a scenario before it is declared hung.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls `condition` until it holds, panicking with `what` after [`STEP_TIMEOUT`].
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let started = Instant::now();
    while !condition() {
        if started.elapsed() > STEP_TIMEOUT {
            panic!("timed out waiting for {what}");
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Blocks until exactly `count` tickets are parked on `cond`.
pub fn wait_for_waiters(cond: &Cond, count: usize) {
    wait_until(&format!("{count} parked waiter(s)"), || {
        cond.waiters() == count
    });
}
