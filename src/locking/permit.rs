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
use crate::locking::parking::Parking;
use std::sync::Arc;

/// Cancellable semaphore of weight one.
///
/// Grants are unordered: a release wakes one blocked acquirer, but a thread
/// arriving at that moment may take the permit first.
#[derive(Debug)]
pub(crate) struct Permit {
    held: Arc<Parking<bool>>,
}

impl Permit {
    pub(crate) fn new() -> Self {
        Self {
            held: Arc::new(Parking::new(false)),
        }
    }

    /// Blocks until the permit is granted or `token` fires.
    pub(crate) fn acquire(&self, token: &CancellationToken) -> Result<()> {
        let mut held = self.held.wait_while(token, |held| *held)?;
        *held = true;
        Ok(())
    }

    pub(crate) fn try_acquire(&self) -> bool {
        let mut held = self.held.lock();
        if *held {
            return false;
        }
        *held = true;
        true
    }

    pub(crate) fn release(&self) {
        {
            let mut held = self.held.lock();
            assert!(*held, "permit released while not held");
            *held = false;
        }
        self.held.notify_one();
    }

    pub(crate) fn is_held(&self) -> bool {
        *self.held.lock()
    }
}
