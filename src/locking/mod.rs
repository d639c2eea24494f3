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

pub mod cancellation;
pub mod cond;
mod parking;
mod permit;
pub mod ticket;
pub mod timeout;
pub mod wait_observer;
mod waiter;

pub use cancellation::{CancellationToken, global_token};
pub use cond::{Cond, CondBuilder};
pub use ticket::Ticket;
pub use timeout::{
    TimeoutParseError, WAIT_TIMEOUT_ENV, WaitTimeoutResolution, WaitTimeoutResolver,
    WaitTimeoutSource, WaitTimeoutValue, parse_timeout_override,
};
pub use wait_observer::{
    LoggingWaitObserver, NoopWaitObserver, RecordingWaitObserver, WaitEvent, WaitObserver,
};
