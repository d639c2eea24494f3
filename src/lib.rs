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

//! Context-aware monitor: a single-holder lock fused with a condition
//! variable, where every blocking call is bounded by a [`CancellationToken`].
//!
//! ```
//! use condlock::{CancellationToken, Cond};
//!
//! let cond = Cond::new();
//! let token = CancellationToken::new();
//!
//! let mut ticket = cond.acquire(&token).unwrap();
//! cond.signal();
//! ticket.release();
//! ```

pub mod config;
pub mod error;
pub mod locking;
pub mod logging;

pub use config::CondConfig;
pub use error::{CancelError, ConfigError};
pub use locking::{CancellationToken, Cond, Ticket, global_token};
