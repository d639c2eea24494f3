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


use crate::locking::timeout::TimeoutParseError;
use thiserror::Error;

/// Error returned when a cancellation token fires before an operation completes.
///
/// This is the only error `Cond::acquire` and `Ticket::wait` ever return.
/// Misuse of a ticket is not reported here; it panics instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl CancelError {
    pub fn is_deadline(&self) -> bool {
        matches!(self, CancelError::DeadlineExceeded)
    }
}

/// Errors raised while loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file error: {0}")]
    ConfigFile(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    InvalidTimeout(#[from] TimeoutParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CancelError>;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
