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

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Environment variable consulted by [`WaitTimeoutResolver::from_env`].
pub const WAIT_TIMEOUT_ENV: &str = "CONDLOCK_WAIT_TIMEOUT";

/// Budget a caller is willing to spend blocked in `acquire` or `wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitTimeoutValue {
    Finite(Duration),
    #[default]
    Infinite,
}

impl WaitTimeoutValue {
    pub const fn from_secs(seconds: u64) -> Self {
        Self::Finite(Duration::from_secs(seconds))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self::Finite(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            WaitTimeoutValue::Finite(duration) => Some(*duration),
            WaitTimeoutValue::Infinite => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, WaitTimeoutValue::Infinite)
    }
}

impl fmt::Display for WaitTimeoutValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitTimeoutValue::Infinite => f.write_str("infinite"),
            WaitTimeoutValue::Finite(duration) if duration.subsec_millis() != 0 => {
                write!(f, "{}ms", duration.as_millis())
            }
            WaitTimeoutValue::Finite(duration) => write!(f, "{}s", duration.as_secs()),
        }
    }
}

impl Serialize for WaitTimeoutValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WaitTimeoutValue::Finite(duration) if duration.subsec_millis() == 0 => {
                serializer.serialize_u64(duration.as_secs())
            }
            _ => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for WaitTimeoutValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimeoutVisitor;

        impl Visitor<'_> for TimeoutVisitor {
            type Value = WaitTimeoutValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number of seconds or the word 'infinite'")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(WaitTimeoutValue::from_secs(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                u64::try_from(value)
                    .map(WaitTimeoutValue::from_secs)
                    .map_err(|_| E::custom(format!("timeout must not be negative, got {value}")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                parse_timeout_override(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(TimeoutVisitor)
    }
}

/// Source precedence used when resolving the effective timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitTimeoutSource {
    #[default]
    Default,
    Config,
    Environment,
    Caller,
}

impl fmt::Display for WaitTimeoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WaitTimeoutSource::Default => "built-in default",
            WaitTimeoutSource::Config => "configuration file",
            WaitTimeoutSource::Environment => "environment variable",
            WaitTimeoutSource::Caller => "caller override",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResolution {
    pub value: WaitTimeoutValue,
    pub source: WaitTimeoutSource,
}

/// Error produced when parsing a timeout override fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutParseError {
    message: String,
}

impl fmt::Display for TimeoutParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TimeoutParseError {}

impl TimeoutParseError {
    fn invalid_value(value: &str) -> Self {
        Self {
            message: format!(
                "Wait timeout value '{value}' is invalid. Use an integer number of seconds, a \
                 millisecond value such as '250ms', or the word 'infinite'."
            ),
        }
    }
}

/// Parses a wait-timeout override originating from a caller, the environment, or configuration.
pub fn parse_timeout_override(value: &str) -> Result<WaitTimeoutValue, TimeoutParseError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("infinite") {
        return Ok(WaitTimeoutValue::Infinite);
    }

    if let Some(millis) = trimmed.strip_suffix("ms")
        && let Ok(millis) = millis.trim().parse::<u64>()
    {
        return Ok(WaitTimeoutValue::from_millis(millis));
    }

    let seconds = trimmed.strip_suffix('s').unwrap_or(trimmed).trim();
    if let Ok(seconds) = seconds.parse::<u64>() {
        return Ok(WaitTimeoutValue::from_secs(seconds));
    }

    Err(TimeoutParseError::invalid_value(trimmed))
}

/// Resolves the effective timeout value based on caller > env > config > default precedence.
pub struct WaitTimeoutResolver<'a> {
    caller_override: Option<&'a str>,
    env_override: Option<String>,
    config_value: WaitTimeoutValue,
    default_value: WaitTimeoutValue,
}

impl<'a> WaitTimeoutResolver<'a> {
    pub fn new(
        caller_override: Option<&'a str>,
        env_override: Option<String>,
        config_value: WaitTimeoutValue,
        default_value: WaitTimeoutValue,
    ) -> Self {
        Self {
            caller_override,
            env_override,
            config_value,
            default_value,
        }
    }

    /// Builds a resolver that reads the environment override from [`WAIT_TIMEOUT_ENV`].
    pub fn from_env(
        caller_override: Option<&'a str>,
        config_value: WaitTimeoutValue,
        default_value: WaitTimeoutValue,
    ) -> Self {
        let env_override = std::env::var(WAIT_TIMEOUT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::new(caller_override, env_override, config_value, default_value)
    }

    pub fn resolve(self) -> Result<WaitTimeoutResolution, TimeoutParseError> {
        if let Some(caller_value) = self.caller_override {
            let value = parse_timeout_override(caller_value)?;
            return Ok(WaitTimeoutResolution {
                value,
                source: WaitTimeoutSource::Caller,
            });
        }

        if let Some(env_value) = self.env_override.as_deref() {
            let value = parse_timeout_override(env_value)?;
            return Ok(WaitTimeoutResolution {
                value,
                source: WaitTimeoutSource::Environment,
            });
        }

        if self.config_value != self.default_value {
            return Ok(WaitTimeoutResolution {
                value: self.config_value,
                source: WaitTimeoutSource::Config,
            });
        }

        Ok(WaitTimeoutResolution {
            value: self.default_value,
            source: WaitTimeoutSource::Default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numeric_values() {
        assert_eq!(
            parse_timeout_override("42").unwrap(),
            WaitTimeoutValue::from_secs(42)
        );
        assert_eq!(
            parse_timeout_override("0").unwrap(),
            WaitTimeoutValue::from_secs(0)
        );
        assert_eq!(
            parse_timeout_override("15s").unwrap(),
            WaitTimeoutValue::from_secs(15)
        );
    }

    #[test]
    fn parse_millisecond_values() {
        assert_eq!(
            parse_timeout_override("250ms").unwrap(),
            WaitTimeoutValue::from_millis(250)
        );
        assert_eq!(WaitTimeoutValue::from_millis(250).to_string(), "250ms");
    }

    #[test]
    fn parse_infinite_keyword() {
        assert_eq!(
            parse_timeout_override("infinite").unwrap(),
            WaitTimeoutValue::Infinite
        );
        assert_eq!(
            parse_timeout_override("Infinite").unwrap(),
            WaitTimeoutValue::Infinite
        );
    }

    #[test]
    fn parse_rejects_invalid_input() {
        let err = parse_timeout_override("abc").unwrap_err();
        assert!(err.to_string().contains("or the word 'infinite'"));
        assert!(parse_timeout_override("-5").is_err());
    }

    #[test]
    fn resolver_precedence() {
        let default = WaitTimeoutValue::Infinite;
        let config = WaitTimeoutValue::from_secs(120);
        let resolution =
            WaitTimeoutResolver::new(Some("30"), Some("40".to_string()), config, default)
                .resolve()
                .unwrap();
        assert_eq!(resolution.source, WaitTimeoutSource::Caller);
        assert_eq!(resolution.value, WaitTimeoutValue::from_secs(30));
    }

    #[test]
    fn resolver_env_beats_config() {
        let resolution = WaitTimeoutResolver::new(
            None,
            Some("infinite".to_string()),
            WaitTimeoutValue::from_secs(5),
            WaitTimeoutValue::from_secs(60),
        )
        .resolve()
        .unwrap();
        assert_eq!(resolution.source, WaitTimeoutSource::Environment);
        assert_eq!(resolution.value, WaitTimeoutValue::Infinite);
    }

    #[test]
    fn resolver_config_vs_default() {
        let default = WaitTimeoutValue::Infinite;
        let config = WaitTimeoutValue::from_secs(45);
        let resolution = WaitTimeoutResolver::new(None, None, config, default)
            .resolve()
            .unwrap();
        assert_eq!(resolution.source, WaitTimeoutSource::Config);
        assert_eq!(resolution.value, WaitTimeoutValue::from_secs(45));
    }

    #[test]
    fn resolver_defaults_when_config_matches() {
        let default = WaitTimeoutValue::Infinite;
        let resolution = WaitTimeoutResolver::new(None, None, default, default)
            .resolve()
            .unwrap();
        assert_eq!(resolution.source, WaitTimeoutSource::Default);
        assert_eq!(resolution.value, default);
    }

    #[test]
    fn resolver_surfaces_parse_errors() {
        let result = WaitTimeoutResolver::new(
            Some("later"),
            None,
            WaitTimeoutValue::Infinite,
            WaitTimeoutValue::Infinite,
        )
        .resolve();
        assert!(result.is_err());
    }
}
