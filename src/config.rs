//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for the orchestrator and every
//! session it spawns.
//!
//! ## Sentinel values
//! - a deadline field set to `0s` in code → no deadline (the step waits for its
//!   event or cancellation)
//! - `bus_capacity = 0` → clamped to 1
//!
//! The environment overlay rejects `0` for the four session deadlines with
//! [`ConfigError::ZeroDeadline`]; only `CALLVISOR_GRACE_SECS` may be zero.
//!
//! ## Environment overlay
//! [`Config::from_env`] starts from [`Config::default`] and overrides fields
//! from `CALLVISOR_*` variables:
//!
//! | Variable                              | Field                 | Format        |
//! |---------------------------------------|-----------------------|---------------|
//! | `CALLVISOR_CALLBACK_URL`              | `callback_url`        | string        |
//! | `CALLVISOR_STEP_TIMEOUT_SECS`         | `step_timeout`        | seconds (u64) |
//! | `CALLVISOR_CONNECT_TIMEOUT_SECS`      | `connect_timeout`     | seconds (u64) |
//! | `CALLVISOR_PARTICIPANT_TIMEOUT_SECS`  | `participant_timeout` | seconds (u64) |
//! | `CALLVISOR_DISCONNECT_TIMEOUT_SECS`   | `disconnect_timeout`  | seconds (u64) |
//! | `CALLVISOR_GRACE_SECS`                | `grace`               | seconds (u64) |
//! | `CALLVISOR_BUS_CAPACITY`              | `bus_capacity`        | usize         |
//! | `CALLVISOR_MAX_TONES`                 | `recognize.max_tones` | u8            |

use std::str::FromStr;
use std::time::Duration;

use crate::call::RecognizeOptions;
use crate::error::ConfigError;

/// Global configuration for the orchestration runtime.
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// URL the backend posts call notifications to (passed to `answer`/`create_call`).
    pub callback_url: String,

    /// Deadline for play and recognize outcomes.
    ///
    /// `0s` disables it: a step whose outcome never arrives then holds its
    /// session until the session is cancelled.
    pub step_timeout: Duration,

    /// Deadline for `CallConnected` after answer/create acknowledgement.
    pub connect_timeout: Duration,

    /// Deadline for the add-participant outcome when a branch awaits it.
    pub participant_timeout: Duration,

    /// How long `Terminating` waits for `CallDisconnected` after hang-up.
    ///
    /// `0s` waits until the notification arrives or the session is cancelled.
    pub disconnect_timeout: Duration,

    /// Maximum time to wait for sessions to stop on shutdown.
    ///
    /// If exceeded, shutdown returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the lifecycle-event bus ring buffer.
    pub bus_capacity: usize,

    /// DTMF options used by menus that do not carry their own.
    pub recognize: RecognizeOptions,
}

impl Config {
    /// Loads defaults overlaid with `CALLVISOR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup("CALLVISOR_CALLBACK_URL") {
            cfg.callback_url = url;
        }
        if let Some(d) = parse_deadline(&lookup, "CALLVISOR_STEP_TIMEOUT_SECS")? {
            cfg.step_timeout = d;
        }
        if let Some(d) = parse_deadline(&lookup, "CALLVISOR_CONNECT_TIMEOUT_SECS")? {
            cfg.connect_timeout = d;
        }
        if let Some(d) = parse_deadline(&lookup, "CALLVISOR_PARTICIPANT_TIMEOUT_SECS")? {
            cfg.participant_timeout = d;
        }
        if let Some(d) = parse_deadline(&lookup, "CALLVISOR_DISCONNECT_TIMEOUT_SECS")? {
            cfg.disconnect_timeout = d;
        }
        if let Some(secs) = parse::<u64>(&lookup, "CALLVISOR_GRACE_SECS")? {
            cfg.grace = Duration::from_secs(secs);
        }
        if let Some(cap) = parse::<usize>(&lookup, "CALLVISOR_BUS_CAPACITY")? {
            cfg.bus_capacity = cap;
        }
        if let Some(n) = parse::<u8>(&lookup, "CALLVISOR_MAX_TONES")? {
            cfg.recognize.max_tones = n;
        }
        Ok(cfg)
    }

    /// Play/recognize deadline as an `Option` (`None` = wait indefinitely).
    #[inline]
    pub fn step_deadline(&self) -> Option<Duration> {
        non_zero(self.step_timeout)
    }

    #[inline]
    pub fn connect_deadline(&self) -> Option<Duration> {
        non_zero(self.connect_timeout)
    }

    #[inline]
    pub fn participant_deadline(&self) -> Option<Duration> {
        non_zero(self.participant_timeout)
    }

    #[inline]
    pub fn disconnect_deadline(&self) -> Option<Duration> {
        non_zero(self.disconnect_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `callback_url = "http://localhost:8080/api/callbacks"`
    /// - `step_timeout = connect_timeout = participant_timeout = 30s`
    /// - `disconnect_timeout = 10s`
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `recognize = RecognizeOptions::default()`
    fn default() -> Self {
        Self {
            callback_url: "http://localhost:8080/api/callbacks".to_string(),
            step_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            participant_timeout: Duration::from_secs(30),
            disconnect_timeout: Duration::from_secs(10),
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            recognize: RecognizeOptions::default(),
        }
    }
}

#[inline]
fn non_zero(d: Duration) -> Option<Duration> {
    if d == Duration::ZERO { None } else { Some(d) }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}

fn parse_deadline(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    match parse::<u64>(lookup, name)? {
        Some(0) => Err(ConfigError::ZeroDeadline { name }),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.step_deadline(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.disconnect_deadline(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.recognize.max_tones, 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1024);
    }

    #[test]
    fn test_zero_means_no_deadline() {
        let cfg = Config {
            step_timeout: Duration::ZERO,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.step_deadline(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_env_overlay() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("CALLVISOR_CALLBACK_URL", "https://example.test/cb"),
            ("CALLVISOR_STEP_TIMEOUT_SECS", " 12 "),
            ("CALLVISOR_MAX_TONES", "4"),
        ]))
        .unwrap();

        assert_eq!(cfg.callback_url, "https://example.test/cb");
        assert_eq!(cfg.step_timeout, Duration::from_secs(12));
        assert_eq!(cfg.recognize.max_tones, 4);
        assert_eq!(cfg.grace, Duration::from_secs(60));
    }

    #[test]
    fn test_env_rejects_garbage() {
        let lookup = lookup_from(&[("CALLVISOR_GRACE_SECS", "soon")]);
        let err = Config::from_lookup(lookup).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "CALLVISOR_GRACE_SECS",
                value: "soon".to_string(),
            }
        );
    }

    #[test]
    fn test_env_rejects_zero_deadlines() {
        for name in [
            "CALLVISOR_STEP_TIMEOUT_SECS",
            "CALLVISOR_CONNECT_TIMEOUT_SECS",
            "CALLVISOR_PARTICIPANT_TIMEOUT_SECS",
            "CALLVISOR_DISCONNECT_TIMEOUT_SECS",
        ] {
            let err = Config::from_lookup(lookup_from(&[(name, "0")])).unwrap_err();
            assert_eq!(err, ConfigError::ZeroDeadline { name });
        }

        let cfg = Config::from_lookup(lookup_from(&[("CALLVISOR_GRACE_SECS", "0")])).unwrap();
        assert_eq!(cfg.grace, Duration::ZERO);
    }
}
