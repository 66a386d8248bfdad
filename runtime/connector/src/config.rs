//! Controller configuration

use core::time::Duration;

/// Deadline applied to every device round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Controller configuration
///
/// With the `serde` feature this deserializes from
/// `{ timeout_ms = <milliseconds> }`; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct ControllerConfig {
    /// Single deadline shared by every operation, whatever its cost
    #[cfg_attr(
        feature = "serde",
        serde(rename = "timeout_ms", deserialize_with = "millis::deserialize")
    )]
    pub timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ControllerConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(feature = "serde")]
mod millis {
    use core::time::Duration;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
