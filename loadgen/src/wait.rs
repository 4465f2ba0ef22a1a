use crate::error::ConfigError;
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Think-time between two successive tasks of a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTime {
    min: Duration,
    max: Duration,
}

impl WaitTime {
    /// Uniformly sampled from the closed range `[min, max]`.
    pub const fn between(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn constant(wait: Duration) -> Self {
        Self {
            min: wait,
            max: wait,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.min > self.max {
            Err(ConfigError::InvalidWaitTime {
                min: self.min,
                max: self.max,
            })
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for WaitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", humantime::format_duration(self.min))
        } else {
            write!(
                f,
                "{}..={}",
                humantime::format_duration(self.min),
                humantime::format_duration(self.max)
            )
        }
    }
}
