//! Delay primitive and emission pacing.
//!
//! Decoded values are usually rendered by something slower than the network.
//! Several messages coalesced into one chunk would otherwise reach the consumer
//! as a single burst, so the reassembly loop pauses briefly after each emission.

use std::time::Duration;

use crate::client::StreamError;

/// Delay used by [`sleep_default`].
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

/// Suspend the current task for at least `delay`.
pub async fn sleep(delay: Duration) {
    tokio::time::sleep(delay).await;
}

/// Suspend the current task for [`DEFAULT_DELAY`].
pub async fn sleep_default() {
    sleep(DEFAULT_DELAY).await;
}

/// How long to pause after each emitted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pacing {
    /// Emit back to back.
    None,

    /// Always pause for the same duration.
    Fixed(Duration),

    /// Pause for a uniformly random duration in `min..=max`.
    Random { min: Duration, max: Duration },
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Random {
            min: Duration::from_millis(5),
            max: Duration::from_millis(14),
        }
    }
}

impl Pacing {
    /// Pick the next pause, or `None` when no pause is needed.
    pub fn next_delay(&self) -> Option<Duration> {
        match self {
            Pacing::None => None,
            Pacing::Fixed(d) if d.is_zero() => None,
            Pacing::Fixed(d) => Some(*d),
            Pacing::Random { min, max } => {
                let lo = as_nanos(*min);
                let hi = as_nanos(*max).max(lo);
                Some(Duration::from_nanos(fastrand::u64(lo..=hi)))
            }
        }
    }

    /// Reject a random range whose bounds are inverted.
    pub fn validate(&self) -> Result<(), StreamError> {
        match self {
            Pacing::Random { min, max } if min > max => Err(StreamError::Config(format!(
                "pacing range is inverted: {:?} > {:?}",
                min, max
            ))),
            _ => Ok(()),
        }
    }

    /// Pause according to this strategy.
    pub async fn pause(&self) {
        if let Some(delay) = self.next_delay() {
            sleep(delay).await;
        }
    }
}

fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
