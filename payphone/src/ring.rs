//! Ambient ringer: the phone occasionally rings while it sits on the
//! cradle, luring passers-by during opening hours.

use std::time::Duration;

use chrono::Timelike;
use rand::Rng;
use tokio::time::{self, Instant};
use tracing::debug;

/// A bell the scheduler can ring. Separate from the scene audio path: on
/// the real phone the ringer has its own output.
pub trait Bell {
    fn start_ring(&self);
    fn stop_ring(&self);
}

/// When and how often the phone rings on its own.
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Local hour (inclusive) the ringer wakes up.
    pub start_hour: u32,
    /// Local hour (exclusive) the ringer goes quiet.
    pub end_hour: u32,
    /// Chance of ringing at each check.
    pub chance: f64,
    /// How often to roll for a ring.
    pub check_interval: Duration,
    /// How long one ring lasts.
    pub ring_duration: Duration,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            start_hour: 14,
            end_hour: 17,
            chance: 0.1,
            check_interval: Duration::from_secs(300),
            ring_duration: Duration::from_secs(3),
        }
    }
}

impl RingConfig {
    fn in_window(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // Window wraps midnight.
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Run the ringer forever.
///
/// Never rings while the handset is lifted, and a lift mid-ring stops the
/// bell immediately so the session starts clean.
pub async fn run_ringer<B: Bell>(config: RingConfig, hook_lifted: impl Fn() -> bool, bell: B) {
    loop {
        time::sleep(config.check_interval).await;
        let hour = chrono::Local::now().hour();
        if !config.in_window(hour) || hook_lifted() {
            continue;
        }
        if rand::thread_rng().gen::<f64>() >= config.chance {
            continue;
        }
        debug!("ringing the phone");
        bell.start_ring();
        let until = Instant::now() + config.ring_duration;
        while Instant::now() < until && !hook_lifted() {
            time::sleep(Duration::from_millis(100)).await;
        }
        bell.stop_ring();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_plain() {
        let config = RingConfig::default();
        assert!(!config.in_window(13));
        assert!(config.in_window(14));
        assert!(config.in_window(16));
        assert!(!config.in_window(17));
    }

    #[test]
    fn test_window_wraps_midnight() {
        let config = RingConfig {
            start_hour: 22,
            end_hour: 2,
            ..RingConfig::default()
        };
        assert!(config.in_window(23));
        assert!(config.in_window(1));
        assert!(!config.in_window(12));
    }
}
