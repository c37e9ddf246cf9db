use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use crate::frame::Frame;

/// Animation-frame source backed by a tokio interval.
///
/// Frames carry a fixed `dt_s`; a late tick is delayed rather than bursting to
/// catch up, matching how a browser skips animation frames under load.
#[derive(Debug)]
pub struct FrameTicker {
    interval: Interval,
    next: Frame,
}

impl FrameTicker {
    pub fn new(frames_per_second: u32) -> Self {
        let first = Frame::from_rate(0, frames_per_second);
        let mut interval = tokio::time::interval(Duration::from_secs_f64(first.dt_s));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            next: first,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.next.dt_s)
    }

    /// Waits for the next animation frame.
    pub async fn tick(&mut self) -> Frame {
        self.interval.tick().await;
        let frame = self.next;
        self.next = frame.next();
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::FrameTicker;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn frames_advance_at_fixed_rate() {
        let start = Instant::now();
        let mut ticker = FrameTicker::new(10);
        let f0 = ticker.tick().await;
        let f1 = ticker.tick().await;
        let f2 = ticker.tick().await;
        assert_eq!((f0.index, f1.index, f2.index), (0, 1, 2));
        assert_eq!(ticker.frame_duration(), Duration::from_millis(100));
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
