use std::time::Instant;

const MIN_FRAME_DELTA: f32 = 1.0 / 240.0;
const MAX_FRAME_DELTA: f32 = 1.0 / 20.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTick {
    pub dt: f32,
    /// Seconds since the loop was first started.
    pub time: f64,
}

/// Scoped driver for per-frame work. Nothing advances unless the loop was
/// started, and a stopped loop refuses to tick until started again.
#[derive(Debug, Default)]
pub struct FrameLoop {
    started_at: Option<Instant>,
    last_frame: Option<Instant>,
}

impl FrameLoop {
    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.last_frame = Some(now);
    }

    pub fn stop(&mut self) {
        self.last_frame = None;
    }

    pub fn is_running(&self) -> bool {
        self.last_frame.is_some()
    }

    /// Time since the first start, or zero before it.
    pub fn elapsed(&self, now: Instant) -> f64 {
        self.started_at
            .map_or(0.0, |started| now.saturating_duration_since(started).as_secs_f64())
    }

    pub fn advance(&mut self, now: Instant) -> Option<FrameTick> {
        let last = self.last_frame?;
        self.last_frame = Some(now);
        let dt = now
            .saturating_duration_since(last)
            .as_secs_f32()
            .clamp(MIN_FRAME_DELTA, MAX_FRAME_DELTA);
        Some(FrameTick {
            dt,
            time: self.elapsed(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn idle_loop_does_not_tick() {
        let mut frames = FrameLoop::default();
        assert!(!frames.is_running());
        assert_eq!(frames.advance(Instant::now()), None);
    }

    #[test]
    fn ticks_are_clamped() {
        let start = Instant::now();
        let mut frames = FrameLoop::default();
        frames.start(start);

        let tick = frames.advance(start + Duration::from_secs(3)).unwrap();
        assert_eq!(tick.dt, MAX_FRAME_DELTA);
        assert!((tick.time - 3.0).abs() < 1e-9);

        let tick = frames.advance(start + Duration::from_secs(3)).unwrap();
        assert_eq!(tick.dt, MIN_FRAME_DELTA);
    }

    #[test]
    fn stop_ends_ticking_until_restarted() {
        let start = Instant::now();
        let mut frames = FrameLoop::default();
        frames.start(start);
        frames.stop();

        assert!(!frames.is_running());
        assert_eq!(frames.advance(start + Duration::from_millis(16)), None);
        assert!(!frames.is_running());

        frames.start(start + Duration::from_secs(1));
        let tick = frames.advance(start + Duration::from_millis(1016)).unwrap();
        assert!((tick.dt - 0.016).abs() < 1e-4);
        assert!(tick.time > 1.0);
    }
}
