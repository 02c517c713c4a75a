use std::time::Instant;

/// Measured frame cadence, reported every half second.
pub struct FrameTiming {
    last_fps_time: Instant,
    frame_count: u32,
    fps: Option<f32>,
}

impl FrameTiming {
    pub fn new(now: Instant) -> Self {
        Self {
            last_fps_time: now,
            frame_count: 0,
            fps: None,
        }
    }

    /// Last measured rate, once half a second of frames has been seen.
    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    /// Returns true when a new fps sample was taken.
    pub fn update(&mut self, now: Instant) -> bool {
        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            self.fps = Some(self.frame_count as f32 / elapsed.as_secs_f32());
            self.frame_count = 0;
            self.last_fps_time = now;
            return true;
        }
        false
    }
}
