//! Frame timestep measurement and clamping.

use std::time::Instant;

/// Longest frame gap fed into the integrator. Anything beyond this (a
/// background tab, a debugger pause) would destabilize the explicit
/// integration, so the fallback step is substituted instead.
pub const MAX_FRAME_GAP: f32 = 0.1;

/// Nominal step used on the first frame and whenever the raw gap is
/// rejected.
pub const FALLBACK_DT: f32 = 1.0 / 60.0;

/// Measures the wall-clock gap between frames and clamps it.
#[derive(Debug, Default)]
pub struct TimestepClock {
    last: Option<Instant>,
}

impl TimestepClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measure the gap since the previous tick and return the clamped
    /// timestep for this frame.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let raw = self.last.map(|last| (now - last).as_secs_f32());
        self.last = Some(now);
        Self::clamp(raw)
    }

    /// The clamping rule: `None` (first frame), non-positive, or
    /// over-long gaps all collapse to [`FALLBACK_DT`].
    pub fn clamp(raw: Option<f32>) -> f32 {
        match raw {
            Some(gap) if gap > 0.0 && gap <= MAX_FRAME_GAP => gap,
            _ => FALLBACK_DT,
        }
    }
}
