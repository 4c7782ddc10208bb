//! Pointer input tracking.
//!
//! The input collaborator (window event loop) drives a [`PointerTracker`]
//! from its event callbacks; the solver samples it once per frame. The
//! tracker hands out a single consistent snapshot so a frame never sees a
//! position update without its matching velocity update.

use std::sync::Mutex;

/// One consistent pointer sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    /// Position in [0,1]^2, origin at the lower-left corner.
    pub position: [f32; 2],
    /// Per-event position delta, same space as `position`.
    pub velocity: [f32; 2],
    /// Whether the button is held (impulses are applied while active).
    pub active: bool,
}

/// Interior-mutable pointer state shared between the event callbacks and
/// the frame loop.
#[derive(Debug, Default)]
pub struct PointerTracker {
    inner: Mutex<PointerState>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pointer move to `position` (normalized coordinates).
    /// Velocity becomes the delta from the previous position.
    pub fn moved(&self, position: [f32; 2]) {
        let mut state = self.inner.lock().expect("pointer lock poisoned");
        state.velocity = [
            position[0] - state.position[0],
            position[1] - state.position[1],
        ];
        state.position = position;
    }

    pub fn pressed(&self) {
        self.inner.lock().expect("pointer lock poisoned").active = true;
    }

    pub fn released(&self) {
        self.inner.lock().expect("pointer lock poisoned").active = false;
    }

    /// Take one consistent snapshot of the pointer state.
    pub fn snapshot(&self) -> PointerState {
        *self.inner.lock().expect("pointer lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_is_position_delta() {
        let tracker = PointerTracker::new();
        tracker.moved([0.5, 0.5]);
        tracker.moved([0.6, 0.45]);

        let state = tracker.snapshot();
        assert_eq!(state.position, [0.6, 0.45]);
        assert!((state.velocity[0] - 0.1).abs() < 1e-6);
        assert!((state.velocity[1] + 0.05).abs() < 1e-6);
    }

    #[test]
    fn press_release_toggles_active() {
        let tracker = PointerTracker::new();
        assert!(!tracker.snapshot().active);
        tracker.pressed();
        assert!(tracker.snapshot().active);
        tracker.released();
        assert!(!tracker.snapshot().active);
    }

    #[test]
    fn snapshot_is_consistent_across_threads() {
        use std::sync::Arc;

        let tracker = Arc::new(PointerTracker::new());
        let writer = Arc::clone(&tracker);

        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                let t = i as f32 / 1000.0;
                writer.moved([t, t]);
            }
        });

        for _ in 0..1000 {
            let state = tracker.snapshot();
            // Position and velocity were written under the same lock, so
            // position - velocity must equal the previous position, which
            // lies on the same diagonal.
            let prev = [
                state.position[0] - state.velocity[0],
                state.position[1] - state.velocity[1],
            ];
            assert!((prev[0] - prev[1]).abs() < 1e-6);
        }

        handle.join().unwrap();
    }
}
