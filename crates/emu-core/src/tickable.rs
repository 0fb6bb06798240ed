//! Trait for components advanced by master clock ticks.

use crate::Ticks;

/// A component advanced one master clock tick at a time.
///
/// Used by units that have no bus of their own, such as the video shell.
pub trait Tickable {
    /// Advance by one master clock tick.
    fn tick(&mut self);

    /// Advance by `count` ticks. Overrides must match calling `tick()` in a
    /// loop.
    fn tick_n(&mut self, count: Ticks) {
        for _ in 0..count.get() {
            self.tick();
        }
    }
}
