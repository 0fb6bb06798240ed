//! The three APU timers.
//!
//! Timers 0 and 1 are clocked every 128 APU cycles (8 kHz), timer 2 every
//! 16 (64 kHz). An enabled timer counts its divider up to the target in
//! $FA-$FC (0 means 256), then bumps a 4-bit counter that the driver reads
//! at $FD-$FF. Reading the counter clears it.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    /// APU cycles between divider steps.
    period: u8,
    /// Cycles left until the next divider step.
    cycles: u8,
    pub enabled: bool,
    pub divider: u8,
    pub target: u8,
    counter: u8,
}

impl Timer {
    #[must_use]
    pub const fn new(period: u8) -> Self {
        Self {
            period,
            cycles: 0,
            enabled: false,
            divider: 0,
            target: 0,
            counter: 0,
        }
    }

    /// Advance one APU cycle.
    pub fn tick(&mut self) {
        if self.cycles == 0 {
            self.cycles = self.period;
            if self.enabled {
                self.divider = self.divider.wrapping_add(1);
                if self.divider == self.target {
                    self.divider = 0;
                    self.counter = (self.counter + 1) & 0x0F;
                }
            }
        }
        self.cycles -= 1;
    }

    /// $F1 enable bit. A 0 to 1 transition restarts the divider and counter.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.divider = 0;
            self.counter = 0;
        }
        self.enabled = enabled;
    }

    /// Counter value without the read side effect.
    #[must_use]
    pub const fn counter(&self) -> u8 {
        self.counter
    }

    /// Counter read from the SPC side, which clears it.
    pub fn read_counter(&mut self) -> u8 {
        std::mem::take(&mut self.counter)
    }
}
