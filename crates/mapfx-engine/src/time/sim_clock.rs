/// Simulation clock configuration.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClockConfig {
    /// Simulated seconds added per tick.
    pub step: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { step: 1.0 / 60.0 }
    }
}

/// Clock snapshot handed to uniform providers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClockReading {
    /// Simulated time in seconds.
    pub time: f32,

    /// Number of ticks taken before this reading.
    pub frame_index: u64,
}

/// Fixed-step simulation clock.
///
/// Time advances by exactly `step` per `tick()`, independent of wall time, so
/// animated uniforms are reproducible. The runtime ticks once per scheduled
/// redraw.
#[derive(Debug, Clone)]
pub struct SimClock {
    step: f32,
    time: f64,
    frame_index: u64,
}

impl SimClock {
    pub fn new(config: ClockConfig) -> Self {
        let step = if config.step.is_finite() && config.step > 0.0 {
            config.step
        } else {
            log::warn!("invalid clock step {}; using default", config.step);
            ClockConfig::default().step
        };
        Self {
            step,
            time: 0.0,
            frame_index: 0,
        }
    }

    /// Current reading without advancing.
    pub fn reading(&self) -> ClockReading {
        ClockReading {
            time: self.time as f32,
            frame_index: self.frame_index,
        }
    }

    /// Returns the current reading and advances by one step.
    pub fn tick(&mut self) -> ClockReading {
        let reading = self.reading();
        self.time += f64::from(self.step);
        self.frame_index = self.frame_index.wrapping_add(1);
        reading
    }

    /// Rewinds to time zero.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.frame_index = 0;
    }

    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_advance_by_fixed_step() {
        let mut clock = SimClock::new(ClockConfig { step: 0.5 });
        assert_eq!(clock.tick(), ClockReading { time: 0.0, frame_index: 0 });
        assert_eq!(clock.tick(), ClockReading { time: 0.5, frame_index: 1 });
        assert_eq!(clock.reading(), ClockReading { time: 1.0, frame_index: 2 });
    }

    #[test]
    fn invalid_step_falls_back_to_default() {
        assert_eq!(SimClock::new(ClockConfig { step: 0.0 }).step(), 1.0 / 60.0);
        assert_eq!(SimClock::new(ClockConfig { step: f32::NAN }).step(), 1.0 / 60.0);
    }

    #[test]
    fn reset_rewinds() {
        let mut clock = SimClock::default();
        clock.tick();
        clock.tick();
        clock.reset();
        assert_eq!(clock.reading().frame_index, 0);
        assert_eq!(clock.reading().time, 0.0);
    }
}
