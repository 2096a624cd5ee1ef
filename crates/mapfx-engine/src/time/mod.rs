//! Time subsystem.
//!
//! Simulated time is decoupled from wall time:
//! - one `SimClock` per render loop
//! - call `tick()` once per scheduled redraw to obtain a `ClockReading`
//! - readings are passed explicitly to uniform providers

mod sim_clock;

pub use sim_clock::{ClockConfig, ClockReading, SimClock};
