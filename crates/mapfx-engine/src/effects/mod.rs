//! Built-in effects.
//!
//! Each constructor returns a plain [`Effect`](crate::layer::Effect) value; combine
//! them with a base through [`extend`](crate::layer::extend):
//!
//! ```ignore
//! let layer = extend(
//!     "airports",
//!     ScatterLayer::new(|a: &Airport| a.lnglat),
//!     vec![shape_mask(|a: &Airport| a.kind as f32)?, pulse()],
//!     airports,
//!     Props::new(),
//! )?;
//! ```

mod contrast;
mod pulse;
mod shape_mask;

pub use contrast::contrast;
pub use pulse::{DEFAULT_RED_SHIFT, PULSE_AMPLITUDE, PULSE_RATE, pulse, pulse_scale};
pub use shape_mask::{
    Coverage, DEFAULT_FADE_DISTANCE, SHAPE_CROSS, SHAPE_DIAMOND, SHAPE_SQUARE, classify, shape_mask,
};
