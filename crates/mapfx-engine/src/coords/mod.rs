//! Screen-space sizes.
//!
//! Logical pixels, origin top-left, +Y down. Geographic coordinates live in
//! [`map`](crate::map).

mod viewport;

pub use viewport::Viewport;
