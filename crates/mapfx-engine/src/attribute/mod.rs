//! Instanced attributes.
//!
//! A layer declares [`AttributeDescriptor`]s against its record type; the
//! [`AttributeManager`] turns the record array into one packed `f32` buffer per
//! attribute and recomputes only what a prop change or a new record array
//! invalidates.

mod descriptor;
mod manager;

pub use descriptor::{Accessor, AttributeDescriptor, AttributeValue};
pub use manager::{AttributeBuffer, AttributeManager};

pub(crate) use descriptor::wgsl_float_type;
