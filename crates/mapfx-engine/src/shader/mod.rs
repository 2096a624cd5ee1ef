//! Shader composition.
//!
//! A base layer owns a WGSL [`ShaderTemplate`] with `//#hook <name>` markers.
//! Effects contribute [`ShaderInjections`]; [`ShaderProgramSpec::extend`] appends
//! them after the base's fragments and [`compose`] splices everything into one
//! module. [`ProgramCache`] validates the result with naga once per distinct
//! injection set.
//!
//! Hook conventions used by the built-in base layers:
//! - `decl`: module-scope declarations (constants, helper functions)
//! - `main-end`: end of `vs_main` / `fs_main`, `out` already populated
//! - `filter_size` (vertex) / `filter_color` (fragment): statements mutating
//!   `size` / `color`; later fragments see earlier writes
//! - `uniforms`, `instance-attributes`, `varyings`: struct members generated
//!   by the layer from its declarations

mod compile;
mod compose;
mod program;
mod template;

pub use compile::{CompiledProgram, FRAGMENT_ENTRY, ProgramCache, VERTEX_ENTRY, compile};
pub use compose::{ComposedProgram, ProgramFingerprint, compose};
pub use program::{Fragment, InjectionPoint, ShaderInjections, ShaderProgramSpec};
pub use template::{HOOK_MARKER, Section, ShaderTemplate, Stage, parse_key};

/// Hook receiving generated `LayerUniforms` members.
pub const UNIFORMS_HOOK: &str = "uniforms";
/// Hook receiving generated `InstanceInput` members.
pub const ATTRIBUTES_HOOK: &str = "instance-attributes";
/// Hook receiving generated `VertexOutput` members.
pub const VARYINGS_HOOK: &str = "varyings";
