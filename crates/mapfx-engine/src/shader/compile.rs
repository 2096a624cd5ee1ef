use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ShaderCompileError;

use super::compose::{ComposedProgram, ProgramFingerprint};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// A composed program that passed WGSL parsing and validation.
#[derive(Debug)]
pub struct CompiledProgram {
    composed: ComposedProgram,
    module: naga::Module,
}

impl CompiledProgram {
    pub fn source(&self) -> &str {
        self.composed.source()
    }

    pub fn composed(&self) -> &ComposedProgram {
        &self.composed
    }

    pub fn fingerprint(&self) -> ProgramFingerprint {
        self.composed.fingerprint()
    }

    pub fn is_textured(&self) -> bool {
        self.composed.is_textured()
    }

    pub fn has_entry_point(&self, name: &str) -> bool {
        self.module.entry_points.iter().any(|ep| ep.name == name)
    }
}

/// Parses and validates a composed module with naga.
pub fn compile(layer: &str, composed: ComposedProgram) -> Result<CompiledProgram, ShaderCompileError> {
    let source = composed.source();

    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderCompileError::Parse {
        layer: layer.to_string(),
        diagnostic: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator
        .validate(&module)
        .map_err(|e| ShaderCompileError::Validation {
            layer: layer.to_string(),
            diagnostic: e.emit_to_string(source),
        })?;

    let program = CompiledProgram { composed, module };
    for entry in [VERTEX_ENTRY, FRAGMENT_ENTRY] {
        if !program.has_entry_point(entry) {
            return Err(ShaderCompileError::Validation {
                layer: layer.to_string(),
                diagnostic: format!("missing entry point `{entry}`"),
            });
        }
    }
    Ok(program)
}

/// Compiled programs keyed by composed-source fingerprint.
///
/// Failures are cached too: a broken injection set is not recompiled every frame.
#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: HashMap<ProgramFingerprint, Result<Arc<CompiledProgram>, ShaderCompileError>>,
    compilations: u64,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached program for `composed`, compiling it on first sight.
    pub fn get_or_compile(
        &mut self,
        layer: &str,
        composed: ComposedProgram,
    ) -> Result<Arc<CompiledProgram>, ShaderCompileError> {
        let key = composed.fingerprint();
        if let Some(entry) = self.entries.get(&key) {
            return entry.clone().map_err(|e| e.for_layer(layer));
        }

        self.compilations += 1;
        let result = compile(layer, composed).map(Arc::new);
        match &result {
            Ok(_) => log::debug!("compiled program {key} for layer `{layer}`"),
            Err(e) => log::debug!("program {key} failed to compile: {e}"),
        }
        self.entries.insert(key, result.clone());
        result
    }

    /// Number of real compilations performed (cache misses).
    pub fn compilations(&self) -> u64 {
        self.compilations
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
