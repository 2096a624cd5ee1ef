use std::fmt;

use crate::error::ShaderCompileError;

/// Prefix of a hook marker line inside a template stage.
///
/// A marker occupies a whole line: `//#hook filter_color`.
pub const HOOK_MARKER: &str = "//#hook ";

/// Programmable pipeline stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Vertex, Stage::Fragment];

    /// Short prefix used in injection keys (`vs:#decl`, `fs:filter_color`).
    #[inline]
    pub const fn prefix(self) -> &'static str {
        match self {
            Stage::Vertex => "vs",
            Stage::Fragment => "fs",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "vs" => Some(Stage::Vertex),
            "fs" => Some(Stage::Fragment),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Named location inside a stage where fragments are inserted.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// Module-scope declarations, after the base declarations.
    Declarations,
    /// End of the entry point body, after the base has written its outputs.
    MainEnd,
    /// Named filter hook: statements mutating a shared variable (`color`, `size`).
    Hook(String),
}

impl Section {
    #[inline]
    pub fn hook(name: impl Into<String>) -> Self {
        Section::Hook(name.into())
    }

    /// Maps a marker name (`decl`, `#decl`, `main-end`, `filter_color`) to a section.
    pub fn from_marker(name: &str) -> Self {
        match name.trim().trim_start_matches('#') {
            "decl" => Section::Declarations,
            "main-end" => Section::MainEnd,
            other => Section::Hook(other.to_string()),
        }
    }

    pub fn marker(&self) -> &str {
        match self {
            Section::Declarations => "decl",
            Section::MainEnd => "main-end",
            Section::Hook(name) => name,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Declarations => f.write_str("#decl"),
            Section::MainEnd => f.write_str("#main-end"),
            Section::Hook(name) => f.write_str(name),
        }
    }
}

/// Parses an injection key such as `vs:#decl` or `fs:filter_color`.
pub fn parse_key(key: &str) -> Option<(Stage, Section)> {
    let (prefix, name) = key.split_once(':')?;
    let stage = Stage::from_prefix(prefix.trim())?;
    let name = name.trim();
    if name.is_empty() || name == "#" {
        return None;
    }
    Some((stage, Section::from_marker(name)))
}

/// WGSL source of a base program with hook markers.
///
/// The vertex stage text comes first in the final module and usually carries the
/// shared structs (uniform block, instance input, varyings); the fragment stage
/// text follows it.
#[derive(Debug, Clone)]
pub struct ShaderTemplate {
    name: String,
    vertex: String,
    fragment: String,
    vertex_hooks: Vec<Section>,
    fragment_hooks: Vec<Section>,
    textured: bool,
    base_varyings: u32,
}

impl ShaderTemplate {
    pub fn new(
        name: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Result<Self, ShaderCompileError> {
        let name = name.into();
        let vertex = vertex.into();
        let fragment = fragment.into();

        let vertex_hooks = scan_hooks(&name, Stage::Vertex, &vertex)?;
        let fragment_hooks = scan_hooks(&name, Stage::Fragment, &fragment)?;

        Ok(Self {
            name,
            vertex,
            fragment,
            vertex_hooks,
            fragment_hooks,
            textured: false,
            base_varyings: 0,
        })
    }

    /// Marks the template as sampling a bitmap at bindings 1 (texture) and 2 (sampler).
    pub fn textured(mut self, textured: bool) -> Self {
        self.textured = textured;
        self
    }

    /// Number of `@location` varyings the base already uses in `VertexOutput`.
    pub fn with_base_varyings(mut self, count: u32) -> Self {
        self.base_varyings = count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_textured(&self) -> bool {
        self.textured
    }

    pub fn base_varyings(&self) -> u32 {
        self.base_varyings
    }

    pub fn source(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }

    /// Hook sections of `stage`, in marker order.
    pub fn sections(&self, stage: Stage) -> &[Section] {
        match stage {
            Stage::Vertex => &self.vertex_hooks,
            Stage::Fragment => &self.fragment_hooks,
        }
    }

    pub fn has_section(&self, stage: Stage, section: &Section) -> bool {
        self.sections(stage).contains(section)
    }
}

fn scan_hooks(template: &str, stage: Stage, src: &str) -> Result<Vec<Section>, ShaderCompileError> {
    let mut hooks: Vec<Section> = Vec::new();
    for line in src.lines() {
        let Some(name) = line.trim_start().strip_prefix(HOOK_MARKER) else { continue };
        let section = Section::from_marker(name);
        if hooks.contains(&section) {
            return Err(ShaderCompileError::DuplicateHook {
                template: template.to_string(),
                stage: stage.to_string(),
                section: section.to_string(),
            });
        }
        hooks.push(section);
    }
    Ok(hooks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_are_listed_in_marker_order() {
        let t = ShaderTemplate::new(
            "t",
            "//#hook decl\nfn a() {}\n    //#hook filter_size\n",
            "//#hook decl\n//#hook filter_color\n//#hook main-end\n",
        )
        .unwrap();

        assert_eq!(
            t.sections(Stage::Vertex),
            &[Section::Declarations, Section::hook("filter_size")]
        );
        assert_eq!(
            t.sections(Stage::Fragment),
            &[Section::Declarations, Section::hook("filter_color"), Section::MainEnd]
        );
        assert!(!t.has_section(Stage::Vertex, &Section::MainEnd));
    }

    #[test]
    fn duplicate_marker_is_rejected() {
        let err = ShaderTemplate::new("t", "//#hook decl\n//#hook decl\n", "").unwrap_err();
        assert!(matches!(err, ShaderCompileError::DuplicateHook { .. }));
    }

    #[test]
    fn parse_key_accepts_deck_style_keys() {
        assert_eq!(parse_key("vs:#decl"), Some((Stage::Vertex, Section::Declarations)));
        assert_eq!(parse_key("fs:#main-end"), Some((Stage::Fragment, Section::MainEnd)));
        assert_eq!(
            parse_key("fs:filter_color"),
            Some((Stage::Fragment, Section::hook("filter_color")))
        );
        assert_eq!(parse_key("gs:#decl"), None);
        assert_eq!(parse_key("vs:"), None);
        assert_eq!(parse_key("decl"), None);
    }
}
