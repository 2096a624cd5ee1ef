use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ShaderCompileError;

use super::template::{Section, ShaderTemplate, Stage, parse_key};

/// One registered fragment: `(stage, section, text, registration order)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    pub stage: Stage,
    pub section: Section,
    pub source: String,
    pub order: u32,
}

/// Registration-ordered list of shader injections contributed by one effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderInjections {
    points: Vec<InjectionPoint>,
}

impl ShaderInjections {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`push`](Self::push).
    pub fn inject(mut self, stage: Stage, section: Section, source: impl Into<String>) -> Self {
        self.push(stage, section, source);
        self
    }

    /// Registers a fragment by injection key (`vs:#decl`, `fs:filter_color`).
    ///
    /// Returns `None` for a malformed key.
    pub fn inject_key(self, key: &str, source: impl Into<String>) -> Option<Self> {
        let (stage, section) = parse_key(key)?;
        Some(self.inject(stage, section, source))
    }

    pub fn push(&mut self, stage: Stage, section: Section, source: impl Into<String>) {
        let order = self.points.len() as u32;
        self.points.push(InjectionPoint {
            stage,
            section,
            source: source.into(),
            order,
        });
    }

    /// Appends `other` after every point already registered.
    pub fn append(&mut self, other: &ShaderInjections) {
        for p in &other.points {
            self.push(p.stage, p.section.clone(), p.source.clone());
        }
    }

    #[inline]
    pub fn points(&self) -> &[InjectionPoint] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A fragment stored in a program spec, tagged with who contributed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub origin: String,
    pub source: String,
    pub order: u32,
}

/// Base template plus the fragments merged into each `(stage, section)`.
///
/// Section order comes from the template; fragment order inside a section is
/// the order of [`push`](Self::push) calls and is never re-sorted.
#[derive(Debug, Clone)]
pub struct ShaderProgramSpec {
    template: Arc<ShaderTemplate>,
    fragments: BTreeMap<(Stage, Section), Vec<Fragment>>,
    next_order: u32,
}

impl ShaderProgramSpec {
    pub fn new(template: Arc<ShaderTemplate>) -> Self {
        Self {
            template,
            fragments: BTreeMap::new(),
            next_order: 0,
        }
    }

    #[inline]
    pub fn template(&self) -> &ShaderTemplate {
        &self.template
    }

    /// Fragments of one section in registration order.
    pub fn fragments(&self, stage: Stage, section: &Section) -> &[Fragment] {
        self.fragments
            .get(&(stage, section.clone()))
            .map_or(&[], Vec::as_slice)
    }

    /// Total number of fragments across all sections.
    pub fn fragment_count(&self) -> usize {
        self.fragments.values().map(Vec::len).sum()
    }

    /// Appends a fragment after everything already in its section.
    pub fn push(
        &mut self,
        origin: &str,
        stage: Stage,
        section: Section,
        source: impl Into<String>,
    ) -> Result<(), ShaderCompileError> {
        if !self.template.has_section(stage, &section) {
            return Err(ShaderCompileError::UnknownSection {
                layer: origin.to_string(),
                template: self.template.name().to_string(),
                stage: stage.to_string(),
                section: section.to_string(),
            });
        }

        let order = self.next_order;
        self.next_order += 1;
        self.fragments.entry((stage, section)).or_default().push(Fragment {
            origin: origin.to_string(),
            source: source.into(),
            order,
        });
        Ok(())
    }

    /// Returns a new spec with `injections` appended after this spec's fragments.
    ///
    /// Nesting is linear: extending an extended spec appends again, so every
    /// layer's fragments land strictly after its base's.
    pub fn extend(
        &self,
        origin: &str,
        injections: &ShaderInjections,
    ) -> Result<Self, ShaderCompileError> {
        let mut next = self.clone();
        for p in injections.points() {
            next.push(origin, p.stage, p.section.clone(), p.source.clone())?;
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Arc<ShaderTemplate> {
        Arc::new(
            ShaderTemplate::new(
                "t",
                "//#hook decl\n//#hook main-end\n",
                "//#hook decl\n//#hook filter_color\n",
            )
            .unwrap(),
        )
    }

    #[test]
    fn extend_appends_after_base_fragments() {
        let mut base = ShaderProgramSpec::new(template());
        base.push("base", Stage::Fragment, Section::hook("filter_color"), "color.r = 1.0;")
            .unwrap();

        let a = ShaderInjections::new().inject(
            Stage::Fragment,
            Section::hook("filter_color"),
            "color.g = 1.0;",
        );
        let b = ShaderInjections::new().inject(
            Stage::Fragment,
            Section::hook("filter_color"),
            "color.b = 1.0;",
        );

        let nested = base.extend("a", &a).unwrap().extend("b", &b).unwrap();
        let sources: Vec<&str> = nested
            .fragments(Stage::Fragment, &Section::hook("filter_color"))
            .iter()
            .map(|f| f.source.as_str())
            .collect();

        assert_eq!(sources, ["color.r = 1.0;", "color.g = 1.0;", "color.b = 1.0;"]);
        // Extension never mutates the spec it extends.
        assert_eq!(base.fragment_count(), 1);
    }

    #[test]
    fn unknown_section_is_a_compile_error() {
        let spec = ShaderProgramSpec::new(template());
        let bad = ShaderInjections::new().inject(Stage::Vertex, Section::hook("filter_size"), "size = 2.0;");
        let err = spec.extend("pulse", &bad).unwrap_err();
        assert!(matches!(err, ShaderCompileError::UnknownSection { ref section, .. } if section == "filter_size"));
    }

    #[test]
    fn append_renumbers_in_registration_order() {
        let mut a = ShaderInjections::new().inject(Stage::Vertex, Section::Declarations, "a");
        let b = ShaderInjections::new()
            .inject(Stage::Vertex, Section::Declarations, "b")
            .inject(Stage::Vertex, Section::MainEnd, "c");
        a.append(&b);

        let orders: Vec<(u32, &str)> = a.points().iter().map(|p| (p.order, p.source.as_str())).collect();
        assert_eq!(orders, [(0, "a"), (1, "b"), (2, "c")]);
    }

    #[test]
    fn injection_keys_map_to_sections() {
        let inj = ShaderInjections::new()
            .inject_key("vs:#decl", "const K: f32 = 1.0;")
            .and_then(|i| i.inject_key("fs:filter_color", "color.a = 0.5;"))
            .unwrap();
        assert_eq!(inj.points()[0].section, Section::Declarations);
        assert_eq!(inj.points()[1].stage, Stage::Fragment);
        assert_eq!(inj.points()[1].section, Section::hook("filter_color"));

        assert!(ShaderInjections::new().inject_key("gs:#decl", "x").is_none());
    }
}
