use std::fmt;

use xxhash_rust::xxh3::Xxh3;

use super::program::ShaderProgramSpec;
use super::template::{HOOK_MARKER, Section, Stage};

const XXH3_SEED: u64 = 0x6d61_7066_785f_7367;

/// Stable identity of a composed program. Equal injection sets give equal fingerprints.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ProgramFingerprint(pub u64);

impl fmt::Display for ProgramFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Merged WGSL for both stages of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedProgram {
    template: String,
    vertex: String,
    fragment: String,
    module: String,
    textured: bool,
    fingerprint: ProgramFingerprint,
}

impl ComposedProgram {
    pub fn template_name(&self) -> &str {
        &self.template
    }

    /// Merged text of one stage.
    pub fn stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }

    /// Full WGSL module: vertex stage text followed by fragment stage text.
    pub fn source(&self) -> &str {
        &self.module
    }

    pub fn is_textured(&self) -> bool {
        self.textured
    }

    pub fn fingerprint(&self) -> ProgramFingerprint {
        self.fingerprint
    }
}

/// Replaces every hook marker of the template with the program's fragments.
///
/// Each fragment is emitted verbatim on its own lines, preceded by a comment
/// naming its origin. Empty sections leave only the marker comment behind.
pub fn compose(spec: &ShaderProgramSpec) -> ComposedProgram {
    let vertex = compose_stage(spec, Stage::Vertex);
    let fragment = compose_stage(spec, Stage::Fragment);

    let mut module = String::with_capacity(vertex.len() + fragment.len() + 1);
    module.push_str(&vertex);
    if !module.ends_with('\n') {
        module.push('\n');
    }
    module.push_str(&fragment);

    let template = spec.template();
    let mut h = Xxh3::with_seed(XXH3_SEED);
    h.update(template.name().as_bytes());
    h.update(&[0, u8::from(template.is_textured())]);
    h.update(module.as_bytes());

    ComposedProgram {
        template: template.name().to_string(),
        vertex,
        fragment,
        module,
        textured: template.is_textured(),
        fingerprint: ProgramFingerprint(h.digest()),
    }
}

fn compose_stage(spec: &ShaderProgramSpec, stage: Stage) -> String {
    let src = spec.template().source(stage);
    let mut out = String::with_capacity(src.len() + 512);

    for line in src.lines() {
        let trimmed = line.trim_start();
        let Some(name) = trimmed.strip_prefix(HOOK_MARKER) else {
            out.push_str(line);
            out.push('\n');
            continue;
        };

        let indent = &line[..line.len() - trimmed.len()];
        let section = Section::from_marker(name);
        out.push_str(indent);
        out.push_str("// ");
        out.push_str(&section.to_string());
        out.push('\n');

        for frag in spec.fragments(stage, &section) {
            out.push_str(indent);
            out.push_str("// from ");
            out.push_str(&frag.origin);
            out.push('\n');
            out.push_str(frag.source.trim_matches('\n'));
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::shader::{ShaderInjections, ShaderTemplate};

    fn spec() -> ShaderProgramSpec {
        let t = ShaderTemplate::new(
            "t",
            "struct S { x: f32 };\n//#hook decl\nfn vs() {\n    var size = 1.0;\n    //#hook filter_size\n    //#hook main-end\n}\n",
            "//#hook decl\nfn fs() {\n    var color = vec4<f32>(1.0);\n    //#hook filter_color\n}\n",
        )
        .unwrap();
        ShaderProgramSpec::new(Arc::new(t))
    }

    fn position(haystack: &str, needle: &str) -> usize {
        haystack
            .find(needle)
            .unwrap_or_else(|| panic!("`{needle}` missing from composed source"))
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn each_fragment_appears_once_in_its_section_in_order() {
        let inj = ShaderInjections::new()
            .inject(Stage::Vertex, Section::Declarations, "const A_DECL: f32 = 1.0;")
            .inject(Stage::Vertex, Section::hook("filter_size"), "size = size * 2.0;")
            .inject(Stage::Vertex, Section::Declarations, "const B_DECL: f32 = 2.0;")
            .inject(Stage::Fragment, Section::hook("filter_color"), "color.r = 0.5;")
            .inject(Stage::Vertex, Section::MainEnd, "let tail = size;");
        let composed = compose(&spec().extend("fx", &inj).unwrap());

        for p in inj.points() {
            let stage_src = composed.stage(p.stage);
            assert_eq!(stage_src.matches(p.source.as_str()).count(), 1, "{}", p.source);
            assert_eq!(composed.source().matches(p.source.as_str()).count(), 1);
        }

        let vs = composed.stage(Stage::Vertex);
        assert!(position(vs, "struct S") < position(vs, "A_DECL"));
        assert!(position(vs, "A_DECL") < position(vs, "B_DECL"));
        assert!(position(vs, "B_DECL") < position(vs, "fn vs()"));
        assert!(position(vs, "var size") < position(vs, "size = size * 2.0;"));
        assert!(position(vs, "size = size * 2.0;") < position(vs, "let tail"));
        assert!(!vs.contains("color.r = 0.5;"));
    }

    #[test]
    fn conflicting_color_hooks_keep_registration_order() {
        let a = "if (color.a > 0.5) {\n        color = vec4<f32>(1.0, 0.0, 0.0, 1.0);\n    }";
        let b = "if (color.a > 0.5) {\n        color = vec4<f32>(0.0, 0.0, 1.0, 1.0);\n    }";
        let spec = spec()
            .extend("a", &ShaderInjections::new().inject(Stage::Fragment, Section::hook("filter_color"), a))
            .unwrap()
            .extend("b", &ShaderInjections::new().inject(Stage::Fragment, Section::hook("filter_color"), b))
            .unwrap();
        let fs = compose(&spec).stage(Stage::Fragment).to_string();

        let a_start = position(&fs, a);
        let b_start = position(&fs, b);
        // B begins only after A's last statement; nothing of B sits inside A.
        assert!(a_start + a.len() <= b_start);
        assert!(!fs[a_start..a_start + a.len()].contains("0.0, 0.0, 1.0"));
    }

    // ── fingerprint ───────────────────────────────────────────────────────

    #[test]
    fn fingerprint_tracks_injection_set() {
        let inj = ShaderInjections::new().inject(Stage::Fragment, Section::hook("filter_color"), "color.r = 0.5;");
        let one = compose(&spec().extend("fx", &inj).unwrap());
        let two = compose(&spec().extend("fx", &inj).unwrap());
        let base = compose(&spec());

        assert_eq!(one.fingerprint(), two.fingerprint());
        assert_ne!(one.fingerprint(), base.fingerprint());
    }

    #[test]
    fn markers_are_replaced_not_kept() {
        let composed = compose(&spec());
        assert!(!composed.source().contains(HOOK_MARKER));
        assert!(composed.source().contains("// filter_color"));
    }
}
