use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::attribute::AttributeManager;
use crate::error::{AttributeShapeError, LayerError, ShaderCompileError};
use crate::map::view_uniform_slots;
use crate::props::Props;
use crate::shader::{
    ATTRIBUTES_HOOK, CompiledProgram, ComposedProgram, ProgramCache, Section, ShaderProgramSpec, Stage,
    UNIFORMS_HOOK, VARYINGS_HOOK, compose,
};
use crate::uniform::{UniformBag, UniformBinder, UniformLayout};

use super::base::BaseLayer;
use super::effect::{Effect, varying_members};
use super::stack::{DrawCall, DrawSink, FrameReport, Layer};
use super::{DrawContext, FrameContext, LayerId, UniformContext};

/// Origin recorded for struct members the layer generates from its declarations.
pub const GENERATED_ORIGIN: &str = "generated";

/// Compilation status of a layer's program.
#[derive(Debug, Clone)]
pub enum ProgramState {
    /// Not composed yet, or reconfigured.
    Pending,
    Ready {
        program: Arc<CompiledProgram>,
        binder: UniformBinder,
    },
    /// Composition or compilation failed; the layer is not drawn.
    Broken(ShaderCompileError),
}

/// A base layer with its effects applied.
pub struct ExtendedLayer<R, B> {
    id: LayerId,
    base: B,
    effects: Vec<Effect<R>>,
    attributes: AttributeManager<R>,
    props: Props,
    program: ProgramState,
}

/// Builds a layer from a base and effects, in that order.
///
/// Attributes are registered and computed here (base first, then each effect's
/// in order). The program is composed lazily on first draw, so shader errors
/// surface through the frame report instead of this `Result`.
pub fn extend<R, B>(
    id: impl Into<LayerId>,
    base: B,
    effects: Vec<Effect<R>>,
    records: Arc<[R]>,
    props: Props,
) -> Result<ExtendedLayer<R, B>, LayerError>
where
    B: BaseLayer<R>,
{
    let id = id.into();
    let mut attributes = AttributeManager::new(records);

    base.initialize_attributes(&mut attributes)
        .map_err(|e| attribute_error(&id, e))?;
    for effect in &effects {
        for descriptor in effect.attributes() {
            attributes
                .register(descriptor.clone())
                .map_err(|e| attribute_error(&id, e))?;
        }
    }

    log::debug!(
        "layer `{id}`: {} on {} records with {} effects",
        base.kind(),
        attributes.instance_count(),
        effects.len()
    );

    Ok(ExtendedLayer {
        id,
        base,
        effects,
        attributes,
        props,
        program: ProgramState::Pending,
    })
}

fn attribute_error(id: &LayerId, source: AttributeShapeError) -> LayerError {
    LayerError::Attribute {
        layer: id.to_string(),
        source,
    }
}

impl<R, B> ExtendedLayer<R, B>
where
    B: BaseLayer<R>,
{
    #[inline]
    pub fn id(&self) -> &LayerId {
        &self.id
    }

    #[inline]
    pub fn base(&self) -> &B {
        &self.base
    }

    #[inline]
    pub fn effects(&self) -> &[Effect<R>] {
        &self.effects
    }

    #[inline]
    pub fn props(&self) -> &Props {
        &self.props
    }

    #[inline]
    pub fn attributes(&self) -> &AttributeManager<R> {
        &self.attributes
    }

    #[inline]
    pub fn program_state(&self) -> &ProgramState {
        &self.program
    }

    /// Replaces the props and recomputes attributes triggered by the changed keys.
    ///
    /// Returns the names of the recomputed attributes.
    pub fn set_props(&mut self, props: Props) -> Result<Vec<String>, LayerError> {
        let changed: BTreeSet<String> = self.props.changed_keys(&props);
        self.props = props;
        if changed.is_empty() {
            return Ok(Vec::new());
        }
        self.attributes
            .invalidate(&changed)
            .map_err(|e| attribute_error(&self.id, e))
    }

    /// Replaces the record array; a different array recomputes every attribute.
    pub fn set_records(&mut self, records: Arc<[R]>) -> Result<bool, LayerError> {
        self.attributes
            .set_records(records)
            .map_err(|e| attribute_error(&self.id, e))
    }

    /// Composes the layer's program without compiling it.
    ///
    /// Generated members go in first (uniform block, instance inputs, effect
    /// varyings), then the effects' injections in list order.
    pub fn compose_program(&self) -> Result<(ComposedProgram, UniformLayout), ShaderCompileError> {
        let layer = self.id.as_str();

        let layout = UniformLayout::new(
            layer,
            view_uniform_slots()
                .chain(self.base.uniform_slots())
                .chain(self.effects.iter().flat_map(|e| e.uniforms().iter().cloned())),
        )?;

        let mut spec: ShaderProgramSpec = self.base.shader();
        let first_varying = spec.template().base_varyings();

        let mut generated = vec![
            (UNIFORMS_HOOK, layout.wgsl_members()),
            (ATTRIBUTES_HOOK, self.attributes.wgsl_members(1)),
        ];
        let varyings = varying_members(self.effects.iter().flat_map(|e| e.varyings()), first_varying);
        if !varyings.is_empty() {
            generated.push((VARYINGS_HOOK, varyings));
        }
        for (hook, members) in generated {
            spec.push(GENERATED_ORIGIN, Stage::Vertex, Section::hook(hook), members)
                .map_err(|e| e.for_layer(layer))?;
        }

        for effect in &self.effects {
            spec = spec
                .extend(effect.name(), effect.injections())
                .map_err(|e| e.for_layer(layer))?;
        }

        Ok((compose(&spec), layout))
    }

    fn ensure_program(&mut self, programs: &mut ProgramCache) -> Option<(Arc<CompiledProgram>, UniformBinder)> {
        if matches!(self.program, ProgramState::Pending) {
            let result = self.compose_program().and_then(|(composed, layout)| {
                let program = programs.get_or_compile(self.id.as_str(), composed)?;
                Ok((program, UniformBinder::new(Arc::new(layout))))
            });
            self.program = match result {
                Ok((program, binder)) => ProgramState::Ready { program, binder },
                Err(e) => {
                    log::warn!("layer `{}` omitted until reconfigured: {e}", self.id);
                    ProgramState::Broken(e)
                }
            };
        }

        match &self.program {
            ProgramState::Ready { program, binder } => Some((Arc::clone(program), binder.clone())),
            ProgramState::Pending | ProgramState::Broken(_) => None,
        }
    }

    /// Fresh bag for one draw: view uniforms, base hook, then effect providers.
    pub fn uniform_bag(&self, frame: &FrameContext) -> UniformBag {
        let mut bag = UniformBag::new();
        frame.view.write_uniforms(&mut bag);

        let ctx = DrawContext {
            layer: &self.id,
            props: &self.props,
            clock: frame.clock,
            view: &frame.view,
        };
        self.base.draw(&ctx, &mut bag);

        let ctx = UniformContext {
            props: &self.props,
            clock: frame.clock,
        };
        for effect in &self.effects {
            effect.provide(&ctx, &mut bag);
        }
        bag
    }
}

impl<R, B> Layer for ExtendedLayer<R, B>
where
    R: 'static,
    B: BaseLayer<R> + 'static,
{
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn draw(
        &mut self,
        frame: &FrameContext,
        programs: &mut ProgramCache,
        sink: &mut dyn DrawSink,
        report: &mut FrameReport,
    ) {
        let Some((program, binder)) = self.ensure_program(programs) else {
            report.omitted.push(self.id.clone());
            return;
        };

        if !self.attributes.is_fresh() {
            log::debug!("layer `{}`: attributes out of date, not drawn", self.id);
            return;
        }
        let instance_count = self.attributes.instance_count();
        if instance_count == 0 {
            return;
        }

        let bag = self.uniform_bag(frame);
        let block = match binder.bind(&bag) {
            Ok(block) => block,
            Err(e) => {
                log::warn!("layer `{}`: draw skipped this frame: {e}", self.id);
                report.skipped.push((self.id.clone(), e));
                return;
            }
        };

        sink.submit(DrawCall {
            layer: &self.id,
            program: &program,
            attributes: self.attributes.buffers(),
            instance_count: u32::try_from(instance_count).unwrap_or(u32::MAX),
            uniforms: &bag,
            block: &block,
            texture: self.base.texture(),
        });
        report.drawn += 1;
    }

    fn reconfigure(&mut self) {
        self.program = ProgramState::Pending;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::attribute::{AttributeDescriptor, AttributeValue};
    use crate::error::UniformTypeError;
    use crate::layer::testing::*;
    use crate::shader::{Section, Stage, compile};
    use crate::uniform::UniformKind;

    fn render(layer: &mut ExtendedLayer<Dot, DotLayer>, programs: &mut ProgramCache, index: u64) -> (FrameReport, RecordingSink) {
        let mut sink = RecordingSink::default();
        let mut report = FrameReport::default();
        layer.draw(&frame(index), programs, &mut sink, &mut report);
        (report, sink)
    }

    // ── composition ───────────────────────────────────────────────────────

    #[test]
    fn composed_program_validates() {
        let grow = Effect::new("grow")
            .uniform("grow", UniformKind::F32)
            .attribute(AttributeDescriptor::new("weight", 1, |_: &Dot| 1.0.into()).unwrap())
            .varying("v_weight", 1)
            .inject(Stage::Vertex, Section::hook("filter_size"), "    size = size * u.grow * instance.weight;")
            .inject(Stage::Vertex, Section::MainEnd, "    out.v_weight = instance.weight;")
            .inject(Stage::Fragment, Section::hook("filter_color"), "    color.a = color.a * input.v_weight;");
        let layer = extend("grow", DotLayer::new(2.0), vec![grow], dots(2), Props::new()).unwrap();

        let (composed, layout) = layer.compose_program().unwrap();
        assert!(composed.source().contains("@location(2) weight: f32,"));
        assert!(composed.source().contains("@location(1) v_weight: f32,"));
        assert_eq!(layout.offset("grow"), Some(24));
        compile("grow", composed).unwrap();
    }

    #[test]
    fn effect_fragments_follow_base_and_each_other() {
        let a = Effect::<Dot>::new("a").inject(Stage::Fragment, Section::hook("filter_color"), "    color.r = 0.25;");
        let b = Effect::<Dot>::new("b").inject(Stage::Fragment, Section::hook("filter_color"), "    color.r = 0.75;");
        let layer = extend("ab", DotLayer::new(2.0), vec![a, b], dots(1), Props::new()).unwrap();

        let (composed, _) = layer.compose_program().unwrap();
        let fs = composed.stage(Stage::Fragment);
        let var_at = fs.find("var color").unwrap();
        let a_at = fs.find("color.r = 0.25;").unwrap();
        let b_at = fs.find("color.r = 0.75;").unwrap();
        assert!(var_at < a_at && a_at < b_at);
    }

    // ── failure policy ────────────────────────────────────────────────────

    #[test]
    fn broken_program_omits_layer_until_reconfigured() {
        let bad = Effect::<Dot>::new("bad").inject(Stage::Fragment, Section::hook("filter_color"), "    color = undefined_thing;");
        let mut layer = extend("bad", DotLayer::new(2.0), vec![bad], dots(2), Props::new()).unwrap();
        let mut programs = ProgramCache::new();

        let (report, sink) = render(&mut layer, &mut programs, 0);
        assert_eq!(report.omitted, [LayerId::from("bad")]);
        assert!(sink.draws.is_empty());
        assert!(matches!(layer.program_state(), ProgramState::Broken(ShaderCompileError::Parse { .. })));

        // Stays omitted without recompiling.
        render(&mut layer, &mut programs, 1);
        assert_eq!(programs.compilations(), 1);

        layer.reconfigure();
        assert!(matches!(layer.program_state(), ProgramState::Pending));
    }

    #[test]
    fn unknown_section_is_reported_against_the_layer() {
        let fx = Effect::<Dot>::new("fx").inject(Stage::Fragment, Section::hook("filter_size"), "size = 1.0;");
        let layer = extend("dots", DotLayer::new(2.0), vec![fx], dots(1), Props::new()).unwrap();
        let err = layer.compose_program().unwrap_err();
        assert!(matches!(err, ShaderCompileError::UnknownSection { ref layer, .. } if layer == "dots"));
    }

    #[test]
    fn conflicting_uniform_breaks_the_program() {
        let a = Effect::<Dot>::new("a").uniform("dot_size", UniformKind::Vec2);
        let layer = extend("conflict", DotLayer::new(2.0), vec![a], dots(1), Props::new()).unwrap();
        assert!(matches!(
            layer.compose_program().unwrap_err(),
            ShaderCompileError::ConflictingUniform { ref name, .. } if name == "dot_size"
        ));
    }

    #[test]
    fn uniform_type_error_skips_one_frame_only() {
        let flaky = Arc::new(AtomicU32::new(1));
        let f = Arc::clone(&flaky);
        let fx = Effect::<Dot>::new("gain")
            .uniform("gain", UniformKind::F32)
            .provider(move |_, bag| {
                if f.load(Ordering::Relaxed) == 1 {
                    bag.set("gain", [1.0, 1.0]);
                } else {
                    bag.set("gain", 1.0);
                }
            })
            .inject(Stage::Fragment, Section::hook("filter_color"), "    color.g = color.g * u.gain;");
        let mut layer = extend("flaky", DotLayer::new(2.0), vec![fx], dots(2), Props::new()).unwrap();
        let mut programs = ProgramCache::new();

        let (report, sink) = render(&mut layer, &mut programs, 0);
        assert!(sink.draws.is_empty());
        assert!(matches!(report.skipped[0].1, UniformTypeError::KindMismatch { .. }));
        assert!(report.omitted.is_empty());

        flaky.store(0, Ordering::Relaxed);
        let (report, sink) = render(&mut layer, &mut programs, 1);
        assert_eq!(report.drawn, 1);
        assert_eq!(sink.draws.len(), 1);
    }

    #[test]
    fn missing_provider_value_skips_the_draw() {
        let fx = Effect::<Dot>::new("gain")
            .uniform("gain", UniformKind::F32)
            .inject(Stage::Fragment, Section::hook("filter_color"), "    color.g = color.g * u.gain;");
        let mut layer = extend("missing", DotLayer::new(2.0), vec![fx], dots(2), Props::new()).unwrap();
        let mut programs = ProgramCache::new();

        let (report, _) = render(&mut layer, &mut programs, 0);
        assert_eq!(report.skipped[0].1, UniformTypeError::Missing { name: "gain".into() });
    }

    // ── props and records ─────────────────────────────────────────────────

    #[test]
    fn props_flow_into_uniforms_and_triggers() {
        let scale = Arc::new(AtomicU32::new(1));
        let s = Arc::clone(&scale);
        let fx = Effect::<Dot>::new("scaled").attribute(
            AttributeDescriptor::new("scaled", 1, move |d: &Dot| (d.offset[0] * s.load(Ordering::Relaxed) as f32).into())
                .unwrap()
                .with_triggers(["scale"]),
        );
        let mut layer = extend("p", DotLayer::new(2.0), vec![fx], dots(3), Props::new()).unwrap();

        scale.store(2, Ordering::Relaxed);
        assert!(layer.set_props(Props::new().with("dot_size", 6.0)).unwrap().is_empty());
        assert_eq!(layer.attributes().buffer("scaled").unwrap().data(), &[0.0, 10.0, 20.0]);

        let recomputed = layer.set_props(Props::new().with("dot_size", 6.0).with("scale", 2.0)).unwrap();
        assert_eq!(recomputed, ["scaled"]);
        assert_eq!(layer.attributes().buffer("scaled").unwrap().data(), &[0.0, 20.0, 40.0]);

        let bag = layer.uniform_bag(&frame(0));
        assert_eq!(bag.get("dot_size").map(|v| v.data), Some(6.0.into()));
    }

    #[test]
    fn bad_effect_attribute_fails_construction() {
        let fx = Effect::<Dot>::new("fx").attribute(AttributeDescriptor::new("w", 3, |_: &Dot| 1.0.into()).unwrap());
        let err = extend("x", DotLayer::new(1.0), vec![fx], dots(1), Props::new()).err().unwrap();
        assert!(matches!(err, LayerError::Attribute { ref layer, .. } if layer == "x"));
    }

    #[test]
    fn layer_with_a_failed_attribute_is_not_drawn() {
        let fx = Effect::<Dot>::new("fx").attribute(
            AttributeDescriptor::new("w", 1, |d: &Dot| {
                if d.offset[0] > 5.0 { AttributeValue::Vec2([0.0, 0.0]) } else { 1.0.into() }
            })
            .unwrap(),
        );
        let mut layer = extend("mixed", DotLayer::new(1.0), vec![fx], dots(1), Props::new()).unwrap();
        let mut programs = ProgramCache::new();

        let err = layer.set_records(dots(2)).unwrap_err();
        assert!(matches!(err, LayerError::Attribute { ref layer, .. } if layer == "mixed"));

        let (report, sink) = render(&mut layer, &mut programs, 0);
        assert_eq!(report.drawn, 0);
        assert!(sink.draws.is_empty());

        assert!(layer.set_records(dots(1)).unwrap());
        let (report, _) = render(&mut layer, &mut programs, 1);
        assert_eq!(report.drawn, 1);
    }

    #[test]
    fn empty_records_draw_nothing() {
        let mut layer = extend("empty", DotLayer::new(1.0), Vec::new(), dots(0), Props::new()).unwrap();
        let mut programs = ProgramCache::new();
        let (report, sink) = render(&mut layer, &mut programs, 0);
        assert_eq!(report.drawn, 0);
        assert!(sink.draws.is_empty());

        assert!(layer.set_records(dots(4)).unwrap());
        let (report, sink) = render(&mut layer, &mut programs, 1);
        assert_eq!(report.drawn, 1);
        assert_eq!(sink.draws[0].instance_count, 4);
    }
}
