use crate::layer::Effect;
use crate::shader::{Section, Stage};
use crate::uniform::UniformKind;

/// Angular speed of the pulse, radians per simulated second.
pub const PULSE_RATE: f32 = 5.0;
/// Peak relative growth of the point radius.
pub const PULSE_AMPLITUDE: f32 = 0.5;
/// Amount subtracted from the red channel.
pub const DEFAULT_RED_SHIFT: f32 = 0.9;

/// Radius multiplier at simulated time `time`, as computed in the vertex stage.
pub fn pulse_scale(time: f32, rate: f32, amplitude: f32) -> f32 {
    1.0 + amplitude * (time * rate).sin()
}

/// Pulsing point radius plus a constant red shift.
///
/// `time` is written from the clock reading on every draw. Props:
/// `pulse_rate`, `pulse_amplitude`, `red_shift`. Needs a base with both
/// `filter_size` and `filter_color`, i.e. the scatter layer.
pub fn pulse<R>() -> Effect<R> {
    Effect::new("pulse")
        .uniform("time", UniformKind::F32)
        .uniform("pulse_rate", UniformKind::F32)
        .uniform("pulse_amplitude", UniformKind::F32)
        .uniform("red_shift", UniformKind::F32)
        .provider(|ctx, bag| {
            bag.set_time_varying("time", ctx.clock.time);
            bag.set("pulse_rate", ctx.props.f32_or("pulse_rate", PULSE_RATE));
            bag.set("pulse_amplitude", ctx.props.f32_or("pulse_amplitude", PULSE_AMPLITUDE));
            bag.set("red_shift", ctx.props.f32_or("red_shift", DEFAULT_RED_SHIFT));
        })
        .inject(
            Stage::Vertex,
            Section::hook("filter_size"),
            "    size = size * (1.0 + u.pulse_amplitude * sin(u.time * u.pulse_rate));",
        )
        .inject(
            Stage::Fragment,
            Section::hook("filter_color"),
            "    color.r = max(color.r - u.red_shift, 0.0);",
        )
}
