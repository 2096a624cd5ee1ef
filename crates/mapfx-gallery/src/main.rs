//! Map effect gallery. Keys 1-4 switch demos, Esc quits.

mod demos;
mod source;

use std::sync::Arc;

use anyhow::Result;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use mapfx_engine::core::{App, AppControl, FrameCtx};
use mapfx_engine::device::GpuInit;
use mapfx_engine::layer::{FrameContext, FrameReport, LayerStack};
use mapfx_engine::logging::{LoggingConfig, init_logging};
use mapfx_engine::map::MapView;
use mapfx_engine::render::LayerRenderer;
use mapfx_engine::tile::{TileConfig, TileSource};
use mapfx_engine::window::{Runtime, RuntimeConfig};

use demos::Demo;
use source::ProceduralSource;

const CLEAR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.07,
    b: 0.12,
    a: 1.0,
};

struct Gallery {
    source: Arc<dyn TileSource>,
    stack: LayerStack,
    renderer: LayerRenderer,
    demo: Demo,
    view: MapView,
    switch_to: Option<Demo>,
}

impl Gallery {
    fn new(source: Arc<dyn TileSource>) -> Result<Self> {
        let demo = Demo::ShapedPoints;
        let mut stack = LayerStack::new();
        demo.populate(&mut stack, &source)?;
        Ok(Self {
            source,
            stack,
            renderer: LayerRenderer::new(),
            demo,
            view: demo.view(),
            switch_to: None,
        })
    }

    fn switch(&mut self, demo: Demo) {
        if let Err(e) = demo.populate(&mut self.stack, &self.source) {
            log::error!("demo `{}` failed to build: {e:#}", demo.title());
            return;
        }
        log::info!("demo: {}", demo.title());
        self.demo = demo;
        self.view = demo.view();
    }
}

impl App for Gallery {
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }
        let slot = match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => return AppControl::Exit,
            PhysicalKey::Code(KeyCode::Digit1) => 1,
            PhysicalKey::Code(KeyCode::Digit2) => 2,
            PhysicalKey::Code(KeyCode::Digit3) => 3,
            PhysicalKey::Code(KeyCode::Digit4) => 4,
            _ => return AppControl::Continue,
        };
        self.switch_to = Demo::from_slot(slot).filter(|d| *d != self.demo);
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if let Some(demo) = self.switch_to.take() {
            self.switch(demo);
            ctx.runtime.set_title(format!("mapfx gallery: {}", self.demo.title()));
            ctx.runtime.reset_clock();
        }

        let frame = FrameContext {
            clock: ctx.clock,
            view: self.view.with_viewport(ctx.viewport()),
        };
        let (stack, renderer) = (&mut self.stack, &mut self.renderer);
        let mut report = FrameReport::default();

        let control = ctx.render(|rctx, target| {
            report = stack.render_frame(&frame, &mut renderer.sink(rctx));
            renderer.encode(rctx, target, Some(CLEAR));
        });

        for err in &report.tile_errors {
            log::warn!("{err}");
        }
        if !report.skipped.is_empty() || !report.omitted.is_empty() {
            log::debug!(
                "frame {}: {} drawn, {} skipped, {} omitted",
                frame.clock.frame_index,
                report.drawn,
                report.skipped.len(),
                report.omitted.len()
            );
        }
        control
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let source: Arc<dyn TileSource> = Arc::new(ProceduralSource::spawn(TileConfig::default().tile_size)?);
    let gallery = Gallery::new(source)?;

    let config = RuntimeConfig {
        title: format!("mapfx gallery: {}", gallery.demo.title()),
        ..RuntimeConfig::default()
    };
    Runtime::run(config, GpuInit::default(), gallery)
}
