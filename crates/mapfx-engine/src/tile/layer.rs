use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::layer::{
    BaseLayer, DrawSink, Effect, ExtendedLayer, FrameContext, FrameReport, Layer, LayerId, extend,
};
use crate::layers::BitmapLayer;
use crate::map::GeoBounds;
use crate::props::Props;
use crate::shader::ProgramCache;

use super::key::{TileKey, tiles_for_view};
use super::pipeline::{TileImage, TilePipeline};
use super::pixel::PixelTransform;

type TileSubLayer = ExtendedLayer<GeoBounds, BitmapLayer>;

/// Tiled raster drawn as one bitmap sub-layer per composited tile.
///
/// The visible tile set follows the frame's view. Tile results are consumed in
/// `begin_frame`; sub-layers are created for newly composited tiles and dropped
/// for tiles that left the view. Every sub-layer carries the same GPU effects
/// and props, so they share one compiled program.
pub struct TileLayer {
    id: LayerId,
    pipeline: TilePipeline,
    effects: Vec<Effect<GeoBounds>>,
    props: Props,
    order: Vec<TileKey>,
    tiles: HashMap<TileKey, TileSubLayer>,
}

impl TileLayer {
    pub fn new(id: impl Into<LayerId>, pipeline: TilePipeline) -> Self {
        Self {
            id: id.into(),
            pipeline,
            effects: Vec::new(),
            props: Props::new(),
            order: Vec::new(),
            tiles: HashMap::new(),
        }
    }

    /// GPU effects applied to every tile bitmap.
    pub fn with_effects(mut self, effects: Vec<Effect<GeoBounds>>) -> Self {
        self.effects = effects;
        self.tiles.clear();
        self
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    #[inline]
    pub fn pipeline(&self) -> &TilePipeline {
        &self.pipeline
    }

    #[inline]
    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Forwards new props to every tile sub-layer.
    pub fn set_props(&mut self, props: Props) {
        for (key, tile) in &mut self.tiles {
            if let Err(e) = tile.set_props(props.clone()) {
                log::warn!("tile {key}: {e}");
            }
        }
        self.props = props;
    }

    /// Swaps the CPU pixel transform; tiles are re-fetched under the new one.
    pub fn set_transform(&mut self, transform: Option<Arc<dyn PixelTransform>>) {
        self.pipeline.set_transform(transform);
    }

    /// Tiles with a live sub-layer, in draw order.
    pub fn tile_keys(&self) -> &[TileKey] {
        &self.order
    }

    pub fn sub_layer(&self, key: TileKey) -> Option<&TileSubLayer> {
        self.tiles.get(&key)
    }

    fn sync_sub_layers(&mut self, composited: Vec<TileImage>) {
        let mut next: HashMap<TileKey, TileSubLayer> = HashMap::with_capacity(composited.len());
        let mut order = Vec::with_capacity(composited.len());

        for tile in composited {
            let reusable = self
                .tiles
                .remove(&tile.key)
                .filter(|l| l.base().texture().map(|t| Arc::ptr_eq(t.image(), &tile.image)) == Some(true));

            let layer = match reusable {
                Some(l) => l,
                None => match self.build_sub_layer(&tile) {
                    Some(l) => l,
                    None => continue,
                },
            };
            order.push(tile.key);
            next.insert(tile.key, layer);
        }

        self.tiles = next;
        self.order = order;
    }

    fn build_sub_layer(&self, tile: &TileImage) -> Option<TileSubLayer> {
        let result = extend(
            self.id.child(tile.key),
            BitmapLayer::new(Arc::clone(&tile.image)),
            self.effects.clone(),
            BitmapLayer::records(tile.bounds),
            self.props.clone(),
        );
        match result {
            Ok(layer) => Some(layer),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }
}

impl Layer for TileLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn begin_frame(&mut self, frame: &FrameContext, report: &mut FrameReport) {
        let wanted = tiles_for_view(&frame.view, self.pipeline.config());
        self.pipeline.set_visible(wanted);

        let tiles = self.pipeline.begin_frame();
        if tiles.stale > 0 {
            log::debug!("layer `{}`: {} stale tiles discarded", self.id, tiles.stale);
        }
        report.tile_errors.extend(tiles.errors);

        let composited = self.pipeline.composite();
        self.sync_sub_layers(composited);
    }

    fn draw(
        &mut self,
        frame: &FrameContext,
        programs: &mut ProgramCache,
        sink: &mut dyn DrawSink,
        report: &mut FrameReport,
    ) {
        for key in &self.order {
            if let Some(tile) = self.tiles.get_mut(key) {
                tile.draw(frame, programs, sink, report);
            }
        }
    }

    fn reconfigure(&mut self) {
        for tile in self.tiles.values_mut() {
            tile.reconfigure();
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
