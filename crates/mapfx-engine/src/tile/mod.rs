//! Raster tiles: addressing, fetch / decode / transform pipeline, compositing.
//!
//! Sources ([`TileSource`]) fetch off the render thread; their replies decode
//! and apply the CPU [`PixelTransform`] before crossing a channel.
//! [`TilePipeline`] drains it once per frame and caches the result per
//! `(tile, transform fingerprint)`.
//! [`TileLayer`] turns each composited tile into a bitmap sub-layer.

mod key;
mod layer;
mod pipeline;
mod pixel;

pub use key::{TileConfig, TileKey, TileUrlTemplate, tile_zoom, tiles_for_view};
pub use layer::TileLayer;
pub use pipeline::{
    TileFrameReport, TileImage, TilePayload, TilePipeline, TileReply, TileResponse, TileSource, TileState,
    decode_tile,
};
pub use pixel::{ChannelScale, ContrastTransform, PixelTransform, TransformChain, clamp_channel, transform_tile};
