//! Procedural raster tiles generated on a worker thread.

use std::io::Cursor;
use std::sync::mpsc::{self, Sender};
use std::thread;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use mapfx_engine::tile::{TileKey, TilePayload, TileReply, TileSource};

/// Encodes a synthetic terrain-like PNG per tile on a background thread.
///
/// Water (everything below a fixed height) is fully transparent, so CPU
/// transforms leave it untouched.
pub struct ProceduralSource {
    tx: Sender<TileReply>,
}

impl ProceduralSource {
    pub fn spawn(tile_size: u32) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<TileReply>();
        thread::Builder::new()
            .name("mapfx-tiles".into())
            .spawn(move || {
                for reply in rx {
                    let key = reply.key();
                    let result = encode_png(&render_tile(key, tile_size)).map_err(|e| format!("{e:#}"));
                    reply.send(result.map(TilePayload::Encoded));
                }
                log::debug!("tile worker stopped");
            })
            .context("failed to spawn tile worker")?;
        Ok(Self { tx })
    }
}

impl TileSource for ProceduralSource {
    fn request(&self, key: TileKey, reply: TileReply) {
        if let Err(e) = self.tx.send(reply) {
            // Worker gone: answer with a failure so the tile is not left pending.
            e.0.send(Err(format!("tile worker stopped before {key}")));
        }
    }
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).context("png encode")?;
    Ok(bytes.into_inner())
}

/// Height field sampled in world-unit space so neighboring tiles line up.
pub fn render_tile(key: TileKey, size: u32) -> RgbaImage {
    let span = f64::from(key.span());
    RgbaImage::from_fn(size, size, |px, py| {
        let ux = (f64::from(key.x) + (f64::from(px) + 0.5) / f64::from(size)) / span;
        let uy = (f64::from(key.y) + (f64::from(py) + 0.5) / f64::from(size)) / span;
        shade(height(ux, uy))
    })
}

fn height(ux: f64, uy: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let a = (ux * tau * 3.0).sin() * (uy * tau * 2.0).cos();
    let b = 0.5 * (ux * tau * 7.0 + 1.3).sin() * (uy * tau * 5.0 + 0.4).sin();
    let c = 0.25 * ((ux + uy) * tau * 13.0).sin();
    (a + b + c) / 1.75
}

fn shade(h: f64) -> Rgba<u8> {
    if h < -0.15 {
        return Rgba([0, 0, 0, 0]);
    }
    let t = ((h + 0.15) / 1.15).clamp(0.0, 1.0);
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    if t < 0.5 {
        Rgba([lerp(196.0, 90.0), lerp(186.0, 150.0), lerp(140.0, 80.0), 255])
    } else {
        Rgba([lerp(90.0, 235.0), lerp(150.0, 235.0), lerp(80.0, 240.0), 255])
    }
}
