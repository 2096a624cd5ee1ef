//! CPU recoloring of decoded tiles.

use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;
use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x7069_7865_6c5f_7478;

/// Per-pixel recoloring function.
///
/// Input channels are straight-alpha RGBA in `0..=255` as `f32`. Output may lie
/// anywhere; [`transform_tile`] clamps it. Pixels with alpha 0 are never passed in.
pub trait PixelTransform: Send + Sync {
    fn name(&self) -> &str;

    /// Stable identity: equal parameters give equal fingerprints.
    fn fingerprint(&self) -> u64;

    fn apply(&self, px: [f32; 4]) -> [f32; 4];
}

/// Maps a transformed channel back to a byte: NaN → 0, clamp, round to nearest.
#[inline]
pub fn clamp_channel(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.clamp(0.0, 255.0).round() as u8
}

/// Applies `transform` to every visible pixel of `src`.
///
/// The output has the same dimensions. Alpha-0 pixels are copied verbatim.
/// Rows are processed in parallel.
pub fn transform_tile(src: &RgbaImage, transform: &dyn PixelTransform) -> RgbaImage {
    let mut out = src.clone();
    let row_len = src.width() as usize * 4;
    if row_len == 0 {
        return out;
    }

    let buf: &mut [u8] = &mut out;
    buf.par_chunks_mut(row_len).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            if px[3] == 0 {
                continue;
            }
            let o = transform.apply([
                f32::from(px[0]),
                f32::from(px[1]),
                f32::from(px[2]),
                f32::from(px[3]),
            ]);
            for (dst, v) in px.iter_mut().zip(o) {
                *dst = clamp_channel(v);
            }
        }
    });

    out
}

fn hash_params(name: &str, params: &[f32]) -> u64 {
    let mut h = Xxh3::with_seed(XXH3_SEED);
    h.update(name.as_bytes());
    for p in params {
        h.update(&p.to_bits().to_le_bytes());
    }
    h.digest()
}

// ── transforms ────────────────────────────────────────────────────────────

/// Brightness / contrast around mid-gray.
///
/// `gray = (r+g+b)/3/255 + brightness`, `new = (gray-0.5)·contrast + 0.5`, then
/// every color channel is scaled by `new/gray` (by `new` when `gray` is 0).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ContrastTransform {
    pub brightness: f32,
    pub contrast: f32,
}

impl Default for ContrastTransform {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
        }
    }
}

impl PixelTransform for ContrastTransform {
    fn name(&self) -> &str {
        "contrast"
    }

    fn fingerprint(&self) -> u64 {
        hash_params(self.name(), &[self.brightness, self.contrast])
    }

    fn apply(&self, [r, g, b, a]: [f32; 4]) -> [f32; 4] {
        let gray = (r + g + b) / 3.0 / 255.0 + self.brightness;
        let new_gray = (gray - 0.5) * self.contrast + 0.5;
        let k = if gray == 0.0 { new_gray } else { new_gray / gray };
        [r * k, g * k, b * k, a]
    }
}

/// Per-channel scale with the result floored. `(0.7, 1.3, 0.7)` is the green tint.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChannelScale {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl ChannelScale {
    pub const GREEN_TINT: ChannelScale = ChannelScale {
        r: 0.7,
        g: 1.3,
        b: 0.7,
    };
}

impl PixelTransform for ChannelScale {
    fn name(&self) -> &str {
        "channel-scale"
    }

    fn fingerprint(&self) -> u64 {
        hash_params(self.name(), &[self.r, self.g, self.b])
    }

    fn apply(&self, [r, g, b, a]: [f32; 4]) -> [f32; 4] {
        [
            (r * self.r).floor(),
            (g * self.g).floor(),
            (b * self.b).floor(),
            a,
        ]
    }
}

/// Transforms applied in order; stage k's output is stage k+1's input.
///
/// Each stage sees the bitmap the previous one would have produced: channels
/// are clamped and rounded to bytes between stages, and a pixel whose alpha
/// reaches 0 is passed through untouched by the remaining stages.
#[derive(Clone, Default)]
pub struct TransformChain {
    stages: Vec<Arc<dyn PixelTransform>>,
}

impl TransformChain {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: impl PixelTransform + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn push(&mut self, stage: Arc<dyn PixelTransform>) {
        self.stages.push(stage);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

impl PixelTransform for TransformChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn fingerprint(&self) -> u64 {
        let mut h = Xxh3::with_seed(XXH3_SEED);
        h.update(self.name().as_bytes());
        for s in &self.stages {
            h.update(&s.fingerprint().to_le_bytes());
        }
        h.digest()
    }

    fn apply(&self, mut px: [f32; 4]) -> [f32; 4] {
        for stage in &self.stages {
            if px[3] <= 0.0 {
                break;
            }
            px = stage.apply(px).map(|v| f32::from(clamp_channel(v)));
        }
        px
    }
}
