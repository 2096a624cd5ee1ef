use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;

use image::RgbaImage;

use crate::error::TileDecodeError;
use crate::map::GeoBounds;

use super::key::{TileConfig, TileKey};
use super::pixel::{PixelTransform, transform_tile};

/// Lifecycle of one visible tile.
///
/// `Requested → Fetched → Decoded → Transformed → Composited`, and `Evicted`
/// when cache pressure drops the transformed image. A fetch or decode failure
/// parks the tile in `Failed` until it leaves the view.
///
/// `Fetched` and `Decoded` are passed on the replying thread inside
/// [`TileReply::send`]; the pipeline records a tile once it arrives transformed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TileState {
    Requested,
    Fetched,
    Decoded,
    Transformed,
    Composited,
    Evicted,
    Failed,
}

/// What a source delivers for one tile.
#[derive(Debug, Clone)]
pub enum TilePayload {
    /// Encoded image bytes (PNG, JPEG, WebP).
    Encoded(Vec<u8>),
    /// Already decoded straight-alpha RGBA8.
    Decoded(RgbaImage),
}

/// A finished tile crossing into the render thread.
#[derive(Debug)]
pub struct TileResponse {
    pub key: TileKey,
    /// Fingerprint of the transform the image went through.
    pub transform: u64,
    pub result: Result<RgbaImage, TileDecodeError>,
}

/// One-shot reply handle given to a [`TileSource`].
///
/// Carries the transform that was active when the tile was requested.
pub struct TileReply {
    key: TileKey,
    transform: Option<Arc<dyn PixelTransform>>,
    tx: Sender<TileResponse>,
}

impl std::fmt::Debug for TileReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileReply")
            .field("key", &self.key)
            .field("transform", &self.transform.as_ref().map(|t| t.name()))
            .finish()
    }
}

impl TileReply {
    #[inline]
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Decodes and transforms the payload on the calling thread, then delivers
    /// the tile. Dropped silently if the pipeline is gone.
    ///
    /// Sources call this from their own workers so the render thread only
    /// picks up finished images.
    pub fn send(self, result: Result<TilePayload, String>) {
        let key = self.key;
        let result = result
            .map_err(|reason| TileDecodeError::Fetch { key, reason })
            .and_then(|payload| decode_tile(key, payload))
            .map(|decoded| match &self.transform {
                Some(t) => transform_tile(&decoded, t.as_ref()),
                None => decoded,
            });

        let _ = self.tx.send(TileResponse {
            key,
            transform: self.transform.as_ref().map_or(0, |t| t.fingerprint()),
            result,
        });
    }
}

/// Fetches tiles off the render thread.
///
/// `request` must not block; results come back through the reply whenever
/// they are ready and are picked up at the start of a frame.
pub trait TileSource: Send + Sync {
    fn request(&self, key: TileKey, reply: TileReply);
}

/// A transformed tile ready to composite.
#[derive(Debug, Clone)]
pub struct TileImage {
    pub key: TileKey,
    pub bounds: GeoBounds,
    pub image: Arc<RgbaImage>,
}

/// Decodes a payload into straight-alpha RGBA8.
pub fn decode_tile(key: TileKey, payload: TilePayload) -> Result<RgbaImage, TileDecodeError> {
    match payload {
        TilePayload::Decoded(img) => Ok(img),
        TilePayload::Encoded(bytes) => image::load_from_memory(&bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| TileDecodeError::Decode {
                key,
                reason: e.to_string(),
            }),
    }
}

/// Counters for one `begin_frame`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TileFrameReport {
    pub arrived: usize,
    pub stale: usize,
    pub transformed: usize,
    pub errors: Vec<TileDecodeError>,
}

struct CacheEntry {
    tile: TileImage,
    last_used: u64,
}

/// Request / decode / transform / cache state machine for a tiled raster.
///
/// Owned by the render thread. Sources answer through an mpsc channel that is
/// drained only in [`begin_frame`](Self::begin_frame).
pub struct TilePipeline {
    config: TileConfig,
    source: Arc<dyn TileSource>,
    transform: Option<Arc<dyn PixelTransform>>,

    tx: Sender<TileResponse>,
    rx: Receiver<TileResponse>,

    visible: Vec<TileKey>,
    visible_set: HashSet<TileKey>,
    states: HashMap<TileKey, TileState>,

    cache: HashMap<(TileKey, u64), CacheEntry>,
    cache_hits: u64,
    frame: u64,
}

impl TilePipeline {
    pub fn new(config: TileConfig, source: Arc<dyn TileSource>) -> Self {
        if config.min_zoom > config.max_zoom {
            log::warn!(
                "tile config has min_zoom {} above max_zoom {}; the bounds are swapped",
                config.min_zoom,
                config.max_zoom
            );
        }
        let (tx, rx) = mpsc::channel();
        Self {
            config,
            source,
            transform: None,
            tx,
            rx,
            visible: Vec::new(),
            visible_set: HashSet::new(),
            states: HashMap::new(),
            cache: HashMap::new(),
            cache_hits: 0,
            frame: 0,
        }
    }

    pub fn with_transform(mut self, transform: Arc<dyn PixelTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    #[inline]
    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    /// Fingerprint of the active transform; 0 without one.
    pub fn transform_fingerprint(&self) -> u64 {
        self.transform.as_ref().map_or(0, |t| t.fingerprint())
    }

    /// Swaps the transform. Visible tiles not cached under the new fingerprint
    /// are requested again.
    pub fn set_transform(&mut self, transform: Option<Arc<dyn PixelTransform>>) {
        let before = self.transform_fingerprint();
        self.transform = transform;
        if self.transform_fingerprint() == before {
            return;
        }
        log::debug!("tile transform changed; refreshing {} visible tiles", self.visible.len());
        self.states.clear();
        let keys = std::mem::take(&mut self.visible);
        self.visible_set.clear();
        self.set_visible(keys);
    }

    /// Declares the tiles the current view needs.
    ///
    /// Tiles leaving the set are forgotten (in-flight results for them are
    /// discarded on arrival). New tiles are served from the cache or requested.
    pub fn set_visible(&mut self, keys: Vec<TileKey>) {
        let next: HashSet<TileKey> = keys.iter().copied().collect();
        self.states.retain(|k, _| next.contains(k));

        let fp = self.transform_fingerprint();
        for &key in &keys {
            match self.states.get(&key) {
                None | Some(TileState::Evicted) => {}
                Some(_) => continue,
            }
            if self.cache.contains_key(&(key, fp)) {
                self.cache_hits += 1;
                self.states.insert(key, TileState::Transformed);
                continue;
            }
            self.states.insert(key, TileState::Requested);
            self.source.request(
                key,
                TileReply {
                    key,
                    transform: self.transform.clone(),
                    tx: self.tx.clone(),
                },
            );
        }

        self.visible = keys;
        self.visible_set = next;
    }

    /// Consumes every result that arrived since the last frame.
    pub fn begin_frame(&mut self) -> TileFrameReport {
        self.frame += 1;
        let mut report = TileFrameReport::default();

        loop {
            let response = match self.rx.try_recv() {
                Ok(r) => r,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };
            report.arrived += 1;

            let key = response.key;
            if !self.visible_set.contains(&key)
                || self.states.get(&key) != Some(&TileState::Requested)
                || response.transform != self.transform_fingerprint()
            {
                log::debug!("discarding stale tile {key}");
                report.stale += 1;
                continue;
            }

            match self.accept(key, response.transform, response.result) {
                Ok(()) => report.transformed += 1,
                Err(e) => {
                    log::warn!("{e}");
                    self.states.insert(key, TileState::Failed);
                    report.errors.push(e);
                }
            }
        }

        self.evict_over_capacity();
        report
    }

    fn accept(&mut self, key: TileKey, fp: u64, result: Result<RgbaImage, TileDecodeError>) -> Result<(), TileDecodeError> {
        let image = result?;
        self.states.insert(key, TileState::Transformed);

        self.cache.insert(
            (key, fp),
            CacheEntry {
                tile: TileImage {
                    key,
                    bounds: key.bounds(),
                    image: Arc::new(image),
                },
                last_used: self.frame,
            },
        );
        Ok(())
    }

    /// Drops least recently used images until the cache fits. Tiles in the
    /// visible set are never dropped, so the cache may exceed its capacity
    /// while the view needs more tiles than it holds.
    fn evict_over_capacity(&mut self) {
        let fp = self.transform_fingerprint();
        while self.cache.len() > self.config.cache_capacity {
            let Some(oldest) = self
                .cache
                .iter()
                .filter(|((key, entry_fp), _)| *entry_fp != fp || !self.visible_set.contains(key))
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k)
            else {
                break;
            };
            self.cache.remove(&oldest);
            let (key, _) = oldest;
            if let Some(state) = self.states.get_mut(&key) {
                if matches!(state, TileState::Transformed | TileState::Composited) {
                    log::debug!("tile {key} evicted while visible");
                    *state = TileState::Evicted;
                }
            }
        }
    }

    /// Visible tiles ready to draw, in visible-set order. Marks them composited.
    pub fn composite(&mut self) -> Vec<TileImage> {
        let fp = self.transform_fingerprint();
        let mut out = Vec::new();
        for key in &self.visible {
            let Some(entry) = self.cache.get_mut(&(*key, fp)) else { continue };
            entry.last_used = self.frame;
            self.states.insert(*key, TileState::Composited);
            out.push(entry.tile.clone());
        }
        out
    }

    /// Re-requests visible tiles whose cached image was evicted.
    pub fn refresh_evicted(&mut self) {
        let keys = self.visible.clone();
        self.set_visible(keys);
    }

    pub fn state(&self, key: TileKey) -> Option<TileState> {
        self.states.get(&key).copied()
    }

    #[inline]
    pub fn visible(&self) -> &[TileKey] {
        &self.visible
    }

    #[inline]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    #[inline]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }
}
