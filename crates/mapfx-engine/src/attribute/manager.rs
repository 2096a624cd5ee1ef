use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::AttributeShapeError;

use super::descriptor::AttributeDescriptor;

/// Computed per-instance data of one attribute, tightly packed `f32`s.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBuffer {
    name: String,
    width: u8,
    data: Vec<f32>,
    records: usize,
    generation: u64,
}

impl AttributeBuffer {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn width(&self) -> u8 {
        self.width
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Number of records the buffer was computed from.
    #[inline]
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Bumped each time the buffer is recomputed.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn stride_bytes(&self) -> u64 {
        u64::from(self.width) * std::mem::size_of::<f32>() as u64
    }
}

/// Owns the instanced attributes of one layer and keeps them in sync with its records.
///
/// Recompute rules:
/// - `register`: the new attribute is computed immediately
/// - `set_records` with a different array (pointer identity): every attribute
/// - `invalidate(keys)`: only attributes whose trigger keys intersect `keys`
///
/// A recompute either replaces every affected buffer or none of them. After a
/// failed one the manager reports itself stale until a full recompute succeeds.
pub struct AttributeManager<R> {
    descriptors: Vec<AttributeDescriptor<R>>,
    buffers: Vec<AttributeBuffer>,
    records: Arc<[R]>,
    generation: u64,
    failed: bool,
}

impl<R> AttributeManager<R> {
    pub fn new(records: Arc<[R]>) -> Self {
        Self {
            descriptors: Vec::new(),
            buffers: Vec::new(),
            records,
            generation: 0,
            failed: false,
        }
    }

    /// Declares an attribute and computes its buffer.
    ///
    /// The accessor is checked against the declared width on every record, so a
    /// mismatch surfaces here rather than at draw time. With no records yet the
    /// check happens on the first `set_records`.
    pub fn register(&mut self, descriptor: AttributeDescriptor<R>) -> Result<(), AttributeShapeError> {
        if self.descriptors.iter().any(|d| d.name() == descriptor.name()) {
            return Err(AttributeShapeError::Duplicate {
                name: descriptor.name().to_string(),
            });
        }

        self.generation += 1;
        let buffer = compute(&descriptor, &self.records, self.generation)?;
        self.descriptors.push(descriptor);
        self.buffers.push(buffer);
        Ok(())
    }

    /// Replaces the record array. Returns `true` when buffers were recomputed.
    ///
    /// The new records are kept even when an accessor fails; the old buffers
    /// stay in place but the manager is stale until a recompute succeeds.
    pub fn set_records(&mut self, records: Arc<[R]>) -> Result<bool, AttributeShapeError> {
        if Arc::ptr_eq(&self.records, &records) {
            return Ok(false);
        }
        self.records = records;
        self.invalidate_all()?;
        Ok(true)
    }

    /// Recomputes attributes triggered by `changed`. Returns the recomputed names.
    ///
    /// After a failed recompute every attribute is recomputed regardless of `changed`.
    pub fn invalidate(&mut self, changed: &BTreeSet<String>) -> Result<Vec<String>, AttributeShapeError> {
        let indices: Vec<usize> = (0..self.descriptors.len())
            .filter(|&i| self.failed || self.descriptors[i].is_triggered_by(changed))
            .collect();
        self.recompute(&indices)?;
        Ok(indices
            .into_iter()
            .map(|i| self.descriptors[i].name().to_string())
            .collect())
    }

    pub fn invalidate_all(&mut self) -> Result<(), AttributeShapeError> {
        let indices: Vec<usize> = (0..self.descriptors.len()).collect();
        self.recompute(&indices)
    }

    /// True when the last recompute succeeded and every buffer matches the
    /// current record count.
    pub fn is_fresh(&self) -> bool {
        !self.failed && self.buffers.iter().all(|b| b.records == self.records.len())
    }

    #[inline]
    pub fn instance_count(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn records(&self) -> &Arc<[R]> {
        &self.records
    }

    /// Buffers in registration order.
    #[inline]
    pub fn buffers(&self) -> &[AttributeBuffer] {
        &self.buffers
    }

    pub fn buffer(&self, name: &str) -> Option<&AttributeBuffer> {
        self.buffers.iter().find(|b| b.name == name)
    }

    #[inline]
    pub fn descriptors(&self) -> &[AttributeDescriptor<R>] {
        &self.descriptors
    }

    /// `InstanceInput` struct members, one `@location` per attribute starting at
    /// `first_location`, in registration order.
    pub fn wgsl_members(&self, first_location: u32) -> String {
        let mut out = String::new();
        for (i, d) in self.descriptors.iter().enumerate() {
            let _ = writeln!(
                out,
                "    @location({}) {}: {},",
                first_location + i as u32,
                d.name(),
                d.wgsl_type()
            );
        }
        out
    }

    /// Computes the buffers at `indices`, committing them only if all succeed.
    fn recompute(&mut self, indices: &[usize]) -> Result<(), AttributeShapeError> {
        let mut fresh = Vec::with_capacity(indices.len());
        for &i in indices {
            self.generation += 1;
            match compute(&self.descriptors[i], &self.records, self.generation) {
                Ok(buffer) => fresh.push((i, buffer)),
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }
        for (i, buffer) in fresh {
            self.buffers[i] = buffer;
        }
        self.failed = false;
        Ok(())
    }
}

fn compute<R>(
    descriptor: &AttributeDescriptor<R>,
    records: &[R],
    generation: u64,
) -> Result<AttributeBuffer, AttributeShapeError> {
    let width = descriptor.width();
    let mut data = Vec::with_capacity(records.len() * usize::from(width));

    for (i, record) in records.iter().enumerate() {
        let value = descriptor.read(record);
        if value.width() != width {
            return Err(AttributeShapeError::WidthMismatch {
                name: descriptor.name().to_string(),
                declared: width,
                found: value.width(),
                record: i,
            });
        }
        data.extend_from_slice(value.as_slice());
    }

    Ok(AttributeBuffer {
        name: descriptor.name().to_string(),
        width,
        data,
        records: records.len(),
        generation,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::attribute::AttributeValue;

    #[derive(Debug, Clone)]
    struct Point {
        pos: [f32; 2],
        size: f32,
    }

    fn points(n: usize) -> Arc<[Point]> {
        (0..n)
            .map(|i| Point { pos: [i as f32, -(i as f32)], size: 1.0 + i as f32 })
            .collect()
    }

    fn keys(k: &[&str]) -> BTreeSet<String> {
        k.iter().map(|s| s.to_string()).collect()
    }

    // ── registration ──────────────────────────────────────────────────────

    #[test]
    fn register_computes_packed_buffer() {
        let mut m = AttributeManager::new(points(3));
        m.register(AttributeDescriptor::new("position", 2, |p: &Point| p.pos.into()).unwrap())
            .unwrap();

        let b = m.buffer("position").unwrap();
        assert_eq!(b.data(), &[0.0, 0.0, 1.0, -1.0, 2.0, -2.0]);
        assert_eq!(b.as_bytes().len(), 6 * 4);
        assert_eq!(b.record_count(), 3);
        assert!(m.is_fresh());
    }

    #[test]
    fn width_mismatch_fails_at_registration() {
        let mut m = AttributeManager::new(points(2));
        let d = AttributeDescriptor::new("size", 2, |p: &Point| p.size.into()).unwrap();
        let err = m.register(d).unwrap_err();
        assert_eq!(
            err,
            AttributeShapeError::WidthMismatch { name: "size".into(), declared: 2, found: 1, record: 0 }
        );
        assert!(m.buffers().is_empty());
    }

    #[test]
    fn width_outside_range_is_rejected() {
        let err = AttributeDescriptor::<Point>::new("x", 5, |_| AttributeValue::Scalar(0.0)).unwrap_err();
        assert!(matches!(err, AttributeShapeError::InvalidWidth { width: 5, .. }));
        assert!(AttributeDescriptor::<Point>::new("x", 0, |_| AttributeValue::Scalar(0.0)).is_err());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut m = AttributeManager::new(points(1));
        m.register(AttributeDescriptor::new("size", 1, |p: &Point| p.size.into()).unwrap()).unwrap();
        let err = m
            .register(AttributeDescriptor::new("size", 1, |p: &Point| p.size.into()).unwrap())
            .unwrap_err();
        assert!(matches!(err, AttributeShapeError::Duplicate { .. }));
    }

    #[test]
    fn out_of_domain_values_pass_through() {
        let mut m = AttributeManager::new(points(2));
        m.register(AttributeDescriptor::new("shape", 1, |_: &Point| 42.0.into()).unwrap()).unwrap();
        assert_eq!(m.buffer("shape").unwrap().data(), &[42.0, 42.0]);
    }

    // ── invalidation ──────────────────────────────────────────────────────

    #[test]
    fn only_triggered_attributes_recompute() {
        let scale = Arc::new(AtomicU32::new(1.0f32.to_bits()));
        let s = Arc::clone(&scale);

        let mut m = AttributeManager::new(points(4));
        m.register(
            AttributeDescriptor::new("radius", 1, move |p: &Point| {
                (p.size * f32::from_bits(s.load(Ordering::Relaxed))).into()
            })
            .unwrap()
            .with_triggers(["radius_scale"]),
        )
        .unwrap();
        m.register(
            AttributeDescriptor::new("position", 2, |p: &Point| p.pos.into())
                .unwrap()
                .with_triggers(["data"]),
        )
        .unwrap();

        let radius_before = m.buffer("radius").unwrap().clone();
        let position_before = m.buffer("position").unwrap().clone();

        scale.store(3.0f32.to_bits(), Ordering::Relaxed);

        // Outside K: untouched, byte for byte.
        let recomputed = m.invalidate(&keys(&["fill_color", "data"])).unwrap();
        assert_eq!(recomputed, ["position"]);
        assert_eq!(m.buffer("radius").unwrap().as_bytes(), radius_before.as_bytes());
        assert_eq!(m.buffer("radius").unwrap().generation(), radius_before.generation());
        assert_ne!(m.buffer("position").unwrap().generation(), position_before.generation());

        // Inside K: recomputed with the new accessor output.
        let recomputed = m.invalidate(&keys(&["radius_scale"])).unwrap();
        assert_eq!(recomputed, ["radius"]);
        assert_eq!(m.buffer("radius").unwrap().data(), &[3.0, 6.0, 9.0, 12.0]);
    }

    #[test]
    fn set_records_recomputes_only_on_new_array() {
        let data = points(2);
        let mut m = AttributeManager::new(Arc::clone(&data));
        m.register(AttributeDescriptor::new("size", 1, |p: &Point| p.size.into()).unwrap()).unwrap();
        let generation = m.buffer("size").unwrap().generation();

        assert!(!m.set_records(Arc::clone(&data)).unwrap());
        assert_eq!(m.buffer("size").unwrap().generation(), generation);

        assert!(m.set_records(points(5)).unwrap());
        assert_eq!(m.buffer("size").unwrap().record_count(), 5);
        assert_eq!(m.instance_count(), 5);
        assert!(m.is_fresh());
    }

    #[test]
    fn failed_recompute_leaves_every_buffer_untouched() {
        let mut m = AttributeManager::new(points(2));
        m.register(AttributeDescriptor::new("size", 1, |p: &Point| p.size.into()).unwrap()).unwrap();
        m.register(
            AttributeDescriptor::new("position", 2, |p: &Point| {
                if p.size > 2.5 { AttributeValue::Scalar(p.size) } else { p.pos.into() }
            })
            .unwrap(),
        )
        .unwrap();
        let size_before = m.buffer("size").unwrap().clone();

        // Same record count as before; the second accessor breaks on record 1.
        let bad: Arc<[Point]> = vec![
            Point { pos: [0.0, 0.0], size: 1.0 },
            Point { pos: [1.0, 1.0], size: 3.0 },
        ]
        .into();
        let err = m.set_records(bad).unwrap_err();
        assert!(matches!(err, AttributeShapeError::WidthMismatch { record: 1, .. }));
        assert_eq!(m.buffer("size").unwrap(), &size_before);
        assert!(!m.is_fresh());

        // A partial invalidation after a failure still recomputes everything.
        assert!(m.set_records(points(2)).unwrap());
        assert!(m.is_fresh());
        let err = m.set_records(points(4)).unwrap_err();
        assert!(matches!(err, AttributeShapeError::WidthMismatch { .. }));
        let err = m.invalidate(&keys(&["unrelated"])).unwrap_err();
        assert!(matches!(err, AttributeShapeError::WidthMismatch { .. }));
        assert!(!m.is_fresh());
    }

    #[test]
    fn wgsl_members_follow_registration_order() {
        let mut m = AttributeManager::new(points(1));
        m.register(AttributeDescriptor::new("position", 2, |p: &Point| p.pos.into()).unwrap()).unwrap();
        m.register(AttributeDescriptor::new("radius", 1, |p: &Point| p.size.into()).unwrap()).unwrap();

        assert_eq!(
            m.wgsl_members(1),
            "    @location(1) position: vec2<f32>,\n    @location(2) radius: f32,\n"
        );
    }
}
