use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::{ShaderCompileError, UniformTypeError};

use super::value::{UniformBag, UniformKind};

/// A declared uniform: name and arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub kind: UniformKind,
}

impl UniformSlot {
    pub fn new(name: impl Into<String>, kind: UniformKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Offsets of a layer's uniforms inside its `LayerUniforms` block.
///
/// Slots keep declaration order. The same name declared twice with the same
/// kind is one shared slot; with another kind it is a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    slots: Vec<(UniformSlot, u32)>,
    size: u32,
}

impl UniformLayout {
    pub fn new<I>(layer: &str, slots: I) -> Result<Self, ShaderCompileError>
    where
        I: IntoIterator<Item = UniformSlot>,
    {
        let mut unique: Vec<UniformSlot> = Vec::new();
        for slot in slots {
            match unique.iter().find(|s| s.name == slot.name) {
                Some(existing) if existing.kind == slot.kind => {}
                Some(existing) => {
                    return Err(ShaderCompileError::ConflictingUniform {
                        layer: layer.to_string(),
                        name: slot.name,
                        first: existing.kind,
                        second: slot.kind,
                    });
                }
                None => unique.push(slot),
            }
        }

        let mut cursor = 0u32;
        let mut placed = Vec::with_capacity(unique.len());
        for slot in unique {
            let offset = align_up(cursor, slot.kind.align());
            cursor = offset + slot.kind.size();
            placed.push((slot, offset));
        }

        Ok(Self {
            slots: placed,
            size: align_up(cursor, 16).max(16),
        })
    }

    /// Block size in bytes, a multiple of 16.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn slots(&self) -> impl Iterator<Item = &UniformSlot> {
        self.slots.iter().map(|(s, _)| s)
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().map(|(s, _)| s).find(|s| s.name == name)
    }

    pub fn offset(&self, name: &str) -> Option<u32> {
        self.slots.iter().find(|(s, _)| s.name == name).map(|(_, o)| *o)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `LayerUniforms` struct members in declaration order.
    pub fn wgsl_members(&self) -> String {
        let mut out = String::new();
        for (slot, _) in &self.slots {
            let _ = writeln!(out, "    {}: {},", slot.name, slot.kind.wgsl_type());
        }
        out
    }
}

#[inline]
fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Packed bytes of one draw call's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads the `f32` stored at `offset`.
    pub fn read_f32(&self, offset: u32) -> Option<f32> {
        let start = offset as usize;
        let raw: [u8; 4] = self.bytes.get(start..start + 4)?.try_into().ok()?;
        Some(f32::from_ne_bytes(raw))
    }
}

/// Checks a bag against a layout and packs it.
#[derive(Debug, Clone)]
pub struct UniformBinder {
    layout: Arc<UniformLayout>,
}

impl UniformBinder {
    pub fn new(layout: Arc<UniformLayout>) -> Self {
        Self { layout }
    }

    #[inline]
    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Builds the full block from `bag`.
    ///
    /// Every declared slot must be supplied with its declared kind, and the bag
    /// may not carry names the layout does not declare.
    pub fn bind(&self, bag: &UniformBag) -> Result<UniformBlock, UniformTypeError> {
        let mut bytes = vec![0u8; self.layout.size as usize];

        for (slot, offset) in &self.layout.slots {
            let value = bag.get(&slot.name).ok_or_else(|| UniformTypeError::Missing {
                name: slot.name.clone(),
            })?;
            let bound = value.data.kind();
            if bound != slot.kind {
                return Err(UniformTypeError::KindMismatch {
                    name: slot.name.clone(),
                    declared: slot.kind,
                    bound,
                });
            }
            let src: &[u8] = bytemuck::cast_slice(value.data.as_slice());
            let start = *offset as usize;
            bytes[start..start + src.len()].copy_from_slice(src);
        }

        if let Some(name) = bag.keys().find(|k| self.layout.slot(k).is_none()) {
            return Err(UniformTypeError::Undeclared {
                name: name.to_string(),
            });
        }

        Ok(UniformBlock { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> UniformLayout {
        UniformLayout::new(
            "test",
            [
                UniformSlot::new("viewport", UniformKind::Vec2),
                UniformSlot::new("tint", UniformKind::Vec3),
                UniformSlot::new("time", UniformKind::F32),
                UniformSlot::new("world_size", UniformKind::F32),
            ],
        )
        .unwrap()
    }

    fn full_bag() -> UniformBag {
        let mut bag = UniformBag::new();
        bag.set("viewport", [800.0, 600.0]);
        bag.set("tint", [0.5, 0.25, 1.0]);
        bag.set_time_varying("time", 3.5);
        bag.set("world_size", 512.0);
        bag
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn offsets_follow_wgsl_alignment() {
        let l = layout();
        assert_eq!(l.offset("viewport"), Some(0));
        assert_eq!(l.offset("tint"), Some(16));
        // f32 packs into the tail of the vec3.
        assert_eq!(l.offset("time"), Some(28));
        assert_eq!(l.offset("world_size"), Some(32));
        assert_eq!(l.size(), 48);
    }

    #[test]
    fn shared_slot_is_declared_once() {
        let l = UniformLayout::new(
            "l",
            [
                UniformSlot::new("time", UniformKind::F32),
                UniformSlot::new("time", UniformKind::F32),
            ],
        )
        .unwrap();
        assert_eq!(l.len(), 1);
        assert_eq!(l.wgsl_members(), "    time: f32,\n");
    }

    #[test]
    fn conflicting_slot_is_a_compile_error() {
        let err = UniformLayout::new(
            "l",
            [
                UniformSlot::new("fade", UniformKind::F32),
                UniformSlot::new("fade", UniformKind::Vec2),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ShaderCompileError::ConflictingUniform {
                layer: "l".into(),
                name: "fade".into(),
                first: UniformKind::F32,
                second: UniformKind::Vec2,
            }
        );
    }

    // ── binding ───────────────────────────────────────────────────────────

    #[test]
    fn bind_packs_values_at_their_offsets() {
        let binder = UniformBinder::new(Arc::new(layout()));
        let block = binder.bind(&full_bag()).unwrap();

        assert_eq!(block.len(), 48);
        assert_eq!(block.read_f32(0), Some(800.0));
        assert_eq!(block.read_f32(4), Some(600.0));
        assert_eq!(block.read_f32(24), Some(1.0));
        assert_eq!(block.read_f32(28), Some(3.5));
        assert_eq!(block.read_f32(32), Some(512.0));
    }

    #[test]
    fn missing_value_is_rejected() {
        let binder = UniformBinder::new(Arc::new(layout()));
        let mut bag = UniformBag::new();
        bag.set("viewport", [800.0, 600.0]);
        bag.set("tint", [0.5, 0.25, 1.0]);
        bag.set("world_size", 512.0);
        assert_eq!(binder.bind(&bag).unwrap_err(), UniformTypeError::Missing { name: "time".into() });
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let binder = UniformBinder::new(Arc::new(layout()));
        let mut bag = full_bag();
        bag.set("world_size", [512.0, 512.0]);
        assert_eq!(
            binder.bind(&bag).unwrap_err(),
            UniformTypeError::KindMismatch {
                name: "world_size".into(),
                declared: UniformKind::F32,
                bound: UniformKind::Vec2,
            }
        );
    }

    #[test]
    fn undeclared_value_is_rejected() {
        let binder = UniformBinder::new(Arc::new(layout()));
        let mut bag = full_bag();
        bag.set("contrast", 1.5);
        assert_eq!(
            binder.bind(&bag).unwrap_err(),
            UniformTypeError::Undeclared { name: "contrast".into() }
        );
    }
}
