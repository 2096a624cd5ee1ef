use std::collections::BTreeMap;
use std::fmt;

/// Arity of a uniform value. All components are `f32`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    F32,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformKind {
    #[inline]
    pub const fn components(self) -> u32 {
        match self {
            UniformKind::F32 => 1,
            UniformKind::Vec2 => 2,
            UniformKind::Vec3 => 3,
            UniformKind::Vec4 => 4,
        }
    }

    pub const fn wgsl_type(self) -> &'static str {
        match self {
            UniformKind::F32 => "f32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec3 => "vec3<f32>",
            UniformKind::Vec4 => "vec4<f32>",
        }
    }

    /// Alignment in the uniform address space, in bytes.
    #[inline]
    pub const fn align(self) -> u32 {
        match self {
            UniformKind::F32 => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 | UniformKind::Vec4 => 16,
        }
    }

    #[inline]
    pub const fn size(self) -> u32 {
        self.components() * 4
    }
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wgsl_type())
    }
}

/// A typed uniform value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformData {
    F32(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformData {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformData::F32(_) => UniformKind::F32,
            UniformData::Vec2(_) => UniformKind::Vec2,
            UniformData::Vec3(_) => UniformKind::Vec3,
            UniformData::Vec4(_) => UniformKind::Vec4,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        match self {
            UniformData::F32(v) => std::slice::from_ref(v),
            UniformData::Vec2(v) => v,
            UniformData::Vec3(v) => v,
            UniformData::Vec4(v) => v,
        }
    }
}

impl From<f32> for UniformData {
    fn from(v: f32) -> Self {
        UniformData::F32(v)
    }
}

impl From<[f32; 2]> for UniformData {
    fn from(v: [f32; 2]) -> Self {
        UniformData::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformData {
    fn from(v: [f32; 3]) -> Self {
        UniformData::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformData {
    fn from(v: [f32; 4]) -> Self {
        UniformData::Vec4(v)
    }
}

// Float literals default to `f64`; these keep `bag.set("k", 1.0)` working.

impl From<f64> for UniformData {
    fn from(v: f64) -> Self {
        UniformData::F32(v as f32)
    }
}

impl From<[f64; 2]> for UniformData {
    fn from(v: [f64; 2]) -> Self {
        UniformData::Vec2(v.map(|c| c as f32))
    }
}

impl From<[f64; 3]> for UniformData {
    fn from(v: [f64; 3]) -> Self {
        UniformData::Vec3(v.map(|c| c as f32))
    }
}

impl From<[f64; 4]> for UniformData {
    fn from(v: [f64; 4]) -> Self {
        UniformData::Vec4(v.map(|c| c as f32))
    }
}

/// Whether a value depends on the simulation clock.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Volatility {
    #[default]
    Static,
    TimeVarying,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformValue {
    pub name: String,
    pub data: UniformData,
    pub volatility: Volatility,
}

/// Uniform values supplied for exactly one draw call.
///
/// A bag is built right before the draw and dropped after it, so nothing set
/// for one draw leaks into the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformBag {
    values: BTreeMap<String, UniformValue>,
}

impl UniformBag {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a static value, replacing any previous value under `name`.
    pub fn set(&mut self, name: impl Into<String>, data: impl Into<UniformData>) {
        self.insert(name.into(), data.into(), Volatility::Static);
    }

    /// Sets a value derived from the clock reading.
    pub fn set_time_varying(&mut self, name: impl Into<String>, data: impl Into<UniformData>) {
        self.insert(name.into(), data.into(), Volatility::TimeVarying);
    }

    fn insert(&mut self, name: String, data: UniformData, volatility: Volatility) {
        self.values.insert(
            name.clone(),
            UniformValue {
                name,
                data,
                volatility,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UniformValue> {
        self.values.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_set_replaces_earlier_value() {
        let mut bag = UniformBag::new();
        bag.set("contrast", 1.0);
        bag.set_time_varying("contrast", 2.0);

        let v = bag.get("contrast").unwrap();
        assert_eq!(v.data, UniformData::F32(2.0));
        assert_eq!(v.volatility, Volatility::TimeVarying);
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn kinds_follow_uniform_address_space_rules() {
        assert_eq!(UniformKind::F32.align(), 4);
        assert_eq!(UniformKind::Vec2.align(), 8);
        assert_eq!(UniformKind::Vec3.align(), 16);
        assert_eq!(UniformKind::Vec3.size(), 12);
        assert_eq!(UniformData::from([1.0, 2.0, 3.0]).kind(), UniformKind::Vec3);
        assert_eq!(UniformKind::Vec4.to_string(), "vec4<f32>");
    }
}
