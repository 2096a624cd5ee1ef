use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::AttributeShapeError;

/// Value produced by an attribute accessor for one record.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl AttributeValue {
    #[inline]
    pub fn width(&self) -> u8 {
        match self {
            AttributeValue::Scalar(_) => 1,
            AttributeValue::Vec2(_) => 2,
            AttributeValue::Vec3(_) => 3,
            AttributeValue::Vec4(_) => 4,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        match self {
            AttributeValue::Scalar(v) => std::slice::from_ref(v),
            AttributeValue::Vec2(v) => v,
            AttributeValue::Vec3(v) => v,
            AttributeValue::Vec4(v) => v,
        }
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Scalar(v)
    }
}

impl From<[f32; 2]> for AttributeValue {
    fn from(v: [f32; 2]) -> Self {
        AttributeValue::Vec2(v)
    }
}

impl From<[f32; 3]> for AttributeValue {
    fn from(v: [f32; 3]) -> Self {
        AttributeValue::Vec3(v)
    }
}

impl From<[f32; 4]> for AttributeValue {
    fn from(v: [f32; 4]) -> Self {
        AttributeValue::Vec4(v)
    }
}

// Float literals default to `f64`; accessors may return them unsuffixed.

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Scalar(v as f32)
    }
}

impl From<[f64; 2]> for AttributeValue {
    fn from(v: [f64; 2]) -> Self {
        AttributeValue::Vec2(v.map(|c| c as f32))
    }
}

impl From<[f64; 3]> for AttributeValue {
    fn from(v: [f64; 3]) -> Self {
        AttributeValue::Vec3(v.map(|c| c as f32))
    }
}

impl From<[f64; 4]> for AttributeValue {
    fn from(v: [f64; 4]) -> Self {
        AttributeValue::Vec4(v.map(|c| c as f32))
    }
}

/// Reads one attribute value from a record.
pub type Accessor<R> = Arc<dyn Fn(&R) -> AttributeValue + Send + Sync>;

/// Declaration of one instanced attribute.
pub struct AttributeDescriptor<R> {
    name: String,
    width: u8,
    accessor: Accessor<R>,
    triggers: BTreeSet<String>,
}

impl<R> AttributeDescriptor<R> {
    /// Declares an attribute with `width` components (1–4).
    pub fn new<F>(name: impl Into<String>, width: u8, accessor: F) -> Result<Self, AttributeShapeError>
    where
        F: Fn(&R) -> AttributeValue + Send + Sync + 'static,
    {
        let name = name.into();
        if !(1..=4).contains(&width) {
            return Err(AttributeShapeError::InvalidWidth { name, width });
        }
        Ok(Self {
            name,
            width,
            accessor: Arc::new(accessor),
            triggers: BTreeSet::new(),
        })
    }

    /// Prop keys whose change forces this attribute to be recomputed.
    pub fn with_triggers<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers.extend(keys.into_iter().map(Into::into));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn width(&self) -> u8 {
        self.width
    }

    #[inline]
    pub fn triggers(&self) -> &BTreeSet<String> {
        &self.triggers
    }

    /// True when any of `changed` is one of this attribute's trigger keys.
    pub fn is_triggered_by(&self, changed: &BTreeSet<String>) -> bool {
        !self.triggers.is_disjoint(changed)
    }

    #[inline]
    pub fn read(&self, record: &R) -> AttributeValue {
        (self.accessor)(record)
    }

    /// WGSL type of the attribute as seen by the vertex stage.
    pub fn wgsl_type(&self) -> &'static str {
        wgsl_float_type(self.width)
    }
}

impl<R> Clone for AttributeDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            width: self.width,
            accessor: Arc::clone(&self.accessor),
            triggers: self.triggers.clone(),
        }
    }
}

impl<R> fmt::Debug for AttributeDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("triggers", &self.triggers)
            .finish_non_exhaustive()
    }
}

pub(crate) fn wgsl_float_type(width: u8) -> &'static str {
    match width {
        1 => "f32",
        2 => "vec2<f32>",
        3 => "vec3<f32>",
        _ => "vec4<f32>",
    }
}
