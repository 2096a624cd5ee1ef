//! Layer props: named configuration values read by attribute accessors and
//! uniform providers.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Number(f64),
    Vector(Vec<f64>),
    Bool(bool),
    Text(String),
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Number(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Text(v.to_string())
    }
}

impl<const N: usize> From<[f64; N]> for PropValue {
    fn from(v: [f64; N]) -> Self {
        PropValue::Vector(v.to_vec())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    values: BTreeMap<String, PropValue>,
}

impl Props {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.values.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            PropValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Number as `f32`, or `default` when absent or not a number.
    pub fn f32_or(&self, key: &str, default: f32) -> f32 {
        self.number(key).map_or(default, |v| v as f32)
    }

    pub fn vector(&self, key: &str) -> Option<&[f64]> {
        match self.values.get(key)? {
            PropValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// First `N` components of a vector prop as `f32`.
    pub fn array_or<const N: usize>(&self, key: &str, default: [f32; N]) -> [f32; N] {
        match self.vector(key) {
            Some(v) if v.len() >= N => std::array::from_fn(|i| v[i] as f32),
            _ => default,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            PropValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            PropValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Keys whose value differs between `self` and `next`, including keys
    /// present in only one of them.
    pub fn changed_keys(&self, next: &Props) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        for (k, v) in &next.values {
            if self.values.get(k) != Some(v) {
                changed.insert(k.clone());
            }
        }
        for k in self.values.keys() {
            if !next.values.contains_key(k) {
                changed.insert(k.clone());
            }
        }
        changed
    }
}
