//! Material Parameters
//!
//! A [`ParameterSet`] holds the named shader constants of one bound material.
//! Pass listeners write into it right before the pass draws (see the heat
//! vision effect for a typical `random_fractions` / `depth_modulator` pair).

use glam::Vec4;
use rustc_hash::FxHashMap;

/// A single shader constant value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Vec4(Vec4),
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<Vec4> for ParamValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

/// Named constants of a material's fragment program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: FxHashMap<String, ParamValue>,
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or overwrites) a named constant.
    pub fn set_named_constant(&mut self, name: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
        } else {
            self.values.insert(name.to_owned(), value);
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    /// Returns the constant as `f32`, or `None` if missing or of another type.
    #[must_use]
    pub fn float(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns the constant as `Vec4`, or `None` if missing or of another type.
    #[must_use]
    pub fn vec4(&self, name: &str) -> Option<Vec4> {
        match self.values.get(name) {
            Some(ParamValue::Vec4(v)) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
