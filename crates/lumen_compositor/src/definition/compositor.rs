//! Compositor Definitions
//!
//! The top of the definition tree: a named, grouped list of techniques. The
//! manager's registry owns one [`Compositor`] per name and attaches it to
//! viewports by picking the first technique the render system supports.

use lumen_core::errors::{LumenError, Result};
use lumen_core::format::Capabilities;
use serde::{Deserialize, Serialize};

use super::technique::CompositionTechnique;

/// Resource group new definitions land in unless one is given.
pub const DEFAULT_GROUP: &str = "General";

fn default_group() -> String {
    DEFAULT_GROUP.to_owned()
}

/// A named post-processing effect: an ordered list of techniques, the first
/// one the render system supports being used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compositor {
    pub name: String,
    #[serde(default = "default_group")]
    pub group: String,
    /// Techniques in preference order.
    #[serde(default)]
    pub techniques: Vec<CompositionTechnique>,
}

impl Compositor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: default_group(),
            techniques: Vec::new(),
        }
    }

    /// Appends a technique (lowest preference so far) and returns it.
    pub fn create_technique(&mut self) -> &mut CompositionTechnique {
        self.techniques.push(CompositionTechnique::new());
        let last = self.techniques.len() - 1;
        &mut self.techniques[last]
    }

    pub fn remove_technique(&mut self, index: usize) -> Option<CompositionTechnique> {
        (index < self.techniques.len()).then(|| self.techniques.remove(index))
    }

    #[inline]
    #[must_use]
    pub fn technique(&self, index: usize) -> Option<&CompositionTechnique> {
        self.techniques.get(index)
    }

    #[inline]
    #[must_use]
    pub fn num_techniques(&self) -> usize {
        self.techniques.len()
    }

    /// Index of the first technique `caps` can run.
    #[must_use]
    pub fn supported_technique(&self, caps: &Capabilities) -> Option<usize> {
        self.techniques.iter().position(|t| t.is_supported(caps))
    }

    /// Picks the technique to instantiate and validates it.
    pub(crate) fn select_technique(&self, caps: &Capabilities) -> Result<usize> {
        if self.techniques.is_empty() {
            return Err(LumenError::definition(&self.name, "compositor has no techniques"));
        }
        let index = self
            .supported_technique(caps)
            .ok_or_else(|| LumenError::Unsupported(self.name.clone()))?;
        self.techniques[index].validate(&self.name)?;
        Ok(index)
    }
}
