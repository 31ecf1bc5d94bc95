//! Composition Passes
//!
//! The leaf operation of a compositor: clear the target, render the scene
//! into it, or draw a full-screen quad with a material that samples up to
//! [`MAX_PASS_INPUTS`] named textures.

use bitflags::bitflags;
use glam::Vec4;
use lumen_core::errors::{LumenError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Number of texture input slots a quad pass can bind.
pub const MAX_PASS_INPUTS: usize = 8;

/// Reserved input name referring to the output of the preceding stage (or the
/// chain input for the first stage).
pub const PREVIOUS_INPUT: &str = "previous";

/// First render queue drawn by a scene pass by default.
pub const RENDER_QUEUE_BACKGROUND: u8 = 0;
/// Last render queue drawn by a scene pass by default.
pub const RENDER_QUEUE_SKIES_LATE: u8 = 95;

/// Pass type selector used while authoring.
///
/// | Type | Executes |
/// |------|----------|
/// | `Clear` | Target clear of the selected buffers |
/// | `RenderScene` | Scene render of a render-queue range into the target |
/// | `RenderQuad` | Full-screen quad with a material and bound input textures |
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum PassType {
    Clear,
    RenderScene,
    RenderQuad,
}

impl PassType {
    /// Pass type name (for logging).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::RenderScene => "RenderScene",
            Self::RenderQuad => "RenderQuad",
        }
    }
}

bitflags! {
    /// Frame buffers a clear pass touches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ClearBuffers: u8 {
        const COLOUR  = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

impl Default for ClearBuffers {
    fn default() -> Self {
        Self::COLOUR | Self::DEPTH
    }
}

/// Parameters of a clear pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearSettings {
    pub buffers: ClearBuffers,
    pub colour: Vec4,
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearSettings {
    fn default() -> Self {
        Self {
            buffers: ClearBuffers::default(),
            colour: Vec4::ZERO,
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Parameters of a scene pass: the inclusive range of render queues drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenePass {
    pub first_queue: u8,
    pub last_queue: u8,
}

impl Default for ScenePass {
    fn default() -> Self {
        Self {
            first_queue: RENDER_QUEUE_BACKGROUND,
            last_queue: RENDER_QUEUE_SKIES_LATE,
        }
    }
}

/// Parameters of a quad pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadPass {
    /// Material drawn on the quad. Required before the technique can compile.
    pub material: Option<String>,
    /// Input texture per slot: a texture definition name or [`PREVIOUS_INPUT`].
    pub inputs: SmallVec<[Option<String>; 4]>,
}

impl QuadPass {
    /// Bound inputs as `(slot, name)` pairs, skipping empty slots.
    pub fn bound_inputs(&self) -> impl Iterator<Item = (u32, &str)> {
        self.inputs
            .iter()
            .enumerate()
            .filter_map(|(slot, name)| name.as_deref().map(|n| (slot as u32, n)))
    }
}

/// What a pass does, with only the data its variant needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PassKind {
    Clear(ClearSettings),
    RenderScene(ScenePass),
    RenderQuad(QuadPass),
}

impl PassKind {
    fn for_type(pass_type: PassType) -> Self {
        match pass_type {
            PassType::Clear => Self::Clear(ClearSettings::default()),
            PassType::RenderScene => Self::RenderScene(ScenePass::default()),
            PassType::RenderQuad => Self::RenderQuad(QuadPass::default()),
        }
    }
}

/// One rendering operation inside a target pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionPass {
    /// Opaque tag that lets listeners recognise this pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<u32>,
    pub kind: PassKind,
}

impl CompositionPass {
    #[must_use]
    pub fn new(pass_type: PassType) -> Self {
        Self {
            identifier: None,
            kind: PassKind::for_type(pass_type),
        }
    }

    #[must_use]
    pub fn pass_type(&self) -> PassType {
        match self.kind {
            PassKind::Clear(_) => PassType::Clear,
            PassKind::RenderScene(_) => PassType::RenderScene,
            PassKind::RenderQuad(_) => PassType::RenderQuad,
        }
    }

    /// Changes the pass type. Switching to a different type resets the
    /// variant data to its defaults.
    pub fn set_type(&mut self, pass_type: PassType) -> &mut Self {
        if self.pass_type() != pass_type {
            self.kind = PassKind::for_type(pass_type);
        }
        self
    }

    pub fn set_identifier(&mut self, identifier: u32) -> &mut Self {
        self.identifier = Some(identifier);
        self
    }

    /// Sets the material of a quad pass.
    pub fn set_material_name(&mut self, material: impl Into<String>) -> Result<&mut Self> {
        self.quad_mut("set_material_name")?.material = Some(material.into());
        Ok(self)
    }

    /// Binds input `slot` of a quad pass to a texture definition or
    /// [`PREVIOUS_INPUT`].
    pub fn set_input(&mut self, slot: usize, name: impl Into<String>) -> Result<&mut Self> {
        if slot >= MAX_PASS_INPUTS {
            return Err(LumenError::definition(
                "",
                format!("input slot {slot} out of range (max {MAX_PASS_INPUTS})"),
            ));
        }
        let quad = self.quad_mut("set_input")?;
        if quad.inputs.len() <= slot {
            quad.inputs.resize(slot + 1, None);
        }
        quad.inputs[slot] = Some(name.into());
        Ok(self)
    }

    /// Unbinds input `slot`. No-op on empty slots and non-quad passes.
    pub fn clear_input(&mut self, slot: usize) {
        if let PassKind::RenderQuad(quad) = &mut self.kind {
            if let Some(input) = quad.inputs.get_mut(slot) {
                *input = None;
            }
            while quad.inputs.last().is_some_and(Option::is_none) {
                quad.inputs.pop();
            }
        }
    }

    #[must_use]
    pub fn material_name(&self) -> Option<&str> {
        match &self.kind {
            PassKind::RenderQuad(quad) => quad.material.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn input(&self, slot: usize) -> Option<&str> {
        match &self.kind {
            PassKind::RenderQuad(quad) => quad.inputs.get(slot).and_then(Option::as_deref),
            _ => None,
        }
    }

    /// Clear parameters, if this is a clear pass.
    pub fn clear_settings_mut(&mut self) -> Option<&mut ClearSettings> {
        match &mut self.kind {
            PassKind::Clear(settings) => Some(settings),
            _ => None,
        }
    }

    /// Render-queue range, if this is a scene pass.
    pub fn scene_mut(&mut self) -> Option<&mut ScenePass> {
        match &mut self.kind {
            PassKind::RenderScene(scene) => Some(scene),
            _ => None,
        }
    }

    fn quad_mut(&mut self, op: &str) -> Result<&mut QuadPass> {
        let pass_type = self.pass_type();
        match &mut self.kind {
            PassKind::RenderQuad(quad) => Ok(quad),
            _ => Err(LumenError::definition(
                "",
                format!("{op} requires a RenderQuad pass, found {}", pass_type.name()),
            )),
        }
    }
}
