//! Lumen Developer Utilities
//!
//! [`RecordingBackend`] is a headless render system: it hands out texture and
//! material handles, remembers texture-unit bindings and material constants,
//! and appends every clear, scene render and quad draw to an operation log
//! instead of touching a GPU. Tests assert against that log; the demo app
//! prints it.

use std::fmt;

use lumen_compositor::backend::{
    MaterialHandle, MaterialSystem, RenderSystem, RenderTarget, SceneRequest, TextureDesc,
    TextureId,
};
use lumen_compositor::definition::{ClearBuffers, ClearSettings};
use lumen_compositor::settings::CompositorSettings;
use lumen_core::errors::{LumenError, Result};
use lumen_core::format::Capabilities;
use lumen_core::params::ParameterSet;
use lumen_core::viewport::CameraId;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

// ─── Recorded Operations ──────────────────────────────────────────────────────

/// One operation issued to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOp {
    Clear {
        target: RenderTarget,
        buffers: ClearBuffers,
    },
    RenderScene {
        target: RenderTarget,
        camera: CameraId,
        visibility_mask: u32,
        material_scheme: Option<String>,
    },
    DrawQuad {
        target: RenderTarget,
        material: String,
        /// Texture units bound on the material at draw time, by slot.
        inputs: Vec<(u32, TextureId)>,
        /// Snapshot of the material constants at draw time.
        params: ParameterSet,
    },
}

impl RecordedOp {
    #[must_use]
    pub fn target(&self) -> RenderTarget {
        match self {
            Self::Clear { target, .. }
            | Self::RenderScene { target, .. }
            | Self::DrawQuad { target, .. } => *target,
        }
    }

    /// `true` if the operation renders into an intermediate texture.
    #[must_use]
    pub fn is_render_to_texture(&self) -> bool {
        matches!(self.target(), RenderTarget::Texture(_))
    }

    #[must_use]
    pub fn is_scene_render(&self) -> bool {
        matches!(self, Self::RenderScene { .. })
    }

    /// Material of a quad draw.
    #[must_use]
    pub fn material(&self) -> Option<&str> {
        match self {
            Self::DrawQuad { material, .. } => Some(material),
            _ => None,
        }
    }

    /// Texture bound to `slot` at draw time.
    #[must_use]
    pub fn input(&self, slot: u32) -> Option<TextureId> {
        match self {
            Self::DrawQuad { inputs, .. } => {
                inputs.iter().find(|(s, _)| *s == slot).map(|(_, t)| *t)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RecordedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear { target, buffers } => write!(f, "clear {buffers:?} -> {target:?}"),
            Self::RenderScene { target, camera, .. } => {
                write!(f, "scene (camera {}) -> {target:?}", camera.0)
            }
            Self::DrawQuad {
                target,
                material,
                inputs,
                ..
            } => {
                write!(f, "quad '{material}'")?;
                for (slot, texture) in inputs {
                    write!(f, " [{slot}: {}]", texture.0)?;
                }
                write!(f, " -> {target:?}")
            }
        }
    }
}

// ─── Backend ──────────────────────────────────────────────────────────────────

struct MaterialState {
    name: String,
    units: SmallVec<[(u32, TextureId); 4]>,
    params: ParameterSet,
}

/// Headless render system that records everything it is asked to do.
pub struct RecordingBackend {
    capabilities: Capabilities,
    /// When set, only registered materials resolve.
    strict_materials: bool,
    known_materials: FxHashSet<String>,
    materials: Vec<MaterialState>,
    material_lookup: FxHashMap<String, MaterialHandle>,

    textures: FxHashMap<TextureId, TextureDesc>,
    next_texture: u32,
    /// Maximum number of live textures; creation beyond it fails.
    texture_budget: Option<usize>,
    created: usize,
    destroyed: usize,

    ops: Vec<RecordedOp>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// Backend supporting every feature and accepting any material name.
    #[must_use]
    pub fn new() -> Self {
        let mut backend = Self {
            capabilities: Capabilities::all(),
            strict_materials: false,
            known_materials: FxHashSet::default(),
            materials: Vec::new(),
            material_lookup: FxHashMap::default(),
            textures: FxHashMap::default(),
            next_texture: 0,
            texture_budget: None,
            created: 0,
            destroyed: 0,
            ops: Vec::new(),
        };
        backend.register_material(&CompositorSettings::default().copy_material);
        backend
    }

    /// Backend that only resolves materials added with
    /// [`register_material`](Self::register_material).
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_materials: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Fails texture creation once `budget` textures are alive.
    #[must_use]
    pub fn with_texture_budget(mut self, budget: usize) -> Self {
        self.texture_budget = Some(budget);
        self
    }

    pub fn set_texture_budget(&mut self, budget: Option<usize>) {
        self.texture_budget = budget;
    }

    pub fn register_material(&mut self, name: &str) -> &mut Self {
        self.known_materials.insert(name.to_owned());
        self
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    /// Operations recorded since the last [`take_ops`](Self::take_ops).
    #[must_use]
    pub fn ops(&self) -> &[RecordedOp] {
        &self.ops
    }

    /// Drains the operation log.
    pub fn take_ops(&mut self) -> Vec<RecordedOp> {
        std::mem::take(&mut self.ops)
    }

    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(&texture).copied()
    }

    #[must_use]
    pub fn textures_created(&self) -> usize {
        self.created
    }

    #[must_use]
    pub fn textures_destroyed(&self) -> usize {
        self.destroyed
    }

    /// Current constants of a material that has been bound at least once.
    #[must_use]
    pub fn material_params(&self, name: &str) -> Option<&ParameterSet> {
        let handle = self.material_lookup.get(name)?;
        self.materials.get(handle.0 as usize).map(|m| &m.params)
    }

    fn material_name(&self, material: MaterialHandle) -> String {
        self.materials
            .get(material.0 as usize)
            .map_or_else(|| format!("<unknown {}>", material.0), |m| m.name.clone())
    }
}

impl MaterialSystem for RecordingBackend {
    fn bind_material(&mut self, name: &str) -> Result<MaterialHandle> {
        if let Some(handle) = self.material_lookup.get(name) {
            return Ok(*handle);
        }
        if name.is_empty() || (self.strict_materials && !self.known_materials.contains(name)) {
            return Err(LumenError::MaterialNotFound(name.to_owned()));
        }
        let handle = MaterialHandle(self.materials.len() as u32);
        self.materials.push(MaterialState {
            name: name.to_owned(),
            units: SmallVec::new(),
            params: ParameterSet::new(),
        });
        self.material_lookup.insert(name.to_owned(), handle);
        Ok(handle)
    }

    fn set_texture_unit(&mut self, material: MaterialHandle, slot: u32, texture: TextureId) {
        let Some(state) = self.materials.get_mut(material.0 as usize) else {
            log::warn!("Texture bound to unknown material {material:?}");
            return;
        };
        match state.units.iter_mut().find(|(s, _)| *s == slot) {
            Some(unit) => unit.1 = texture,
            None => {
                state.units.push((slot, texture));
                state.units.sort_unstable_by_key(|(s, _)| *s);
            }
        }
    }

    fn parameters_mut(&mut self, material: MaterialHandle) -> &mut ParameterSet {
        let index = material.0 as usize;
        if index >= self.materials.len() {
            // Unknown handles get a scratch slot so callers never panic.
            self.materials.resize_with(index + 1, || MaterialState {
                name: String::new(),
                units: SmallVec::new(),
                params: ParameterSet::new(),
            });
        }
        &mut self.materials[index].params
    }
}

impl RenderSystem for RecordingBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        if self
            .texture_budget
            .is_some_and(|budget| self.textures.len() >= budget)
        {
            return Err(LumenError::ResourceAllocation {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                reason: "texture budget exhausted".to_owned(),
            });
        }
        self.next_texture += 1;
        let id = TextureId(self.next_texture);
        self.textures.insert(id, *desc);
        self.created += 1;
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.destroyed += 1;
        } else {
            log::warn!("Destroying unknown texture {texture:?}");
        }
    }

    fn clear(&mut self, target: RenderTarget, settings: &ClearSettings) {
        self.ops.push(RecordedOp::Clear {
            target,
            buffers: settings.buffers,
        });
    }

    fn render_scene(&mut self, target: RenderTarget, camera: CameraId, request: &SceneRequest<'_>) {
        self.ops.push(RecordedOp::RenderScene {
            target,
            camera,
            visibility_mask: request.visibility_mask,
            material_scheme: request.material_scheme.map(str::to_owned),
        });
    }

    fn draw_quad(&mut self, target: RenderTarget, material: MaterialHandle) {
        let (inputs, params) = self
            .materials
            .get(material.0 as usize)
            .map(|m| (m.units.to_vec(), m.params.clone()))
            .unwrap_or_default();
        let material = self.material_name(material);
        self.ops.push(RecordedOp::DrawQuad {
            target,
            material,
            inputs,
            params,
        });
    }
}
