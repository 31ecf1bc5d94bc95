//! Compositor Instances
//!
//! A [`CompositorInstance`] binds one compositor definition to one viewport.
//! Compilation turns the active technique into a flat list of stages whose
//! destinations and inputs are concrete textures; execution walks that list
//! once per frame.
//!
//! # Compilation
//!
//! ```text
//! TextureDefinition ──resolve size──▶ TexturePool::acquire ──▶ HeldTexture
//! CompositionTargetPass ──────────────────────────────────────▶ CompiledStage
//!   ├─ destination: texture index | instance output
//!   ├─ previous:    chain input (stage 0) | destination of stage i − 1
//!   └─ ops:         Clear | RenderScene | CopyPrevious | Quad
//! ```
//!
//! Materials are bound at compile time so a missing material is reported
//! when the compositor is attached, never mid-frame.

use std::sync::Arc;

use lumen_core::errors::{LumenError, Result};
use lumen_core::viewport::{CameraId, ViewportKey};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::backend::{MaterialHandle, RenderSystem, RenderTarget, SceneRequest, TextureId};
use crate::definition::{
    ClearSettings, CompositionTargetPass, CompositionTechnique, Compositor, InputMode,
    PREVIOUS_INPUT, PassKind, TargetOutput,
};
use crate::listener::PassListener;
use crate::pool::{PoolEntryKey, Sharing, TextureKey, TexturePool};
use crate::settings::CompositorSettings;

// ─── Frame Linking ────────────────────────────────────────────────────────────

/// What feeds the first stage of an instance this frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ChainInput {
    /// The viewport's original scene, not yet rendered anywhere.
    Scene,
    /// The previous instance's output (or the chain's scene capture).
    Texture(TextureId),
}

/// Per-frame wiring handed to an instance by its chain.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FrameLink {
    pub input: ChainInput,
    pub output: RenderTarget,
    pub camera: CameraId,
}

/// Collaborators needed while (re)compiling.
pub(crate) struct CompileContext<'a> {
    pub rs: &'a mut dyn RenderSystem,
    pub pool: &'a mut TexturePool,
    pub settings: &'a CompositorSettings,
}

// ─── Compiled Form ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
struct HeldTexture {
    entry: PoolEntryKey,
    texture: TextureId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StageTarget {
    Texture(usize),
    Output,
}

#[derive(Clone, Copy, Debug)]
enum PreviousSource {
    ChainInput,
    Stage(usize),
}

#[derive(Clone, Copy, Debug)]
enum QuadInput {
    Texture(usize),
    Previous,
}

#[derive(Debug)]
enum CompiledOp {
    Clear(ClearSettings),
    RenderScene {
        first_queue: u8,
        last_queue: u8,
    },
    /// Implicit copy of the previous content into the destination.
    CopyPrevious,
    Quad {
        /// Position of the pass in its target pass, for setup bookkeeping.
        pass_index: usize,
        material: MaterialHandle,
        inputs: SmallVec<[(u32, QuadInput); 4]>,
        identifier: Option<u32>,
    },
}

#[derive(Debug)]
struct CompiledStage {
    destination: StageTarget,
    previous: Option<PreviousSource>,
    only_initial: bool,
    visibility_mask: u32,
    lod_bias: f32,
    material_scheme: Option<String>,
    ops: Vec<CompiledOp>,
}

impl CompiledStage {
    fn scene_request(&self) -> SceneRequest<'_> {
        SceneRequest {
            visibility_mask: self.visibility_mask,
            lod_bias: self.lod_bias,
            material_scheme: self.material_scheme.as_deref(),
            ..SceneRequest::default()
        }
    }
}

// ─── Instance ─────────────────────────────────────────────────────────────────

/// Runtime binding of a compositor to a viewport.
///
/// Instances start disabled unless
/// [`CompositorSettings::enable_on_attach`] is set; they are toggled through
/// the owning chain or the manager.
pub struct CompositorInstance {
    compositor: Arc<Compositor>,
    technique: usize,
    viewport: ViewportKey,
    enabled: bool,

    /// Parallel to the technique's texture definitions.
    textures: Vec<Option<HeldTexture>>,
    /// Exclusive viewport-sized texture the output stage renders into when
    /// this instance is not the last of its chain.
    output: Option<HeldTexture>,
    stages: Vec<CompiledStage>,
    copy_material: Option<MaterialHandle>,
    requires_input_texture: bool,

    compiled_size: Option<(u32, u32)>,
    /// `only_initial` stages have run since the last (re)allocation.
    initialised: bool,

    listeners: FxHashMap<u32, Vec<PassListener>>,
    /// `(technique, stage, pass)` triples whose setup notification has fired.
    set_up: FxHashSet<(usize, usize, usize)>,
}

impl CompositorInstance {
    pub(crate) fn new(compositor: Arc<Compositor>, technique: usize, viewport: ViewportKey) -> Self {
        Self {
            compositor,
            technique,
            viewport,
            enabled: false,
            textures: Vec::new(),
            output: None,
            stages: Vec::new(),
            copy_material: None,
            requires_input_texture: false,
            compiled_size: None,
            initialised: false,
            listeners: FxHashMap::default(),
            set_up: FxHashSet::default(),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    /// Definition this instance was compiled from.
    #[must_use]
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.compositor.name
    }

    #[must_use]
    pub fn viewport(&self) -> ViewportKey {
        self.viewport
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Index of the active technique in the definition.
    #[must_use]
    pub fn technique_index(&self) -> usize {
        self.technique
    }

    #[must_use]
    pub fn technique(&self) -> Option<&CompositionTechnique> {
        self.compositor.techniques.get(self.technique)
    }

    /// `true` once compiled and holding its textures.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled_size.is_some()
    }

    /// Viewport size the instance was last compiled against.
    #[must_use]
    pub fn compiled_size(&self) -> Option<(u32, u32)> {
        self.compiled_size
    }

    /// `true` if the first stage samples `"previous"` as a texture.
    #[must_use]
    pub fn requires_input_texture(&self) -> bool {
        self.requires_input_texture
    }

    /// Render texture backing the named texture definition.
    #[must_use]
    pub fn texture(&self, name: &str) -> Option<TextureId> {
        self.held(name).map(|h| h.texture)
    }

    /// Pool entry backing the named texture definition.
    #[must_use]
    pub fn texture_entry(&self, name: &str) -> Option<PoolEntryKey> {
        self.held(name).map(|h| h.entry)
    }

    /// Texture the output stage writes when this instance feeds another.
    #[must_use]
    pub fn output_texture(&self) -> Option<TextureId> {
        self.output.map(|h| h.texture)
    }

    fn held(&self, name: &str) -> Option<&HeldTexture> {
        let index = self
            .technique()?
            .texture_definitions
            .iter()
            .position(|d| d.name == name)?;
        self.textures.get(index)?.as_ref()
    }

    // ── Listeners ──────────────────────────────────────────────────────────

    /// Registers a listener for every pass tagged with `identifier`.
    pub fn add_listener(&mut self, identifier: u32, listener: PassListener) {
        self.listeners.entry(identifier).or_default().push(listener);
    }

    /// Removes all listeners registered for `identifier`.
    pub fn remove_listeners(&mut self, identifier: u32) -> usize {
        self.listeners.remove(&identifier).map_or(0, |l| l.len())
    }

    // ── Compilation ────────────────────────────────────────────────────────

    /// `true` if compiling against `size` would do any work.
    pub(crate) fn needs_compile(&self, size: (u32, u32)) -> bool {
        self.compiled_size != Some(size)
    }

    /// Swaps the active technique and recompiles.
    ///
    /// On failure the previous technique is restored and left for the chain
    /// to recompile on its next frame.
    pub(crate) fn set_technique(
        &mut self,
        ctx: &mut CompileContext<'_>,
        index: usize,
        size: (u32, u32),
    ) -> Result<()> {
        let technique = self.compositor.techniques.get(index).ok_or_else(|| {
            LumenError::definition(
                &self.compositor.name,
                format!("technique index {index} out of range"),
            )
        })?;
        if !technique.is_supported(&ctx.rs.capabilities()) {
            return Err(LumenError::Unsupported(self.compositor.name.clone()));
        }
        technique.validate(&self.compositor.name)?;

        let previous = self.technique;
        self.release_resources(ctx.pool);
        self.technique = index;
        if let Err(err) = self.compile(ctx, size) {
            self.technique = previous;
            return Err(err);
        }
        log::debug!(
            "Compositor '{}' switched to technique {index}",
            self.compositor.name
        );
        Ok(())
    }

    /// (Re)compiles against a viewport of `size` pixels.
    ///
    /// A full compile allocates every texture. A resize only reallocates
    /// viewport-relative textures and the output texture. On error every
    /// texture is released and the instance is left uncompiled.
    pub(crate) fn compile(&mut self, ctx: &mut CompileContext<'_>, size: (u32, u32)) -> Result<()> {
        let result = self.try_compile(ctx, size);
        if result.is_err() {
            self.release_resources(ctx.pool);
        }
        result
    }

    fn try_compile(&mut self, ctx: &mut CompileContext<'_>, size: (u32, u32)) -> Result<()> {
        let compositor = Arc::clone(&self.compositor);
        let technique = compositor.techniques.get(self.technique).ok_or_else(|| {
            LumenError::definition(&compositor.name, "active technique no longer exists")
        })?;

        match self.compiled_size {
            Some(old) => {
                if old == size {
                    return Ok(());
                }
                self.release_relative(ctx.pool, technique);
                log::debug!(
                    "Compositor '{}' resized {}x{} -> {}x{}",
                    compositor.name,
                    old.0,
                    old.1,
                    size.0,
                    size.1
                );
            }
            None => self.release_resources(ctx.pool),
        }

        self.acquire_textures(ctx, technique, size)?;
        self.compile_stages(ctx, technique)?;

        self.compiled_size = Some(size);
        self.initialised = false;
        log::debug!(
            "Compiled compositor '{}' (technique {}, {} stages, {} textures) for {}x{}",
            compositor.name,
            self.technique,
            self.stages.len(),
            self.textures.len(),
            size.0,
            size.1
        );
        Ok(())
    }

    fn acquire_textures(
        &mut self,
        ctx: &mut CompileContext<'_>,
        technique: &CompositionTechnique,
        size: (u32, u32),
    ) -> Result<()> {
        self.textures
            .resize(technique.texture_definitions.len(), None);

        for (index, def) in technique.texture_definitions.iter().enumerate() {
            if self.textures[index].is_some() {
                continue;
            }
            let (width, height) = def.resolve_size(size);
            let sharing = if def.pooled {
                Sharing::Shared
            } else {
                Sharing::Exclusive
            };
            let held = self.held_entries();
            let entry = ctx.pool.acquire(
                &mut *ctx.rs,
                TextureKey::new(width, height, def.format),
                sharing,
                &held,
            )?;
            self.textures[index] = Some(Self::hold(ctx.pool, entry)?);
        }

        if self.output.is_none() {
            let held = self.held_entries();
            let entry = ctx.pool.acquire(
                &mut *ctx.rs,
                TextureKey::new(size.0, size.1, ctx.settings.output_format),
                Sharing::Exclusive,
                &held,
            )?;
            self.output = Some(Self::hold(ctx.pool, entry)?);
        }
        Ok(())
    }

    fn hold(pool: &mut TexturePool, entry: PoolEntryKey) -> Result<HeldTexture> {
        match pool.texture(entry) {
            Some(texture) => Ok(HeldTexture { entry, texture }),
            None => {
                pool.release(entry);
                Err(LumenError::definition("", "pool returned a dangling entry"))
            }
        }
    }

    fn held_entries(&self) -> SmallVec<[PoolEntryKey; 8]> {
        self.textures
            .iter()
            .flatten()
            .chain(self.output.iter())
            .map(|h| h.entry)
            .collect()
    }

    fn compile_stages(
        &mut self,
        ctx: &mut CompileContext<'_>,
        technique: &CompositionTechnique,
    ) -> Result<()> {
        let name = &self.compositor.name;
        let texture_index = |tex: &str| {
            technique
                .texture_definitions
                .iter()
                .position(|d| d.name == tex)
                .ok_or_else(|| {
                    LumenError::definition(name, format!("undefined texture '{tex}'"))
                })
        };

        let mut stages = Vec::with_capacity(technique.target_passes.len() + 1);
        let mut needs_copy = false;

        for (stage_index, stage) in technique.stages().enumerate() {
            let destination = match &stage.output {
                TargetOutput::Texture(tex) => StageTarget::Texture(texture_index(tex.as_str())?),
                TargetOutput::Final => StageTarget::Output,
            };
            let previous = (stage.input_mode == InputMode::Previous).then(|| {
                if stage_index == 0 {
                    PreviousSource::ChainInput
                } else {
                    PreviousSource::Stage(stage_index - 1)
                }
            });

            let ops = if stage.is_implicit_copy() {
                needs_copy = true;
                vec![CompiledOp::CopyPrevious]
            } else {
                Self::compile_passes(ctx.rs, stage, &texture_index)?
            };

            stages.push(CompiledStage {
                destination,
                previous,
                only_initial: stage.only_initial,
                visibility_mask: stage.visibility_mask,
                lod_bias: stage.lod_bias,
                material_scheme: stage.material_scheme.clone(),
                ops,
            });
        }

        self.copy_material = if needs_copy {
            Some(ctx.rs.bind_material(&ctx.settings.copy_material)?)
        } else {
            None
        };
        self.requires_input_texture = stages.first().is_some_and(|first| {
            matches!(first.previous, Some(PreviousSource::ChainInput))
                && first.ops.iter().any(|op| {
                    matches!(op, CompiledOp::Quad { inputs, .. }
                        if inputs.iter().any(|(_, i)| matches!(i, QuadInput::Previous)))
                })
        });
        self.stages = stages;
        Ok(())
    }

    fn compile_passes(
        rs: &mut dyn RenderSystem,
        stage: &CompositionTargetPass,
        texture_index: &dyn Fn(&str) -> Result<usize>,
    ) -> Result<Vec<CompiledOp>> {
        let mut ops = Vec::with_capacity(stage.passes.len());
        for (pass_index, pass) in stage.passes.iter().enumerate() {
            let op = match &pass.kind {
                PassKind::Clear(settings) => CompiledOp::Clear(settings.clone()),
                PassKind::RenderScene(scene) => CompiledOp::RenderScene {
                    first_queue: scene.first_queue,
                    last_queue: scene.last_queue,
                },
                PassKind::RenderQuad(quad) => {
                    let material_name = quad.material.as_deref().unwrap_or_default();
                    let material = rs.bind_material(material_name)?;
                    let inputs = quad
                        .bound_inputs()
                        .map(|(slot, input)| {
                            if input == PREVIOUS_INPUT {
                                Ok((slot, QuadInput::Previous))
                            } else {
                                texture_index(input).map(|i| (slot, QuadInput::Texture(i)))
                            }
                        })
                        .collect::<Result<_>>()?;
                    CompiledOp::Quad {
                        pass_index,
                        material,
                        inputs,
                        identifier: pass.identifier,
                    }
                }
            };
            ops.push(op);
        }
        Ok(ops)
    }

    fn release_relative(&mut self, pool: &mut TexturePool, technique: &CompositionTechnique) {
        for (slot, def) in self.textures.iter_mut().zip(&technique.texture_definitions) {
            if def.is_viewport_relative() {
                if let Some(held) = slot.take() {
                    pool.release(held.entry);
                }
            }
        }
        if let Some(held) = self.output.take() {
            pool.release(held.entry);
        }
    }

    /// Returns every texture to the pool and drops the compiled stages.
    pub(crate) fn release_resources(&mut self, pool: &mut TexturePool) {
        for held in self.textures.drain(..).flatten().chain(self.output.take()) {
            pool.release(held.entry);
        }
        self.stages.clear();
        self.copy_material = None;
        self.requires_input_texture = false;
        self.compiled_size = None;
        self.initialised = false;
    }

    // ── Execution ──────────────────────────────────────────────────────────

    /// Executes the compiled stages for one frame.
    pub(crate) fn render(&mut self, rs: &mut dyn RenderSystem, link: &FrameLink) {
        let Self {
            technique,
            textures,
            stages,
            copy_material,
            initialised,
            listeners,
            set_up,
            ..
        } = self;

        let stage_target = |target: StageTarget| match target {
            StageTarget::Texture(i) => textures
                .get(i)
                .copied()
                .flatten()
                .map(|h| RenderTarget::Texture(h.texture)),
            StageTarget::Output => Some(link.output),
        };

        for (stage_index, stage) in stages.iter().enumerate() {
            if stage.only_initial && *initialised {
                continue;
            }
            let Some(target) = stage_target(stage.destination) else {
                continue;
            };
            let previous = match stage.previous {
                None => None,
                Some(PreviousSource::ChainInput) => Some(link.input),
                Some(PreviousSource::Stage(j)) => match stage_target(stages[j].destination) {
                    Some(RenderTarget::Texture(t)) => Some(ChainInput::Texture(t)),
                    _ => None,
                },
            };
            let request = stage.scene_request();

            for op in &stage.ops {
                match op {
                    CompiledOp::Clear(settings) => rs.clear(target, settings),
                    CompiledOp::RenderScene {
                        first_queue,
                        last_queue,
                    } => rs.render_scene(
                        target,
                        link.camera,
                        &SceneRequest {
                            first_queue: *first_queue,
                            last_queue: *last_queue,
                            ..request
                        },
                    ),
                    CompiledOp::CopyPrevious => match (previous, *copy_material) {
                        (Some(ChainInput::Scene), _) => {
                            rs.render_scene(target, link.camera, &request);
                        }
                        (Some(ChainInput::Texture(source)), Some(copy)) => {
                            rs.set_texture_unit(copy, 0, source);
                            rs.draw_quad(target, copy);
                        }
                        _ => {}
                    },
                    CompiledOp::Quad {
                        pass_index,
                        material,
                        inputs,
                        identifier,
                    } => {
                        for &(slot, input) in inputs {
                            let source = match input {
                                QuadInput::Texture(i) => {
                                    textures.get(i).copied().flatten().map(|h| h.texture)
                                }
                                QuadInput::Previous => match previous {
                                    Some(ChainInput::Texture(t)) => Some(t),
                                    _ => None,
                                },
                            };
                            if let Some(texture) = source {
                                rs.set_texture_unit(*material, slot, texture);
                            }
                        }

                        if let Some(id) = *identifier
                            && let Some(registered) = listeners.get_mut(&id)
                            && !registered.is_empty()
                        {
                            let params = rs.parameters_mut(*material);
                            if set_up.insert((*technique, stage_index, *pass_index)) {
                                for listener in registered.iter_mut() {
                                    listener.notify_material_setup(id, *material, params);
                                }
                            }
                            for listener in registered.iter_mut() {
                                listener.notify_material_render(id, *material, params);
                            }
                        }

                        rs.draw_quad(target, *material);
                    }
                }
            }
        }
        *initialised = true;
    }
}

impl std::fmt::Debug for CompositorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositorInstance")
            .field("compositor", &self.compositor.name)
            .field("technique", &self.technique)
            .field("viewport", &self.viewport)
            .field("enabled", &self.enabled)
            .field("compiled_size", &self.compiled_size)
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}
