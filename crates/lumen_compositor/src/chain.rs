//! Compositor Chains
//!
//! One [`CompositorChain`] per viewport replaces the viewport's normal scene
//! render. Each enabled instance's output feeds the next enabled instance,
//! and the last one writes the viewport's back buffer.
//!
//! # State Machine
//!
//! | State | Entered on | Next frame |
//! |-------|------------|------------|
//! | `Empty` | no instances | plain scene render |
//! | `Dirty` | resize, add/remove, toggle, technique swap | resolve, then execute |
//! | `Compiled` | successful resolution | execute |
//!
//! Resolution is lazy: it happens at the start of the next frame, never when
//! the change is made.

use lumen_core::viewport::{CameraId, ViewportKey};
use slotmap::{SlotMap, new_key_type};

use crate::backend::{RenderSystem, RenderTarget, SceneRequest, TextureId};
use crate::instance::{ChainInput, CompileContext, CompositorInstance, FrameLink};
use crate::pool::{PoolEntryKey, Sharing, TextureKey, TexturePool};

new_key_type! {
    /// Stable handle to an instance within its chain.
    pub struct InstanceKey;
}

/// Resolution state of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainState {
    Empty,
    Compiled,
    Dirty,
}

/// Per-viewport ordered list of compositor instances.
#[derive(Debug)]
pub struct CompositorChain {
    viewport: ViewportKey,
    instances: SlotMap<InstanceKey, CompositorInstance>,
    order: Vec<InstanceKey>,
    state: ChainState,
    /// Viewport size of the last resolution.
    resolved_size: Option<(u32, u32)>,
    /// Enabled, compiled instances in execution order.
    active: Vec<InstanceKey>,
    /// Receives the original scene when the first active instance samples
    /// `"previous"`. Kept across toggles, dropped on resize or when the
    /// chain empties.
    scene_capture: Option<(PoolEntryKey, TextureId)>,
}

impl CompositorChain {
    pub(crate) fn new(viewport: ViewportKey) -> Self {
        Self {
            viewport,
            instances: SlotMap::with_key(),
            order: Vec::new(),
            state: ChainState::Empty,
            resolved_size: None,
            active: Vec::new(),
            scene_capture: None,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn viewport(&self) -> ViewportKey {
        self.viewport
    }

    #[must_use]
    pub fn state(&self) -> ChainState {
        self.state
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Instances in chain order.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceKey, &CompositorInstance)> {
        self.order.iter().map(|&k| (k, &self.instances[k]))
    }

    /// Compositor names in chain order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|&k| self.instances[k].name())
    }

    #[must_use]
    pub fn instance(&self, key: InstanceKey) -> Option<&CompositorInstance> {
        self.instances.get(key)
    }

    pub fn instance_mut(&mut self, key: InstanceKey) -> Option<&mut CompositorInstance> {
        self.instances.get_mut(key)
    }

    /// Key of the instance of compositor `name`, if attached.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<InstanceKey> {
        self.order
            .iter()
            .copied()
            .find(|&k| self.instances[k].name() == name)
    }

    /// Position of an instance in chain order.
    #[must_use]
    pub fn position(&self, key: InstanceKey) -> Option<usize> {
        self.order.iter().position(|&k| k == key)
    }

    /// Number of enabled instances, as of the last resolution.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Texture holding the captured scene, if the chain needs one.
    #[must_use]
    pub fn scene_capture(&self) -> Option<TextureId> {
        self.scene_capture.map(|(_, t)| t)
    }

    // ── Mutation ───────────────────────────────────────────────────────────

    /// Inserts a compiled instance at `position` (clamped to the length).
    pub(crate) fn insert(&mut self, instance: CompositorInstance, position: usize) -> InstanceKey {
        let key = self.instances.insert(instance);
        let position = position.min(self.order.len());
        self.order.insert(position, key);
        self.state = ChainState::Dirty;
        key
    }

    /// Removes an instance and returns its textures to the pool.
    pub(crate) fn remove(&mut self, key: InstanceKey, pool: &mut TexturePool) -> bool {
        let Some(mut instance) = self.instances.remove(key) else {
            return false;
        };
        instance.release_resources(pool);
        self.order.retain(|&k| k != key);
        self.active.retain(|&k| k != key);
        self.state = ChainState::Dirty;
        true
    }

    /// Flips an instance's enabled flag. Returns `false` for unknown keys.
    pub(crate) fn set_enabled(&mut self, key: InstanceKey, enabled: bool) -> bool {
        let Some(instance) = self.instances.get_mut(key) else {
            return false;
        };
        if instance.is_enabled() != enabled {
            instance.set_enabled(enabled);
            self.state = ChainState::Dirty;
        }
        true
    }

    pub(crate) fn mark_dirty(&mut self) {
        if !self.order.is_empty() {
            self.state = ChainState::Dirty;
        }
    }

    /// Releases every texture held by the chain and its instances.
    pub(crate) fn release_all(&mut self, pool: &mut TexturePool) {
        for instance in self.instances.values_mut() {
            instance.release_resources(pool);
        }
        self.release_capture(pool);
        self.active.clear();
        self.resolved_size = None;
        self.mark_dirty();
    }

    fn release_capture(&mut self, pool: &mut TexturePool) {
        if let Some((entry, _)) = self.scene_capture.take() {
            pool.release(entry);
        }
    }

    // ── Resolution ─────────────────────────────────────────────────────────

    /// Brings the chain back to `Compiled` for a viewport of `size` pixels.
    ///
    /// Instances that fail to recompile are disabled and logged; the rest of
    /// the chain keeps working.
    pub(crate) fn resolve(&mut self, ctx: &mut CompileContext<'_>, size: (u32, u32)) {
        if self.order.is_empty() {
            self.state = ChainState::Empty;
            self.active.clear();
            self.release_capture(ctx.pool);
            return;
        }
        if self.state == ChainState::Compiled && self.resolved_size == Some(size) {
            return;
        }

        if self.resolved_size != Some(size) {
            self.release_capture(ctx.pool);
        }

        loop {
            self.active.clear();
            for &key in &self.order {
                let instance = &mut self.instances[key];
                if !instance.is_enabled() {
                    continue;
                }
                if instance.needs_compile(size) {
                    if let Err(err) = instance.compile(ctx, size) {
                        log::error!(
                            "Disabling compositor '{}' after failed recompile: {err}",
                            instance.name()
                        );
                        instance.set_enabled(false);
                        continue;
                    }
                }
                self.active.push(key);
            }

            let needs_capture = self
                .active
                .first()
                .is_some_and(|&k| self.instances[k].requires_input_texture());
            if !needs_capture || self.scene_capture.is_some() {
                break;
            }
            match self.acquire_capture(ctx, size) {
                Ok(capture) => {
                    self.scene_capture = Some(capture);
                    break;
                }
                Err(err) => {
                    let first = self.active[0];
                    let instance = &mut self.instances[first];
                    log::error!(
                        "Disabling compositor '{}': cannot capture the scene: {err}",
                        instance.name()
                    );
                    instance.set_enabled(false);
                }
            }
        }

        log::debug!(
            "Resolved compositor chain for {:?}: {} of {} instances active",
            self.viewport,
            self.active.len(),
            self.order.len()
        );
        self.resolved_size = Some(size);
        self.state = ChainState::Compiled;
    }

    fn acquire_capture(
        &self,
        ctx: &mut CompileContext<'_>,
        size: (u32, u32),
    ) -> lumen_core::Result<(PoolEntryKey, TextureId)> {
        let key = TextureKey::new(size.0, size.1, ctx.settings.output_format);
        let entry = ctx
            .pool
            .acquire(&mut *ctx.rs, key, Sharing::Exclusive, &[])?;
        match ctx.pool.texture(entry) {
            Some(texture) => Ok((entry, texture)),
            None => {
                ctx.pool.release(entry);
                Err(lumen_core::LumenError::ResourceAllocation {
                    width: size.0,
                    height: size.1,
                    format: key.format,
                    reason: "pool entry vanished".to_owned(),
                })
            }
        }
    }

    // ── Execution ──────────────────────────────────────────────────────────

    /// Renders one frame of the viewport through the chain.
    pub(crate) fn render(&mut self, rs: &mut dyn RenderSystem, camera: CameraId) {
        let viewport = RenderTarget::Viewport(self.viewport);
        if self.active.is_empty() {
            rs.render_scene(viewport, camera, &SceneRequest::default());
            return;
        }

        let first_reads_texture = self
            .instances
            .get(self.active[0])
            .is_some_and(CompositorInstance::requires_input_texture);
        let mut input = match self.scene_capture {
            Some((_, capture)) if first_reads_texture => {
                rs.render_scene(RenderTarget::Texture(capture), camera, &SceneRequest::default());
                ChainInput::Texture(capture)
            }
            _ => ChainInput::Scene,
        };

        let last = self.active.len() - 1;
        for (i, &key) in self.active.iter().enumerate() {
            let Some(instance) = self.instances.get_mut(key) else {
                continue;
            };
            let output = if i == last {
                viewport
            } else {
                match instance.output_texture() {
                    Some(texture) => RenderTarget::Texture(texture),
                    None => continue,
                }
            };
            instance.render(
                rs,
                &FrameLink {
                    input,
                    output,
                    camera,
                },
            );
            if let RenderTarget::Texture(texture) = output {
                input = ChainInput::Texture(texture);
            }
        }
    }
}
