//! Compositor Manager
//!
//! The [`CompositorManager`] is the context object of the framework. It owns
//!
//! - the registry of compositor definitions, by name
//! - one [`CompositorChain`] per viewport that has compositors attached
//! - the [`TexturePool`] shared by every instance of every chain
//! - the [`CompositorSettings`]
//!
//! There is no global instance: the renderer that owns the viewports owns
//! the manager and passes its render system into every call that touches
//! GPU-side resources.
//!
//! ```rust,ignore
//! let mut manager = CompositorManager::new();
//! lumen_effects::register_demo_effects(&mut manager)?;
//!
//! let key = manager.add_compositor(&mut rs, &viewports, vp, "Bloom")?;
//! manager.set_compositor_enabled(vp, "Bloom", true);
//!
//! // every frame
//! manager.render_all(&mut rs, &viewports);
//! ```

use std::collections::hash_map::Entry;
use std::sync::Arc;

use lumen_core::errors::{LumenError, Result};
use lumen_core::viewport::{ViewportKey, Viewports};
use rustc_hash::FxHashMap;
use slotmap::SecondaryMap;

use crate::backend::{RenderSystem, RenderTarget, SceneRequest};
use crate::chain::{CompositorChain, InstanceKey};
use crate::definition::{Compositor, DEFAULT_GROUP};
use crate::instance::{CompileContext, CompositorInstance};
use crate::pool::TexturePool;
use crate::settings::CompositorSettings;

/// Registry, per-viewport chains and shared texture pool.
#[derive(Debug, Default)]
pub struct CompositorManager {
    definitions: FxHashMap<String, Arc<Compositor>>,
    chains: SecondaryMap<ViewportKey, CompositorChain>,
    pool: TexturePool,
    settings: CompositorSettings,
}

impl CompositorManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: CompositorSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    #[must_use]
    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    // ========================================================================
    // Definition Registry
    // ========================================================================

    /// Registers an empty compositor in the default group and returns it for
    /// authoring.
    pub fn create(&mut self, name: &str) -> Result<&mut Compositor> {
        self.create_in_group(name, DEFAULT_GROUP)
    }

    /// Registers an empty compositor in `group`.
    pub fn create_in_group(&mut self, name: &str, group: &str) -> Result<&mut Compositor> {
        let mut compositor = Compositor::new(name);
        compositor.group = group.to_owned();
        match self.definitions.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(LumenError::DuplicateName(name.to_owned())),
            Entry::Vacant(slot) => Ok(Arc::make_mut(slot.insert(Arc::new(compositor)))),
        }
    }

    /// Registers a fully built definition (e.g. one loaded from data).
    pub fn register(&mut self, compositor: Compositor) -> Result<()> {
        match self.definitions.entry(compositor.name.clone()) {
            Entry::Occupied(_) => Err(LumenError::DuplicateName(compositor.name)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(compositor));
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Compositor> {
        self.definitions.get(name).map(AsRef::as_ref)
    }

    /// Mutable access to a registered definition.
    ///
    /// Instances already attached keep the definition they were compiled
    /// from; the edit only affects instances attached afterwards.
    pub fn definition_mut(&mut self, name: &str) -> Option<&mut Compositor> {
        self.definitions.get_mut(name).map(Arc::make_mut)
    }

    /// Names of all registered definitions, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Unregisters a definition. Attached instances keep working.
    pub fn remove(&mut self, name: &str) -> bool {
        self.definitions.remove(name).is_some()
    }

    /// Unregisters every definition of `group`. Returns how many were removed.
    pub fn remove_group(&mut self, group: &str) -> usize {
        let before = self.definitions.len();
        self.definitions.retain(|_, c| c.group != group);
        before - self.definitions.len()
    }

    /// Tears everything down: chains, definitions and pooled textures.
    pub fn remove_all(&mut self, rs: &mut dyn RenderSystem) {
        for chain in self.chains.values_mut() {
            chain.release_all(&mut self.pool);
        }
        self.chains.clear();
        self.definitions.clear();
        self.pool.clear(rs);
    }

    // ========================================================================
    // Attachment
    // ========================================================================

    /// Attaches compositor `name` at the end of the viewport's chain.
    ///
    /// The instance is compiled immediately, so every definition, lookup,
    /// capability and allocation error surfaces here. Failures are also
    /// logged; the chain is left untouched.
    pub fn add_compositor(
        &mut self,
        rs: &mut dyn RenderSystem,
        viewports: &Viewports,
        viewport: ViewportKey,
        name: &str,
    ) -> Result<InstanceKey> {
        self.add_compositor_at(rs, viewports, viewport, name, usize::MAX)
    }

    /// Attaches compositor `name` at `position` (clamped to the chain length).
    pub fn add_compositor_at(
        &mut self,
        rs: &mut dyn RenderSystem,
        viewports: &Viewports,
        viewport: ViewportKey,
        name: &str,
        position: usize,
    ) -> Result<InstanceKey> {
        let result = self.try_add(rs, viewports, viewport, name, position);
        if let Err(err) = &result {
            log::warn!("Cannot add compositor '{name}' to {viewport:?}: {err}");
        }
        result
    }

    fn try_add(
        &mut self,
        rs: &mut dyn RenderSystem,
        viewports: &Viewports,
        viewport: ViewportKey,
        name: &str,
        position: usize,
    ) -> Result<InstanceKey> {
        let vp = viewports
            .get(viewport)
            .ok_or(LumenError::ViewportNotFound(viewport))?;
        let compositor = self
            .definitions
            .get(name)
            .cloned()
            .ok_or_else(|| LumenError::CompositorNotFound(name.to_owned()))?;
        if self
            .chains
            .get(viewport)
            .is_some_and(|chain| chain.find(name).is_some())
        {
            return Err(LumenError::DuplicateInstance(name.to_owned()));
        }

        let technique = compositor.select_technique(&rs.capabilities())?;
        let mut instance = CompositorInstance::new(compositor, technique, viewport);
        instance.compile(
            &mut CompileContext {
                rs,
                pool: &mut self.pool,
                settings: &self.settings,
            },
            vp.size(),
        )?;
        instance.set_enabled(self.settings.enable_on_attach);

        if !self.chains.contains_key(viewport) {
            self.chains.insert(viewport, CompositorChain::new(viewport));
        }
        let chain = self
            .chains
            .get_mut(viewport)
            .ok_or(LumenError::ViewportNotFound(viewport))?;
        let key = chain.insert(instance, position);
        log::debug!(
            "Attached compositor '{name}' to {viewport:?} (technique {technique}, position {})",
            chain.position(key).unwrap_or_default()
        );
        Ok(key)
    }

    /// Detaches compositor `name` and returns its textures to the pool.
    pub fn remove_compositor(&mut self, viewport: ViewportKey, name: &str) -> bool {
        let Some(chain) = self.chains.get_mut(viewport) else {
            return false;
        };
        match chain.find(name) {
            Some(key) => chain.remove(key, &mut self.pool),
            None => false,
        }
    }

    /// Enables or disables compositor `name` on a viewport. Resources stay
    /// allocated either way. Returns `false` if no such instance exists.
    pub fn set_compositor_enabled(
        &mut self,
        viewport: ViewportKey,
        name: &str,
        enabled: bool,
    ) -> bool {
        let found = self
            .chains
            .get_mut(viewport)
            .and_then(|chain| chain.find(name).map(|key| chain.set_enabled(key, enabled)))
            .unwrap_or(false);
        if !found {
            log::warn!("Compositor '{name}' is not attached to {viewport:?}");
        }
        found
    }

    /// Switches an attached instance to another technique of its definition.
    pub fn set_technique(
        &mut self,
        rs: &mut dyn RenderSystem,
        viewports: &Viewports,
        viewport: ViewportKey,
        name: &str,
        technique: usize,
    ) -> Result<()> {
        let size = viewports
            .get(viewport)
            .ok_or(LumenError::ViewportNotFound(viewport))?
            .size();
        let chain = self
            .chains
            .get_mut(viewport)
            .ok_or_else(|| LumenError::CompositorNotFound(name.to_owned()))?;
        let key = chain
            .find(name)
            .ok_or_else(|| LumenError::CompositorNotFound(name.to_owned()))?;
        let instance = chain
            .instance_mut(key)
            .ok_or_else(|| LumenError::CompositorNotFound(name.to_owned()))?;

        let result = instance.set_technique(
            &mut CompileContext {
                rs,
                pool: &mut self.pool,
                settings: &self.settings,
            },
            technique,
            size,
        );
        chain.mark_dirty();
        result
    }

    // ========================================================================
    // Chain Access
    // ========================================================================

    #[must_use]
    pub fn compositor_chain(&self, viewport: ViewportKey) -> Option<&CompositorChain> {
        self.chains.get(viewport)
    }

    #[must_use]
    pub fn has_compositor_chain(&self, viewport: ViewportKey) -> bool {
        self.chains.contains_key(viewport)
    }

    /// Destroys a viewport's chain and returns its textures to the pool.
    pub fn remove_compositor_chain(&mut self, viewport: ViewportKey) -> bool {
        match self.chains.remove(viewport) {
            Some(mut chain) => {
                chain.release_all(&mut self.pool);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn instance(&self, viewport: ViewportKey, key: InstanceKey) -> Option<&CompositorInstance> {
        self.chains.get(viewport)?.instance(key)
    }

    pub fn instance_mut(
        &mut self,
        viewport: ViewportKey,
        key: InstanceKey,
    ) -> Option<&mut CompositorInstance> {
        self.chains.get_mut(viewport)?.instance_mut(key)
    }

    pub fn instance_by_name_mut(
        &mut self,
        viewport: ViewportKey,
        name: &str,
    ) -> Option<&mut CompositorInstance> {
        let chain = self.chains.get_mut(viewport)?;
        let key = chain.find(name)?;
        chain.instance_mut(key)
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Renders one viewport, through its chain if it has one.
    pub fn render_viewport(
        &mut self,
        rs: &mut dyn RenderSystem,
        viewports: &Viewports,
        viewport: ViewportKey,
    ) {
        let Some(vp) = viewports.get(viewport) else {
            log::warn!("Skipping render of removed viewport {viewport:?}");
            return;
        };
        let Some(chain) = self.chains.get_mut(viewport) else {
            rs.render_scene(
                RenderTarget::Viewport(viewport),
                vp.camera,
                &SceneRequest::default(),
            );
            return;
        };

        chain.resolve(
            &mut CompileContext {
                rs: &mut *rs,
                pool: &mut self.pool,
                settings: &self.settings,
            },
            vp.size(),
        );
        chain.render(rs, vp.camera);
    }

    /// Renders every viewport, drops chains of removed viewports and trims
    /// the texture pool.
    pub fn render_all(&mut self, rs: &mut dyn RenderSystem, viewports: &Viewports) {
        let orphaned: Vec<ViewportKey> = self
            .chains
            .keys()
            .filter(|&vp| !viewports.contains(vp))
            .collect();
        for vp in orphaned {
            log::debug!("Dropping compositor chain of removed viewport {vp:?}");
            self.remove_compositor_chain(vp);
        }

        for viewport in viewports.keys() {
            self.render_viewport(rs, viewports, viewport);
        }
        self.pool.trim(rs, self.settings.pool_max_idle_frames);
    }

    /// Drops every compositor texture so enabled instances are reallocated
    /// from fresh storage on their next frame (e.g. after the device lost its
    /// textures).
    pub fn reconstruct_all_resources(&mut self, rs: &mut dyn RenderSystem) {
        for chain in self.chains.values_mut() {
            chain.release_all(&mut self.pool);
        }
        let destroyed = self.pool.destroy_idle(rs);
        log::info!("Reconstructing compositor resources: {destroyed} textures destroyed");
    }
}
