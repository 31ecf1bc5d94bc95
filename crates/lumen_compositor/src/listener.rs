//! Pass Listeners
//!
//! The single extension point into otherwise declarative passes. A listener
//! registered for a pass identifier gets a chance to write material
//! constants right before that pass draws.

use std::fmt;

use lumen_core::params::ParameterSet;

use crate::backend::MaterialHandle;

/// Callback signature: `(pass identifier, material, material constants)`.
pub type PassCallback = Box<dyn FnMut(u32, MaterialHandle, &mut ParameterSet)>;

/// Optional setup / render callback pair for one pass identifier.
///
/// - `on_setup` fires once per instance lifetime, the first time the pass
///   executes.
/// - `on_render` fires every time the pass executes, before its draw.
#[derive(Default)]
pub struct PassListener {
    setup: Option<PassCallback>,
    render: Option<PassCallback>,
}

impl PassListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_setup(
        mut self,
        f: impl FnMut(u32, MaterialHandle, &mut ParameterSet) + 'static,
    ) -> Self {
        self.setup = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_render(
        mut self,
        f: impl FnMut(u32, MaterialHandle, &mut ParameterSet) + 'static,
    ) -> Self {
        self.render = Some(Box::new(f));
        self
    }

    pub(crate) fn notify_material_setup(
        &mut self,
        pass_id: u32,
        material: MaterialHandle,
        params: &mut ParameterSet,
    ) {
        if let Some(f) = &mut self.setup {
            f(pass_id, material, params);
        }
    }

    pub(crate) fn notify_material_render(
        &mut self,
        pass_id: u32,
        material: MaterialHandle,
        params: &mut ParameterSet,
    ) {
        if let Some(f) = &mut self.render {
            f(pass_id, material, params);
        }
    }
}

impl fmt::Debug for PassListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassListener")
            .field("setup", &self.setup.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}
