//! # Lumen
//!
//! Declarative multi-pass post-processing for real-time 3D rendering.
//!
//! This umbrella crate re-exports the workspace crates:
//!
//! | Module | Crate | Contents |
//! |--------|-------|----------|
//! | [`core`] | `lumen_core` | Errors, viewports, pixel formats, material parameters |
//! | [`compositor`] | `lumen_compositor` | Definitions, instances, chains, manager, texture pool |
//! | [`effects`] | `lumen_effects` | Bloom, Hurt, Glass, MotionBlur, HeatVision |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lumen::prelude::*;
//!
//! let mut viewports = Viewports::new();
//! let vp = viewports.add(Viewport::new(1280, 720, CameraId(0)));
//!
//! let mut manager = CompositorManager::new();
//! lumen::effects::register_demo_effects(&mut manager)?;
//!
//! manager.add_compositor(&mut render_system, &viewports, vp, "Bloom")?;
//! manager.set_compositor_enabled(vp, "Bloom", true);
//!
//! loop {
//!     manager.render_all(&mut render_system, &viewports);
//! }
//! ```

pub use lumen_compositor as compositor;
pub use lumen_core as core;
pub use lumen_effects as effects;

pub use lumen_compositor::{
    CompositorChain, CompositorInstance, CompositorManager, CompositorSettings, InstanceKey,
    PassListener, RenderSystem,
};
pub use lumen_core::{LumenError, Result};

/// Commonly used types, for glob import.
pub mod prelude {
    pub use glam::Vec4;

    pub use lumen_compositor::backend::{
        MaterialHandle, MaterialSystem, RenderSystem, RenderTarget, SceneRequest, TextureDesc,
        TextureId,
    };
    pub use lumen_compositor::chain::{ChainState, CompositorChain, InstanceKey};
    pub use lumen_compositor::definition::{
        ClearBuffers, CompositionPass, CompositionTargetPass, CompositionTechnique, Compositor,
        InputMode, PREVIOUS_INPUT, PassType, TargetOutput, TextureDefinition,
    };
    pub use lumen_compositor::instance::CompositorInstance;
    pub use lumen_compositor::listener::PassListener;
    pub use lumen_compositor::manager::CompositorManager;
    pub use lumen_compositor::settings::CompositorSettings;
    pub use lumen_core::errors::{LumenError, Result};
    pub use lumen_core::format::{Capabilities, PixelFormat, RenderFeatures};
    pub use lumen_core::params::{ParamValue, ParameterSet};
    pub use lumen_core::viewport::{CameraId, Viewport, ViewportKey, Viewports};
}
