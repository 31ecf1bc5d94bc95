//! Compositor Settings
//!
//! Tunables of a [`CompositorManager`](crate::CompositorManager), fixed at
//! construction.
//!
//! ```rust,ignore
//! use lumen_compositor::{CompositorManager, CompositorSettings};
//!
//! let manager = CompositorManager::with_settings(CompositorSettings {
//!     enable_on_attach: true,
//!     ..Default::default()
//! });
//! ```

use lumen_core::format::PixelFormat;

/// Configuration of the compositor framework.
///
/// | Field | Default | Effect |
/// |-------|---------|--------|
/// | `output_format` | `A8R8G8B8` | Format of instance output textures and scene captures |
/// | `copy_material` | `"Compositor/Copy"` | Material used to copy a texture input into a stage |
/// | `pool_max_idle_frames` | `3` | Frames an unreferenced pool texture survives |
/// | `enable_on_attach` | `false` | Whether `add_compositor` enables the new instance |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorSettings {
    pub output_format: PixelFormat,
    pub copy_material: String,
    pub pool_max_idle_frames: u32,
    pub enable_on_attach: bool,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            output_format: PixelFormat::A8R8G8B8,
            copy_material: "Compositor/Copy".to_owned(),
            pool_max_idle_frames: 3,
            enable_on_attach: false,
        }
    }
}
