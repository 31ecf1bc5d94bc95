//! Lumen Core
//!
//! Foundation types shared by every Lumen crate:
//!
//! - [`errors`]: the [`LumenError`] enum and [`Result`] alias
//! - [`format`]: symbolic pixel formats and render system capabilities
//! - [`viewport`]: the application-owned viewport arena
//! - [`params`]: named material constants written by pass listeners

pub mod errors;
pub mod format;
pub mod params;
pub mod viewport;

pub use errors::{LumenError, Result};
pub use format::{Capabilities, PixelFormat, RenderFeatures};
pub use params::{ParamValue, ParameterSet};
pub use viewport::{CameraId, Viewport, ViewportKey, Viewports};
