//! Render System Interface
//!
//! The compositor framework never draws anything itself. It decides *when*
//! and *into what* to render, and delegates the actual work to the engine's
//! render system through the traits in this module:
//!
//! | Trait | Responsibility |
//! |-------|----------------|
//! | [`MaterialSystem`] | Resolve materials by name, bind textures to units, expose shader constants |
//! | [`RenderSystem`] | Capabilities, render texture lifetime, clears, scene renders, quad draws |
//!
//! Handles ([`TextureId`], [`MaterialHandle`]) are opaque to the framework.

use lumen_core::errors::Result;
use lumen_core::format::{Capabilities, PixelFormat};
use lumen_core::params::ParameterSet;
use lumen_core::viewport::{CameraId, ViewportKey};

use crate::definition::ClearSettings;

/// Opaque handle to a render texture created by the render system.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureId(pub u32);

/// Opaque handle to a material prepared by the material system.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MaterialHandle(pub u32);

/// Destination of a render operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RenderTarget {
    /// The viewport's real back buffer.
    Viewport(ViewportKey),
    /// An intermediate render texture.
    Texture(TextureId),
}

/// Descriptor for creating a render texture.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Scene render parameters taken from the issuing stage.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SceneRequest<'a> {
    pub visibility_mask: u32,
    pub lod_bias: f32,
    pub material_scheme: Option<&'a str>,
    pub first_queue: u8,
    pub last_queue: u8,
}

impl Default for SceneRequest<'_> {
    fn default() -> Self {
        Self {
            visibility_mask: 0xFFFF_FFFF,
            lod_bias: 1.0,
            material_scheme: None,
            first_queue: crate::definition::RENDER_QUEUE_BACKGROUND,
            last_queue: crate::definition::RENDER_QUEUE_SKIES_LATE,
        }
    }
}

/// Material collaborator.
pub trait MaterialSystem {
    /// Prepares a material for drawing. Fails with `MaterialNotFound` if the
    /// name does not resolve.
    fn bind_material(&mut self, name: &str) -> Result<MaterialHandle>;

    /// Binds `texture` as the source of texture unit `slot` of `material`.
    fn set_texture_unit(&mut self, material: MaterialHandle, slot: u32, texture: TextureId);

    /// Shader constants of `material`, writable by pass listeners.
    fn parameters_mut(&mut self, material: MaterialHandle) -> &mut ParameterSet;
}

/// Render system collaborator.
pub trait RenderSystem: MaterialSystem {
    fn capabilities(&self) -> Capabilities;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;

    fn destroy_texture(&mut self, texture: TextureId);

    fn clear(&mut self, target: RenderTarget, settings: &ClearSettings);

    /// Draws the scene as seen by `camera` into `target`.
    fn render_scene(&mut self, target: RenderTarget, camera: CameraId, request: &SceneRequest<'_>);

    /// Draws a full-target quad with `material`.
    fn draw_quad(&mut self, target: RenderTarget, material: MaterialHandle);
}
