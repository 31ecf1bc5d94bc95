//! Glass: refract a full-resolution copy of the scene.

use lumen_compositor::definition::{InputMode, PassType};
use lumen_compositor::manager::CompositorManager;
use lumen_core::errors::Result;
use lumen_core::format::PixelFormat;

pub const NAME: &str = "Glass";

/// Registers the `Glass` compositor. Its `rt0` follows the viewport size.
pub fn register(manager: &mut CompositorManager) -> Result<()> {
    let t = manager.create(NAME)?.create_technique();
    t.create_texture_definition("rt0")?
        .set_size(0, 0)
        .set_format(PixelFormat::R8G8B8);

    t.create_target_pass()
        .set_input_mode(InputMode::Previous)
        .set_output_name("rt0");

    t.output_target_pass_mut()
        .create_pass(PassType::RenderQuad)
        .set_material_name("Ogre/Compositor/GlassPass")?
        .set_input(0, "rt0")?;
    Ok(())
}
