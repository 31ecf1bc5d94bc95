//! Bloom: blur a downsampled copy of the scene twice and blend it back.

use lumen_compositor::definition::{InputMode, PassType};
use lumen_compositor::manager::CompositorManager;
use lumen_core::errors::Result;
use lumen_core::format::PixelFormat;

pub const NAME: &str = "Bloom";

/// Registers the `Bloom` compositor.
///
/// | Stage | Input | Writes |
/// |-------|-------|--------|
/// | copy | previous | `rt1` |
/// | `Ogre/Compositor/Blur0` | `rt1` | `rt0` |
/// | `Ogre/Compositor/Blur1` | `rt0` | `rt1` |
/// | `Ogre/Compositor/BloomBlend` | `rt1` | output |
pub fn register(manager: &mut CompositorManager) -> Result<()> {
    let t = manager.create(NAME)?.create_technique();
    for name in ["rt0", "rt1"] {
        t.create_texture_definition(name)?
            .set_size(128, 128)
            .set_format(PixelFormat::A8R8G8B8);
    }

    t.create_target_pass()
        .set_input_mode(InputMode::Previous)
        .set_output_name("rt1");

    t.create_target_pass()
        .set_output_name("rt0")
        .create_pass(PassType::RenderQuad)
        .set_material_name("Ogre/Compositor/Blur0")?
        .set_input(0, "rt1")?;

    t.create_target_pass()
        .set_output_name("rt1")
        .create_pass(PassType::RenderQuad)
        .set_material_name("Ogre/Compositor/Blur1")?
        .set_input(0, "rt0")?;

    t.output_target_pass_mut()
        .set_input_mode(InputMode::Previous)
        .create_pass(PassType::RenderQuad)
        .set_material_name("Ogre/Compositor/BloomBlend")?
        .set_input(0, "rt1")?;
    Ok(())
}
