//! Motion blur: accumulate frames into a feedback texture.

use lumen_compositor::definition::{InputMode, PassType};
use lumen_compositor::manager::CompositorManager;
use lumen_core::errors::Result;
use lumen_core::format::PixelFormat;

pub const NAME: &str = "MotionBlur";

/// Registers the `MotionBlur` compositor.
///
/// `sum` carries the accumulated image from one frame to the next, so it is
/// never shared through the pool and is seeded only on the first frame.
pub fn register(manager: &mut CompositorManager) -> Result<()> {
    let t = manager.create(NAME)?.create_technique();
    for name in ["scene", "sum", "temp"] {
        t.create_texture_definition(name)?
            .set_size(0, 0)
            .set_format(PixelFormat::R8G8B8)
            .set_pooled(name != "sum");
    }

    t.create_target_pass()
        .set_input_mode(InputMode::Previous)
        .set_output_name("scene");

    t.create_target_pass()
        .set_input_mode(InputMode::Previous)
        .set_output_name("sum")
        .set_only_initial(true);

    t.create_target_pass()
        .set_output_name("temp")
        .create_pass(PassType::RenderQuad)
        .set_material_name("Ogre/Compositor/Combine")?
        .set_input(0, "scene")?
        .set_input(1, "sum")?;

    t.create_target_pass()
        .set_output_name("sum")
        .create_pass(PassType::RenderQuad)
        .set_material_name("Ogre/Compositor/Copyback")?
        .set_input(0, "temp")?;

    t.output_target_pass_mut()
        .create_pass(PassType::RenderQuad)
        .set_material_name("Ogre/Compositor/MotionBlur")?
        .set_input(0, "sum")?;
    Ok(())
}
