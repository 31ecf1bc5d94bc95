//! Hurt: tint the whole frame red.

use lumen_compositor::definition::{InputMode, PREVIOUS_INPUT, PassType};
use lumen_compositor::manager::CompositorManager;
use lumen_core::errors::Result;

pub const NAME: &str = "Hurt";

/// Registers the `Hurt` compositor: one `RedQuad` pass over the previous
/// content.
pub fn register(manager: &mut CompositorManager) -> Result<()> {
    manager
        .create(NAME)?
        .create_technique()
        .output_target_pass_mut()
        .set_input_mode(InputMode::Previous)
        .create_pass(PassType::RenderQuad)
        .set_material_name("RedQuad")?
        .set_input(0, PREVIOUS_INPUT)?;
    Ok(())
}
