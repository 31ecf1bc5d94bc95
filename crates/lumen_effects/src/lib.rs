//! Lumen Effects
//!
//! Hand-built post-processing compositors:
//!
//! | Compositor | Textures | Notes |
//! |------------|----------|-------|
//! | [`Bloom`](bloom) | 2 × 128×128 | Copy, two blurs, blend |
//! | [`Hurt`](hurt) | none | Red tint over the previous content |
//! | [`Glass`](glass) | viewport-sized | Refraction of a scene copy |
//! | [`MotionBlur`](motion_blur) | 3 × viewport-sized | Feedback accumulation, `sum` seeded once |
//! | [`HeatVision`](heat_vision) | 2 × 256×256 | Listener-driven light-to-heat pass |

pub mod bloom;
pub mod glass;
pub mod heat_vision;
pub mod hurt;
pub mod motion_blur;

use lumen_compositor::manager::CompositorManager;
use lumen_core::errors::Result;

pub use heat_vision::{HEAT_VISION_PASS_ID, heat_vision_listener, heat_vision_listener_seeded};

/// Names of the demo compositors, in the order the demo attaches them.
pub const DEMO_EFFECTS: [&str; 5] = [
    bloom::NAME,
    hurt::NAME,
    glass::NAME,
    motion_blur::NAME,
    heat_vision::NAME,
];

/// Registers all demo compositors with `manager`.
pub fn register_demo_effects(manager: &mut CompositorManager) -> Result<()> {
    bloom::register(manager)?;
    hurt::register(manager)?;
    glass::register(manager)?;
    motion_blur::register(manager)?;
    heat_vision::register(manager)?;
    log::debug!("Registered {} demo compositors", DEMO_EFFECTS.len());
    Ok(())
}
