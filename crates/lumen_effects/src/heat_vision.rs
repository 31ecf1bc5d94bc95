//! Heat vision: map scene luminance to a heat palette, with flickering noise
//! and a slowly wandering depth modulation driven by a pass listener.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use glam::Vec4;
use lumen_compositor::definition::{InputMode, PassType};
use lumen_compositor::listener::PassListener;
use lumen_compositor::manager::CompositorManager;
use lumen_core::errors::Result;
use lumen_core::format::PixelFormat;
use lumen_core::params::ParameterSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const NAME: &str = "HeatVision";

/// Identifier of the light-to-heat pass, the one the listener drives.
pub const HEAT_VISION_PASS_ID: u32 = 0xDEAD_BABE;

/// Registers the `HeatVision` compositor. Both intermediate textures are a
/// fixed 256×256 regardless of the viewport.
pub fn register(manager: &mut CompositorManager) -> Result<()> {
    let t = manager.create(NAME)?.create_technique();
    for name in ["scene", "temp"] {
        t.create_texture_definition(name)?
            .set_size(256, 256)
            .set_format(PixelFormat::R8G8B8);
    }

    t.create_target_pass()
        .set_input_mode(InputMode::Previous)
        .set_output_name("scene");

    t.create_target_pass()
        .set_output_name("temp")
        .create_pass(PassType::RenderQuad)
        .set_identifier(HEAT_VISION_PASS_ID)
        .set_material_name("Fury/HeatVision/LightToHeat")?
        .set_input(0, "scene")?;

    t.output_target_pass_mut()
        .create_pass(PassType::RenderQuad)
        .set_material_name("Fury/HeatVision/Blur")?
        .set_input(0, "temp")?;
    Ok(())
}

// ─── Listener ─────────────────────────────────────────────────────────────────

/// Parameter animation state shared by the setup and render callbacks.
struct HeatVisionState {
    rng: StdRng,
    timer: Instant,
    current: f32,
    target: f32,
}

impl HeatVisionState {
    fn update(&mut self, params: &mut ParameterSet) {
        params.set_named_constant(
            "random_fractions",
            Vec4::new(
                self.rng.random_range(0.0..1.0),
                self.rng.random_range(0.0..1.0),
                0.0,
                0.0,
            ),
        );

        let step = self.timer.elapsed().as_secs_f32();
        if (self.current - self.target).abs() <= 0.001 {
            self.target = self.rng.random_range(0.95..1.0);
        } else if self.current > self.target {
            self.current -= step;
        } else {
            self.current += step;
        }
        self.timer = Instant::now();

        params.set_named_constant("depth_modulator", Vec4::new(self.current, 0.0, 0.0, 0.0));
    }
}

/// Listener animating `random_fractions` and `depth_modulator` on the
/// light-to-heat pass.
#[must_use]
pub fn heat_vision_listener() -> PassListener {
    listener_with_rng(StdRng::from_os_rng())
}

/// Same as [`heat_vision_listener`] with a deterministic noise sequence.
#[must_use]
pub fn heat_vision_listener_seeded(seed: u64) -> PassListener {
    listener_with_rng(StdRng::seed_from_u64(seed))
}

fn listener_with_rng(rng: StdRng) -> PassListener {
    let state = Rc::new(RefCell::new(HeatVisionState {
        rng,
        timer: Instant::now(),
        current: 0.0,
        target: 0.0,
    }));
    let on_render = Rc::clone(&state);

    PassListener::new()
        .on_setup(move |pass_id, _, _| {
            if pass_id == HEAT_VISION_PASS_ID {
                state.borrow_mut().timer = Instant::now();
            }
        })
        .on_render(move |pass_id, _, params| {
            if pass_id == HEAT_VISION_PASS_ID {
                on_render.borrow_mut().update(params);
            }
        })
}
