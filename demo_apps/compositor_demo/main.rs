//! Compositor Demo
//!
//! Attaches every stock effect plus one data-driven compositor to a single
//! viewport, then plays a short script of toggles and a resize against the
//! headless [`RecordingBackend`], printing each frame's operations.
//!
//! ```text
//! RUST_LOG=debug cargo run -p compositor_demo
//! ```

use anyhow::Context;
use lumen::effects::{DEMO_EFFECTS, HEAT_VISION_PASS_ID, heat_vision_listener, register_demo_effects};
use lumen::prelude::*;
use lumen_dev_utils::RecordingBackend;

/// A compositor authored as data rather than code.
const INVERT: &str = r#"{
    "name": "Invert",
    "group": "Demo",
    "techniques": [{
        "output_target_pass": {
            "output": "final",
            "input_mode": "previous",
            "passes": [
                { "kind": { "type": "render_quad", "material": "Demo/Invert", "inputs": ["previous"] } }
            ]
        }
    }]
}"#;

enum Step {
    Enable(&'static str, bool),
    Resize(u32, u32),
}

/// `(frame, step)` pairs, applied before the frame renders.
const SCRIPT: &[(u32, Step)] = &[
    (1, Step::Enable("Bloom", true)),
    (2, Step::Enable("Hurt", true)),
    (3, Step::Enable("HeatVision", true)),
    (4, Step::Resize(1920, 1080)),
    (5, Step::Enable("Bloom", false)),
    (5, Step::Enable("MotionBlur", true)),
    (6, Step::Enable("Invert", true)),
    (7, Step::Enable("Hurt", false)),
];

const FRAMES: u32 = 8;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rs = RecordingBackend::new();
    let mut viewports = Viewports::new();
    let vp = viewports.add(Viewport::new(1280, 720, CameraId(0)));

    let mut manager = CompositorManager::new();
    register_demo_effects(&mut manager)?;
    let invert: Compositor =
        serde_json::from_str(INVERT).context("parsing the Invert compositor")?;
    manager.register(invert)?;

    for name in DEMO_EFFECTS.iter().chain(&["Invert"]) {
        manager
            .add_compositor(&mut rs, &viewports, vp, name)
            .with_context(|| format!("attaching {name}"))?;
    }
    manager
        .instance_by_name_mut(vp, "HeatVision")
        .context("HeatVision is attached")?
        .add_listener(HEAT_VISION_PASS_ID, heat_vision_listener());

    for frame in 0..FRAMES {
        for (_, step) in SCRIPT.iter().filter(|(at, _)| *at == frame) {
            match *step {
                Step::Enable(name, enabled) => {
                    manager.set_compositor_enabled(vp, name, enabled);
                }
                Step::Resize(width, height) => {
                    viewports.resize(vp, width, height);
                }
            }
        }

        manager.render_all(&mut rs, &viewports);

        let chain = manager
            .compositor_chain(vp)
            .context("viewport has a compositor chain")?;
        let enabled: Vec<_> = chain
            .iter()
            .filter(|(_, instance)| instance.is_enabled())
            .map(|(_, instance)| instance.name())
            .collect();
        println!("frame {frame}: [{}]", enabled.join(" -> "));
        for op in rs.take_ops() {
            println!("    {op}");
        }
    }

    let pool = manager.pool();
    log::info!(
        "Pool: {} textures ({} idle), {} allocations, {:.1} MiB",
        pool.total_texture_count(),
        pool.idle_texture_count(),
        pool.allocation_count(),
        pool.memory_usage() as f64 / (1024.0 * 1024.0)
    );

    manager.remove_all(&mut rs);
    log::info!(
        "Shut down: {} textures created, {} destroyed",
        rs.textures_created(),
        rs.textures_destroyed()
    );
    Ok(())
}
