//! Compositor Chain Tests
//!
//! Tests for:
//! - Output-to-input threading between enabled instances
//! - Enable / disable toggles without reallocation
//! - Scene capture for compositors sampling `"previous"`
//! - Duplicate attachment and chain ordering
//! - Lazy resolution failures, orphaned viewports and resource rebuilds
//! - Definition edits versus live instances

use lumen::compositor::backend::RenderTarget;
use lumen::compositor::chain::ChainState;
use lumen::compositor::definition::{InputMode, PREVIOUS_INPUT, PassType};
use lumen::compositor::manager::CompositorManager;
use lumen::compositor::settings::CompositorSettings;
use lumen::core::errors::LumenError;
use lumen::core::viewport::{CameraId, Viewport, ViewportKey, Viewports};
use lumen::effects::{DEMO_EFFECTS, register_demo_effects};
use lumen_dev_utils::{RecordedOp, RecordingBackend};

fn setup() -> (RecordingBackend, Viewports, ViewportKey, CompositorManager) {
    let mut viewports = Viewports::new();
    let vp = viewports.add(Viewport::new(640, 480, CameraId(0)));
    let mut manager = CompositorManager::new();
    register_demo_effects(&mut manager).unwrap();
    (RecordingBackend::new(), viewports, vp, manager)
}

/// Registers a single-quad compositor that samples `"previous"`.
fn register_tint(manager: &mut CompositorManager, name: &str, material: &str) {
    manager
        .create(name)
        .unwrap()
        .create_technique()
        .output_target_pass_mut()
        .set_input_mode(InputMode::Previous)
        .create_pass(PassType::RenderQuad)
        .set_material_name(material)
        .unwrap()
        .set_input(0, PREVIOUS_INPUT)
        .unwrap();
}

fn quad_materials(ops: &[RecordedOp]) -> Vec<&str> {
    ops.iter().filter_map(RecordedOp::material).collect()
}

// ============================================================================
// Threading
// ============================================================================

#[test]
fn outputs_thread_through_enabled_instances() {
    let (mut rs, viewports, vp, mut manager) = setup();
    for (name, material) in [("A", "MatA"), ("B", "MatB"), ("C", "MatC")] {
        register_tint(&mut manager, name, material);
        manager.add_compositor(&mut rs, &viewports, vp, name).unwrap();
        manager.set_compositor_enabled(vp, name, true);
    }
    manager.render_viewport(&mut rs, &viewports, vp);

    let chain = manager.compositor_chain(vp).unwrap();
    assert_eq!(chain.names().collect::<Vec<_>>(), ["A", "B", "C"]);
    let output_of = |name: &str| {
        chain
            .instance(chain.find(name).unwrap())
            .unwrap()
            .output_texture()
            .unwrap()
    };
    let capture = chain.scene_capture().expect("A samples the scene");
    let (a_out, b_out) = (output_of("A"), output_of("B"));

    let ops = rs.take_ops();
    assert_eq!(ops.len(), 4, "{ops:#?}");
    assert!(ops[0].is_scene_render());
    assert_eq!(ops[0].target(), RenderTarget::Texture(capture));
    assert_eq!(quad_materials(&ops), ["MatA", "MatB", "MatC"]);
    assert_eq!((ops[1].input(0), ops[1].target()), (Some(capture), RenderTarget::Texture(a_out)));
    assert_eq!((ops[2].input(0), ops[2].target()), (Some(a_out), RenderTarget::Texture(b_out)));
    assert_eq!((ops[3].input(0), ops[3].target()), (Some(b_out), RenderTarget::Viewport(vp)));

    // Disabling the middle instance links A straight to C.
    manager.set_compositor_enabled(vp, "B", false);
    assert_eq!(manager.compositor_chain(vp).unwrap().state(), ChainState::Dirty);
    manager.render_viewport(&mut rs, &viewports, vp);

    let ops = rs.take_ops();
    assert_eq!(quad_materials(&ops), ["MatA", "MatC"]);
    assert_eq!(ops[1].target(), RenderTarget::Texture(a_out));
    assert_eq!((ops[2].input(0), ops[2].target()), (Some(a_out), RenderTarget::Viewport(vp)));
}

#[test]
fn toggling_does_not_reallocate() {
    let (mut rs, viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Bloom").unwrap();
    manager.add_compositor(&mut rs, &viewports, vp, "Hurt").unwrap();
    manager.set_compositor_enabled(vp, "Bloom", true);
    manager.set_compositor_enabled(vp, "Hurt", true);
    manager.render_viewport(&mut rs, &viewports, vp);
    // Hurt leading the chain acquires the scene capture once.
    manager.set_compositor_enabled(vp, "Bloom", false);
    manager.render_viewport(&mut rs, &viewports, vp);

    let textures = manager.pool().total_texture_count();
    let allocations = manager.pool().allocation_count();
    let created = rs.textures_created();

    for enabled in [false, true, false, true] {
        manager.set_compositor_enabled(vp, "Bloom", enabled);
        manager.render_viewport(&mut rs, &viewports, vp);
        manager.set_compositor_enabled(vp, "Hurt", !enabled);
        manager.render_viewport(&mut rs, &viewports, vp);
    }

    assert_eq!(manager.pool().total_texture_count(), textures);
    assert_eq!(manager.pool().allocation_count(), allocations);
    assert_eq!(rs.textures_created(), created);
    assert_eq!(rs.textures_destroyed(), 0);
}

#[test]
fn hurt_alone_samples_captured_scene() {
    let (mut rs, viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Hurt").unwrap();
    manager.set_compositor_enabled(vp, "Hurt", true);
    manager.render_viewport(&mut rs, &viewports, vp);

    let capture = manager.compositor_chain(vp).unwrap().scene_capture().unwrap();
    let ops = rs.take_ops();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].target(), RenderTarget::Texture(capture));
    assert_eq!(ops[1].material(), Some("RedQuad"));
    assert_eq!(ops[1].input(0), Some(capture));
    assert_eq!(ops[1].target(), RenderTarget::Viewport(vp));
}

#[test]
fn copy_stage_after_another_instance_copies_its_output() {
    let (mut rs, viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Hurt").unwrap();
    manager.add_compositor(&mut rs, &viewports, vp, "Glass").unwrap();
    manager.set_compositor_enabled(vp, "Hurt", true);
    manager.set_compositor_enabled(vp, "Glass", true);
    manager.render_viewport(&mut rs, &viewports, vp);

    let chain = manager.compositor_chain(vp).unwrap();
    let hurt = chain.instance(chain.find("Hurt").unwrap()).unwrap();
    let glass = chain.instance(chain.find("Glass").unwrap()).unwrap();
    let hurt_out = hurt.output_texture().unwrap();
    let rt0 = glass.texture("rt0").unwrap();

    let ops = rs.take_ops();
    assert_eq!(
        quad_materials(&ops),
        ["RedQuad", "Compositor/Copy", "Ogre/Compositor/GlassPass"]
    );
    assert_eq!(ops[2].input(0), Some(hurt_out));
    assert_eq!(ops[2].target(), RenderTarget::Texture(rt0));
    assert_eq!(ops[3].input(0), Some(rt0));
}

// ============================================================================
// Attachment & Ordering
// ============================================================================

#[test]
fn duplicate_attachment_is_rejected() {
    let (mut rs, viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Bloom").unwrap();
    let live = rs.live_textures();

    assert_eq!(
        manager.add_compositor(&mut rs, &viewports, vp, "Bloom"),
        Err(LumenError::DuplicateInstance("Bloom".into()))
    );
    assert_eq!(manager.compositor_chain(vp).unwrap().len(), 1);
    assert_eq!(rs.live_textures(), live);

    // Another viewport may host its own instance.
    let mut viewports = viewports;
    let other = viewports.add(Viewport::new(320, 240, CameraId(1)));
    assert!(manager.add_compositor(&mut rs, &viewports, other, "Bloom").is_ok());
}

#[test]
fn insertion_position_is_clamped() {
    let (mut rs, viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Bloom").unwrap();
    manager.add_compositor_at(&mut rs, &viewports, vp, "Hurt", 0).unwrap();
    manager.add_compositor_at(&mut rs, &viewports, vp, "Glass", 99).unwrap();

    let chain = manager.compositor_chain(vp).unwrap();
    assert_eq!(chain.names().collect::<Vec<_>>(), ["Hurt", "Bloom", "Glass"]);

    assert!(manager.remove_compositor(vp, "Bloom"));
    assert!(!manager.remove_compositor(vp, "Bloom"));
    let chain = manager.compositor_chain(vp).unwrap();
    assert_eq!(chain.names().collect::<Vec<_>>(), ["Hurt", "Glass"]);
}

#[test]
fn all_disabled_renders_scene_once() {
    let (mut rs, viewports, vp, mut manager) = setup();
    for name in DEMO_EFFECTS {
        manager.add_compositor(&mut rs, &viewports, vp, name).unwrap();
    }
    manager.render_viewport(&mut rs, &viewports, vp);

    let ops = rs.take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(
        ops[0],
        RecordedOp::RenderScene { target: RenderTarget::Viewport(v), .. } if v == vp
    ));
    assert!(!ops.iter().any(RecordedOp::is_render_to_texture));
    assert_eq!(manager.compositor_chain(vp).unwrap().active_count(), 0);
}

#[test]
fn enable_on_attach_setting_is_honoured() {
    let mut viewports = Viewports::new();
    let vp = viewports.add(Viewport::new(640, 480, CameraId(0)));
    let mut manager = CompositorManager::with_settings(CompositorSettings {
        enable_on_attach: true,
        ..CompositorSettings::default()
    });
    register_demo_effects(&mut manager).unwrap();
    let mut rs = RecordingBackend::new();

    let key = manager.add_compositor(&mut rs, &viewports, vp, "Glass").unwrap();
    assert!(manager.instance(vp, key).unwrap().is_enabled());
    manager.render_viewport(&mut rs, &viewports, vp);
    assert_eq!(rs.take_ops().len(), 2);
}

#[test]
fn unknown_instance_toggle_reports_false() {
    let (mut rs, viewports, vp, mut manager) = setup();
    assert!(!manager.set_compositor_enabled(vp, "Bloom", true));
    manager.add_compositor(&mut rs, &viewports, vp, "Bloom").unwrap();
    assert!(!manager.set_compositor_enabled(vp, "Hurt", true));
    assert!(manager.set_compositor_enabled(vp, "Bloom", true));
}

// ============================================================================
// Resize & Failures
// ============================================================================

#[test]
fn failed_lazy_recompile_disables_only_that_instance() {
    let (mut rs, mut viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Bloom").unwrap();
    manager.add_compositor(&mut rs, &viewports, vp, "Glass").unwrap();
    manager.set_compositor_enabled(vp, "Bloom", true);
    manager.set_compositor_enabled(vp, "Glass", true);
    manager.render_viewport(&mut rs, &viewports, vp);
    rs.take_ops();

    // Room for Bloom's new output only; Glass cannot get its textures.
    rs.set_texture_budget(Some(rs.live_textures() + 1));
    viewports.resize(vp, 800, 600);
    manager.render_viewport(&mut rs, &viewports, vp);

    let chain = manager.compositor_chain(vp).unwrap();
    let bloom = chain.instance(chain.find("Bloom").unwrap()).unwrap();
    let glass = chain.instance(chain.find("Glass").unwrap()).unwrap();
    assert!(bloom.is_enabled());
    assert_eq!(bloom.compiled_size(), Some((800, 600)));
    assert!(!glass.is_enabled());
    assert!(!glass.is_compiled());
    assert_eq!(chain.active_count(), 1);

    let ops = rs.take_ops();
    assert_eq!(ops.last().unwrap().target(), RenderTarget::Viewport(vp));
    assert_eq!(
        ops.last().and_then(RecordedOp::material),
        Some("Ogre/Compositor/BloomBlend")
    );
}

#[test]
fn resize_drops_scene_capture() {
    let (mut rs, mut viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Hurt").unwrap();
    manager.set_compositor_enabled(vp, "Hurt", true);
    manager.render_viewport(&mut rs, &viewports, vp);
    let before = manager.compositor_chain(vp).unwrap().scene_capture().unwrap();

    viewports.resize(vp, 1024, 768);
    manager.render_viewport(&mut rs, &viewports, vp);
    let after = manager.compositor_chain(vp).unwrap().scene_capture().unwrap();
    assert_ne!(before, after);
    let desc = rs.texture_desc(after).unwrap();
    assert_eq!((desc.width, desc.height), (1024, 768));
}

#[test]
fn emptied_chain_releases_scene_capture() {
    let (mut rs, viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Hurt").unwrap();
    manager.set_compositor_enabled(vp, "Hurt", true);
    manager.render_all(&mut rs, &viewports);
    assert!(manager.compositor_chain(vp).unwrap().scene_capture().is_some());

    assert!(manager.remove_compositor(vp, "Hurt"));
    manager.render_all(&mut rs, &viewports);

    let chain = manager.compositor_chain(vp).unwrap();
    assert_eq!(chain.state(), ChainState::Empty);
    assert_eq!(chain.scene_capture(), None);
    let pool = manager.pool();
    assert_eq!(pool.idle_texture_count(), pool.total_texture_count());

    for _ in 0..manager.settings().pool_max_idle_frames {
        manager.render_all(&mut rs, &viewports);
    }
    assert_eq!(rs.live_textures(), 0);
    assert_eq!(manager.pool().total_texture_count(), 0);
}

#[test]
fn render_all_drops_chains_of_removed_viewports() {
    let (mut rs, mut viewports, vp, mut manager) = setup();
    let other = viewports.add(Viewport::new(320, 240, CameraId(1)));
    manager.add_compositor(&mut rs, &viewports, vp, "Bloom").unwrap();
    manager.add_compositor(&mut rs, &viewports, other, "Glass").unwrap();

    viewports.remove(other);
    manager.render_all(&mut rs, &viewports);

    assert!(manager.has_compositor_chain(vp));
    assert!(!manager.has_compositor_chain(other));
    // Glass's textures went idle and are destroyed once they age out.
    for _ in 0..manager.settings().pool_max_idle_frames {
        manager.render_all(&mut rs, &viewports);
    }
    assert_eq!(rs.textures_destroyed(), 2);
    assert_eq!(manager.pool().idle_texture_count(), 0);
}

#[test]
fn reconstruct_reallocates_everything() {
    let (mut rs, viewports, vp, mut manager) = setup();
    let bloom = manager.add_compositor(&mut rs, &viewports, vp, "Bloom").unwrap();
    manager.add_compositor(&mut rs, &viewports, vp, "Hurt").unwrap();
    manager.set_compositor_enabled(vp, "Bloom", true);
    manager.set_compositor_enabled(vp, "Hurt", true);
    manager.render_viewport(&mut rs, &viewports, vp);
    let rt0 = manager.instance(vp, bloom).unwrap().texture("rt0").unwrap();
    let created = rs.textures_created();

    manager.reconstruct_all_resources(&mut rs);
    assert_eq!(rs.textures_destroyed(), created);
    assert_eq!(rs.live_textures(), 0);
    assert_eq!(manager.pool().total_texture_count(), 0);
    assert!(!manager.instance(vp, bloom).unwrap().is_compiled());

    manager.render_viewport(&mut rs, &viewports, vp);
    let instance = manager.instance(vp, bloom).unwrap();
    assert!(instance.is_compiled());
    assert_ne!(instance.texture("rt0"), Some(rt0));
    assert_eq!(rs.textures_created(), 2 * created);
    assert_eq!(rs.live_textures(), created);

    // The new frame only touches the new storage.
    let ops = rs.take_ops();
    let last = ops.last().unwrap();
    assert_eq!(last.material(), Some("RedQuad"));
    assert_eq!(last.target(), RenderTarget::Viewport(vp));
    assert!(ops.iter().all(|op| op.input(0) != Some(rt0)));
}

#[test]
fn reconstruct_replaces_scene_capture() {
    let (mut rs, viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "Hurt").unwrap();
    manager.set_compositor_enabled(vp, "Hurt", true);
    manager.render_viewport(&mut rs, &viewports, vp);
    let capture = manager.compositor_chain(vp).unwrap().scene_capture().unwrap();

    manager.reconstruct_all_resources(&mut rs);
    assert_eq!(manager.compositor_chain(vp).unwrap().scene_capture(), None);

    manager.render_viewport(&mut rs, &viewports, vp);
    let fresh = manager.compositor_chain(vp).unwrap().scene_capture().unwrap();
    assert_ne!(fresh, capture);
    let ops = rs.take_ops();
    assert_eq!(ops[ops.len() - 1].input(0), Some(fresh));
}

#[test]
fn reconstruct_leaves_disabled_instances_uncompiled_until_enabled() {
    let (mut rs, viewports, vp, mut manager) = setup();
    let glass = manager.add_compositor(&mut rs, &viewports, vp, "Glass").unwrap();
    manager.reconstruct_all_resources(&mut rs);
    manager.render_viewport(&mut rs, &viewports, vp);
    assert!(!manager.instance(vp, glass).unwrap().is_compiled());

    manager.set_compositor_enabled(vp, "Glass", true);
    manager.render_viewport(&mut rs, &viewports, vp);
    let instance = manager.instance(vp, glass).unwrap();
    assert!(instance.is_compiled());
    assert!(instance.texture("rt0").is_some());
}

#[test]
fn remove_all_destroys_pooled_textures() {
    let (mut rs, viewports, vp, mut manager) = setup();
    manager.add_compositor(&mut rs, &viewports, vp, "MotionBlur").unwrap();
    manager.add_compositor(&mut rs, &viewports, vp, "HeatVision").unwrap();
    assert!(rs.live_textures() > 0);

    manager.remove_all(&mut rs);
    assert_eq!(rs.live_textures(), 0);
    assert!(!manager.has_compositor_chain(vp));
    assert_eq!(manager.names().count(), 0);
}

// ============================================================================
// Definition Edits
// ============================================================================

#[test]
fn live_instances_keep_their_definition() {
    let (mut rs, viewports, vp, mut manager) = setup();
    let key = manager.add_compositor(&mut rs, &viewports, vp, "Hurt").unwrap();
    manager.set_compositor_enabled(vp, "Hurt", true);

    manager.definition_mut("Hurt").unwrap().techniques[0]
        .output_target_pass
        .passes[0]
        .set_material_name("BlueQuad")
        .unwrap();
    assert!(manager.remove("Hurt"));

    manager.render_viewport(&mut rs, &viewports, vp);
    assert_eq!(rs.take_ops()[1].material(), Some("RedQuad"));
    assert_eq!(
        manager.instance(vp, key).unwrap().compositor().techniques[0]
            .output_target_pass
            .passes[0]
            .material_name(),
        Some("RedQuad")
    );

    // Re-attaching needs a registered definition.
    manager.remove_compositor(vp, "Hurt");
    assert_eq!(
        manager.add_compositor(&mut rs, &viewports, vp, "Hurt"),
        Err(LumenError::CompositorNotFound("Hurt".into()))
    );
}
