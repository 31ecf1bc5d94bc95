//! Texture Pool Tests
//!
//! Tests for:
//! - Sharing of identical pooled definitions between instances
//! - Exclusive (non-pooled) definitions
//! - Idle aging and destruction through `render_all`
//! - Memory statistics

use lumen::compositor::definition::{InputMode, PassType};
use lumen::compositor::manager::CompositorManager;
use lumen::compositor::pool::{Sharing, TextureKey, TexturePool};
use lumen::core::format::PixelFormat;
use lumen::core::viewport::{CameraId, Viewport, ViewportKey, Viewports};
use lumen_dev_utils::RecordingBackend;

/// Registers a compositor that blurs a 128×128 copy of its input.
fn register_blur(manager: &mut CompositorManager, name: &str, pooled: bool) {
    let t = manager.create(name).unwrap().create_technique();
    t.create_texture_definition("blur")
        .unwrap()
        .set_size(128, 128)
        .set_pooled(pooled);
    t.create_target_pass()
        .set_input_mode(InputMode::Previous)
        .set_output_name("blur");
    t.output_target_pass_mut()
        .create_pass(PassType::RenderQuad)
        .set_material_name(format!("{name}/Blur"))
        .unwrap()
        .set_input(0, "blur")
        .unwrap();
}

fn setup() -> (RecordingBackend, Viewports, ViewportKey, CompositorManager) {
    let mut viewports = Viewports::new();
    let vp = viewports.add(Viewport::new(640, 480, CameraId(0)));
    (RecordingBackend::new(), viewports, vp, CompositorManager::new())
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn identical_pooled_definitions_share_storage() {
    let (mut rs, viewports, vp, mut manager) = setup();
    register_blur(&mut manager, "X", true);
    register_blur(&mut manager, "Y", true);
    let x = manager.add_compositor(&mut rs, &viewports, vp, "X").unwrap();
    let y = manager.add_compositor(&mut rs, &viewports, vp, "Y").unwrap();

    let x_entry = manager.instance(vp, x).unwrap().texture_entry("blur").unwrap();
    let y_entry = manager.instance(vp, y).unwrap().texture_entry("blur").unwrap();
    assert_eq!(x_entry, y_entry);
    assert_eq!(manager.pool().ref_count(x_entry), 2);

    assert!(manager.remove_compositor(vp, "X"));
    assert_eq!(manager.pool().ref_count(x_entry), 1);
    assert!(manager.remove_compositor(vp, "Y"));
    assert_eq!(manager.pool().ref_count(x_entry), 0);

    // Idle storage survives until trimmed.
    assert_eq!(rs.textures_destroyed(), 0);
    assert!(manager.pool().texture(x_entry).is_some());
}

#[test]
fn non_pooled_definitions_get_private_storage() {
    let (mut rs, viewports, vp, mut manager) = setup();
    register_blur(&mut manager, "X", true);
    register_blur(&mut manager, "Private", false);
    let x = manager.add_compositor(&mut rs, &viewports, vp, "X").unwrap();
    let p = manager.add_compositor(&mut rs, &viewports, vp, "Private").unwrap();

    let x_entry = manager.instance(vp, x).unwrap().texture_entry("blur").unwrap();
    let p_entry = manager.instance(vp, p).unwrap().texture_entry("blur").unwrap();
    assert_ne!(x_entry, p_entry);
    assert_eq!(manager.pool().ref_count(x_entry), 1);
    assert_eq!(manager.pool().ref_count(p_entry), 1);
}

#[test]
fn idle_textures_are_destroyed_after_max_idle_frames() {
    let (mut rs, viewports, vp, mut manager) = setup();
    register_blur(&mut manager, "X", true);
    manager.add_compositor(&mut rs, &viewports, vp, "X").unwrap();
    assert_eq!(rs.live_textures(), 2);

    manager.remove_compositor(vp, "X");
    let max_idle = manager.settings().pool_max_idle_frames;
    for _ in 0..max_idle {
        manager.render_all(&mut rs, &viewports);
    }
    assert_eq!(rs.textures_destroyed(), 0);
    assert_eq!(manager.pool().idle_texture_count(), 2);

    manager.render_all(&mut rs, &viewports);
    assert_eq!(rs.textures_destroyed(), 2);
    assert_eq!(manager.pool().total_texture_count(), 0);
}

#[test]
fn reacquired_idle_texture_is_not_aged_out() {
    let (mut rs, viewports, vp, mut manager) = setup();
    register_blur(&mut manager, "X", true);
    manager.add_compositor(&mut rs, &viewports, vp, "X").unwrap();
    manager.remove_compositor(vp, "X");
    manager.render_all(&mut rs, &viewports);

    manager.add_compositor(&mut rs, &viewports, vp, "X").unwrap();
    for _ in 0..10 {
        manager.render_all(&mut rs, &viewports);
    }
    assert_eq!(rs.textures_created(), 2);
    assert_eq!(rs.textures_destroyed(), 0);
}

// ============================================================================
// Direct Pool Use
// ============================================================================

#[test]
fn exclusive_acquire_never_returns_referenced_entries() {
    let mut rs = RecordingBackend::new();
    let mut pool = TexturePool::new();
    let key = TextureKey::new(64, 64, PixelFormat::R8G8B8A8);

    let shared = pool.acquire(&mut rs, key, Sharing::Shared, &[]).unwrap();
    let exclusive = pool.acquire(&mut rs, key, Sharing::Exclusive, &[]).unwrap();
    assert_ne!(shared, exclusive);

    // A shared request may join the shared entry but never the exclusive one.
    let joined = pool.acquire(&mut rs, key, Sharing::Shared, &[]).unwrap();
    assert_eq!(joined, shared);
    assert_eq!(pool.ref_count(shared), 2);
    assert_eq!(pool.ref_count(exclusive), 1);

    assert_eq!(pool.memory_usage(), 2 * 64 * 64 * 4);
    assert_eq!(pool.key_of(exclusive), Some(key));
}
