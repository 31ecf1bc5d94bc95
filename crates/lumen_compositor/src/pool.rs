//! Shared Render Texture Pool
//!
//! Compositor instances obtain their intermediate textures from one pool
//! owned by the `CompositorManager`. Textures are keyed by their resolved
//! size and format, so stages of different instances with matching
//! definitions physically share the same storage.
//!
//! # Design
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   TexturePool                       │
//! │                                                     │
//! │  entries: SlotMap<PoolEntryKey, PoolEntry>          │
//! │  buckets: FxHashMap<TextureKey, Vec<PoolEntryKey>>  │
//! │                                                     │
//! │  acquire() → PoolEntryKey   (compile time)          │
//! │  texture(key) → TextureId   (execute time)          │
//! │  release(key)               (instance teardown)     │
//! │  trim()                     (frame end)             │
//! │  destroy_idle()             (resource rebuild)      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Sharing Rules
//!
//! - An entry is **reference counted**. Acquisition first looks for an entry
//!   in use by someone else that allows sharing, then for an idle entry, and
//!   only then asks the render system for a new texture.
//! - The requester passes the entries it already holds as an exclusion list,
//!   so two definitions of one technique never alias.
//! - Exclusive entries (chain outputs, scene captures, feedback textures) are
//!   never handed to a second holder while in use.
//! - Releasing the last reference makes the entry idle, not destroyed.
//!   [`TexturePool::trim`] destroys entries idle for too long.
//! - A format mismatch is a plain miss.

use lumen_core::errors::Result;
use lumen_core::format::PixelFormat;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::backend::{RenderSystem, TextureDesc, TextureId};

// ─── Public Types ─────────────────────────────────────────────────────────────

new_key_type! {
    /// Handle to one reference on a pool entry.
    pub struct PoolEntryKey;
}

/// Storage key: textures are interchangeable iff these match exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureKey {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl TextureKey {
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    const fn desc(self) -> TextureDesc {
        TextureDesc {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

/// Whether an acquired entry may be handed to other holders while in use.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sharing {
    Shared,
    Exclusive,
}

// ─── Internal Types ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct PoolEntry {
    key: TextureKey,
    texture: TextureId,
    refs: u32,
    sharing: Sharing,
    /// Frames spent with zero references. Used by [`TexturePool::trim`].
    idle_frames: u32,
}

// ─── Pool Implementation ──────────────────────────────────────────────────────

/// Reference-counted pool of compositor render textures.
#[derive(Debug, Default)]
pub struct TexturePool {
    entries: SlotMap<PoolEntryKey, PoolEntry>,
    buckets: FxHashMap<TextureKey, Vec<PoolEntryKey>>,
    /// Textures created over the pool's lifetime.
    allocations: u64,
}

impl TexturePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a reference on a texture matching `key`.
    ///
    /// `exclude` lists entries the requester already holds; they are never
    /// returned.
    pub fn acquire(
        &mut self,
        rs: &mut dyn RenderSystem,
        key: TextureKey,
        sharing: Sharing,
        exclude: &[PoolEntryKey],
    ) -> Result<PoolEntryKey> {
        if let Some(found) = self.find_reusable(key, sharing, exclude) {
            let entry = &mut self.entries[found];
            if entry.refs == 0 {
                entry.sharing = sharing;
                entry.idle_frames = 0;
            }
            entry.refs += 1;
            return Ok(found);
        }

        let texture = rs.create_texture(&key.desc())?;
        self.allocations += 1;
        let entry_key = self.entries.insert(PoolEntry {
            key,
            texture,
            refs: 1,
            sharing,
            idle_frames: 0,
        });
        self.buckets.entry(key).or_default().push(entry_key);
        log::info!(
            "Compositor pool grew: {}x{} {:?} ({} textures)",
            key.width,
            key.height,
            key.format,
            self.entries.len()
        );
        Ok(entry_key)
    }

    fn find_reusable(
        &self,
        key: TextureKey,
        sharing: Sharing,
        exclude: &[PoolEntryKey],
    ) -> Option<PoolEntryKey> {
        let bucket = self.buckets.get(&key)?;
        let candidates = || bucket.iter().copied().filter(|k| !exclude.contains(k));

        if sharing == Sharing::Shared {
            let shared = candidates().find(|&k| {
                let e = &self.entries[k];
                e.refs > 0 && e.sharing == Sharing::Shared
            });
            if shared.is_some() {
                return shared;
            }
        }
        candidates().find(|&k| self.entries[k].refs == 0)
    }

    /// Drops one reference. The entry goes idle when none are left.
    pub fn release(&mut self, key: PoolEntryKey) {
        match self.entries.get_mut(key) {
            Some(entry) if entry.refs > 0 => {
                entry.refs -= 1;
                if entry.refs == 0 {
                    entry.idle_frames = 0;
                }
            }
            _ => log::warn!("Released an unknown or idle pool entry: {key:?}"),
        }
    }

    /// Render texture behind an entry.
    #[inline]
    #[must_use]
    pub fn texture(&self, key: PoolEntryKey) -> Option<TextureId> {
        self.entries.get(key).map(|e| e.texture)
    }

    /// Current reference count of an entry (0 for idle or unknown entries).
    #[inline]
    #[must_use]
    pub fn ref_count(&self, key: PoolEntryKey) -> u32 {
        self.entries.get(key).map_or(0, |e| e.refs)
    }

    /// Storage key of an entry.
    #[inline]
    #[must_use]
    pub fn key_of(&self, key: PoolEntryKey) -> Option<TextureKey> {
        self.entries.get(key).map(|e| e.key)
    }

    // ── Maintenance ────────────────────────────────────────────────────────

    /// Ages idle entries by one frame and destroys those idle for more than
    /// `max_idle_frames`.
    pub fn trim(&mut self, rs: &mut dyn RenderSystem, max_idle_frames: u32) {
        let mut expired = Vec::new();
        for (key, entry) in &mut self.entries {
            if entry.refs == 0 {
                entry.idle_frames += 1;
                if entry.idle_frames > max_idle_frames {
                    expired.push(key);
                }
            }
        }
        for key in expired {
            self.destroy_entry(rs, key);
        }
    }

    /// Destroys every idle entry regardless of age. Returns how many went.
    pub fn destroy_idle(&mut self, rs: &mut dyn RenderSystem) -> usize {
        let idle: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.refs == 0)
            .map(|(k, _)| k)
            .collect();
        for &key in &idle {
            self.destroy_entry(rs, key);
        }
        idle.len()
    }

    /// Destroys every texture, referenced or not.
    pub fn clear(&mut self, rs: &mut dyn RenderSystem) {
        for (_, entry) in self.entries.drain() {
            if entry.refs > 0 {
                log::warn!(
                    "Destroying pooled texture {:?} with {} live references",
                    entry.texture,
                    entry.refs
                );
            }
            rs.destroy_texture(entry.texture);
        }
        self.buckets.clear();
    }

    fn destroy_entry(&mut self, rs: &mut dyn RenderSystem, key: PoolEntryKey) {
        let Some(entry) = self.entries.remove(key) else {
            return;
        };
        if let Some(bucket) = self.buckets.get_mut(&entry.key) {
            bucket.retain(|k| *k != key);
            if bucket.is_empty() {
                self.buckets.remove(&entry.key);
            }
        }
        rs.destroy_texture(entry.texture);
    }

    // ── Statistics ─────────────────────────────────────────────────────────

    /// Number of textures managed by the pool (in use and idle).
    #[must_use]
    pub fn total_texture_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of textures with no references.
    #[must_use]
    pub fn idle_texture_count(&self) -> usize {
        self.entries.values().filter(|e| e.refs == 0).count()
    }

    /// Textures created over the pool's lifetime.
    #[must_use]
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    /// Bytes held by all pooled textures.
    #[must_use]
    pub fn memory_usage(&self) -> u64 {
        self.entries
            .values()
            .map(|e| {
                u64::from(e.key.width)
                    * u64::from(e.key.height)
                    * u64::from(e.key.format.bytes_per_pixel())
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MaterialHandle, MaterialSystem, RenderTarget, SceneRequest};
    use crate::definition::ClearSettings;
    use lumen_core::errors::LumenError;
    use lumen_core::format::Capabilities;
    use lumen_core::params::ParameterSet;
    use lumen_core::viewport::CameraId;

    /// Counts texture lifetime calls; everything else is a no-op.
    #[derive(Default)]
    struct CountingSystem {
        next: u32,
        live: Vec<TextureId>,
        fail: bool,
        params: ParameterSet,
    }

    impl MaterialSystem for CountingSystem {
        fn bind_material(&mut self, _name: &str) -> Result<MaterialHandle> {
            Ok(MaterialHandle(0))
        }
        fn set_texture_unit(&mut self, _m: MaterialHandle, _slot: u32, _t: TextureId) {}
        fn parameters_mut(&mut self, _m: MaterialHandle) -> &mut ParameterSet {
            &mut self.params
        }
    }

    impl RenderSystem for CountingSystem {
        fn capabilities(&self) -> Capabilities {
            Capabilities::all()
        }
        fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
            if self.fail {
                return Err(LumenError::ResourceAllocation {
                    width: desc.width,
                    height: desc.height,
                    format: desc.format,
                    reason: "out of memory".to_owned(),
                });
            }
            self.next += 1;
            self.live.push(TextureId(self.next));
            Ok(TextureId(self.next))
        }
        fn destroy_texture(&mut self, texture: TextureId) {
            self.live.retain(|t| *t != texture);
        }
        fn clear(&mut self, _t: RenderTarget, _s: &ClearSettings) {}
        fn render_scene(&mut self, _t: RenderTarget, _c: CameraId, _r: &SceneRequest<'_>) {}
        fn draw_quad(&mut self, _t: RenderTarget, _m: MaterialHandle) {}
    }

    const KEY: TextureKey = TextureKey::new(128, 128, PixelFormat::A8R8G8B8);

    #[test]
    fn shared_entries_are_reference_counted() {
        let mut rs = CountingSystem::default();
        let mut pool = TexturePool::new();

        let a = pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap();
        let b = pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.ref_count(a), 2);
        assert_eq!(pool.allocation_count(), 1);

        pool.release(a);
        assert_eq!(pool.ref_count(a), 1);
        assert_eq!(pool.idle_texture_count(), 0);
        pool.release(b);
        assert_eq!(pool.idle_texture_count(), 1);
        assert_eq!(rs.live.len(), 1, "release must not destroy");
    }

    #[test]
    fn exclusion_prevents_aliasing() {
        let mut rs = CountingSystem::default();
        let mut pool = TexturePool::new();

        let a = pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap();
        let b = pool.acquire(&mut rs, KEY, Sharing::Shared, &[a]).unwrap();
        assert_ne!(a, b);
        assert_ne!(pool.texture(a), pool.texture(b));
    }

    #[test]
    fn exclusive_entries_are_not_shared() {
        let mut rs = CountingSystem::default();
        let mut pool = TexturePool::new();

        let a = pool.acquire(&mut rs, KEY, Sharing::Exclusive, &[]).unwrap();
        let b = pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap();
        assert_ne!(a, b);

        // Once idle, an exclusive entry is recycled like any other.
        pool.release(a);
        let c = pool.acquire(&mut rs, KEY, Sharing::Exclusive, &[]).unwrap();
        assert_eq!(a, c);
        assert_eq!(pool.allocation_count(), 2);
    }

    #[test]
    fn format_mismatch_is_a_miss() {
        let mut rs = CountingSystem::default();
        let mut pool = TexturePool::new();

        let a = pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap();
        let hdr = TextureKey::new(128, 128, PixelFormat::Float16Rgba);
        let b = pool.acquire(&mut rs, hdr, Sharing::Shared, &[]).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.total_texture_count(), 2);
    }

    #[test]
    fn trim_destroys_long_idle_entries() {
        let mut rs = CountingSystem::default();
        let mut pool = TexturePool::new();

        let a = pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap();
        pool.release(a);

        pool.trim(&mut rs, 2);
        pool.trim(&mut rs, 2);
        assert_eq!(pool.total_texture_count(), 1);
        pool.trim(&mut rs, 2);
        assert_eq!(pool.total_texture_count(), 0);
        assert!(rs.live.is_empty());
    }

    #[test]
    fn destroy_idle_spares_referenced_entries() {
        let mut rs = CountingSystem::default();
        let mut pool = TexturePool::new();

        let held = pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap();
        let idle = pool.acquire(&mut rs, KEY, Sharing::Exclusive, &[]).unwrap();
        pool.release(idle);

        assert_eq!(pool.destroy_idle(&mut rs), 1);
        assert!(pool.texture(idle).is_none());
        assert_eq!(pool.ref_count(held), 1);
        assert_eq!(rs.live, vec![pool.texture(held).unwrap()]);

        // Fresh storage is created for the next request.
        let again = pool.acquire(&mut rs, KEY, Sharing::Exclusive, &[]).unwrap();
        assert_ne!(again, idle);
        assert_eq!(pool.allocation_count(), 3);
    }

    #[test]
    fn allocation_failure_leaves_pool_untouched() {
        let mut rs = CountingSystem {
            fail: true,
            ..Default::default()
        };
        let mut pool = TexturePool::new();
        let err = pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap_err();
        assert!(matches!(err, LumenError::ResourceAllocation { width: 128, .. }));
        assert_eq!(pool.total_texture_count(), 0);
    }

    #[test]
    fn memory_usage_counts_all_entries() {
        let mut rs = CountingSystem::default();
        let mut pool = TexturePool::new();
        pool.acquire(&mut rs, KEY, Sharing::Shared, &[]).unwrap();
        assert_eq!(pool.memory_usage(), 128 * 128 * 4);

        pool.clear(&mut rs);
        assert_eq!(pool.memory_usage(), 0);
        assert!(rs.live.is_empty());
    }
}
