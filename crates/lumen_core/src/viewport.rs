//! Viewports
//!
//! A viewport is a rectangular render destination (usually the back buffer of
//! a window) seen through one camera. The application owns viewports in a
//! [`Viewports`] arena; everything else refers to them by [`ViewportKey`], so a
//! compositor chain never holds a pointer into the window system.

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Stable handle to a [`Viewport`] in a [`Viewports`] arena.
    pub struct ViewportKey;
}

/// Opaque identifier of the camera a viewport renders through.
///
/// The compositor framework never inspects cameras; it only forwards the id
/// to the scene renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CameraId(pub u32);

/// A render destination with its current pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub camera: CameraId,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: u32, height: u32, camera: CameraId) -> Self {
        Self {
            width,
            height,
            camera,
        }
    }

    /// `(width, height)` in pixels.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Arena of viewports owned by the application.
#[derive(Debug, Default)]
pub struct Viewports {
    inner: SlotMap<ViewportKey, Viewport>,
}

impl Viewports {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a viewport and returns its handle.
    pub fn add(&mut self, viewport: Viewport) -> ViewportKey {
        self.inner.insert(viewport)
    }

    /// Removes a viewport. Chains attached to it are dropped on the next
    /// `render_all`, or explicitly via `remove_compositor_chain`.
    pub fn remove(&mut self, key: ViewportKey) -> Option<Viewport> {
        self.inner.remove(key)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: ViewportKey) -> Option<&Viewport> {
        self.inner.get(key)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: ViewportKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Changes the pixel size of a viewport. Returns `false` if the handle
    /// is stale.
    pub fn resize(&mut self, key: ViewportKey, width: u32, height: u32) -> bool {
        if let Some(vp) = self.inner.get_mut(key) {
            vp.width = width;
            vp.height = height;
            true
        } else {
            log::warn!("Attempted to resize a removed viewport: {key:?}");
            false
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViewportKey, &Viewport)> {
        self.inner.iter()
    }

    /// Handles of every live viewport.
    pub fn keys(&self) -> impl Iterator<Item = ViewportKey> + '_ {
        self.inner.keys()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_updates_size() {
        let mut vps = Viewports::new();
        let key = vps.add(Viewport::new(800, 600, CameraId(0)));
        assert!(vps.resize(key, 1024, 768));
        assert_eq!(vps.get(key).map(Viewport::size), Some((1024, 768)));
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut vps = Viewports::new();
        let key = vps.add(Viewport::new(640, 480, CameraId(1)));
        assert!(vps.remove(key).is_some());
        assert!(!vps.contains(key));
        assert!(!vps.resize(key, 1, 1));
        assert!(vps.is_empty());
    }
}
