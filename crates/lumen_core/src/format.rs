//! Pixel Formats & Render Capabilities
//!
//! Compositor texture definitions carry a symbolic [`PixelFormat`]; the render
//! system maps it to whatever its graphics API uses. [`Capabilities`] is what
//! the render system reports about itself and is used to pick the first
//! runnable technique of a compositor.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Symbolic pixel format of a render texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit ARGB, the default for intermediate colour targets.
    A8R8G8B8,
    /// 8-bit RGBA.
    R8G8B8A8,
    /// 8-bit RGB without alpha.
    R8G8B8,
    /// Single 16-bit float channel.
    Float16R,
    /// Three 16-bit float channels.
    Float16Rgb,
    /// Four 16-bit float channels.
    Float16Rgba,
    /// Single 32-bit float channel.
    Float32R,
    /// Three 32-bit float channels.
    Float32Rgb,
    /// Four 32-bit float channels.
    Float32Rgba,
}

impl PixelFormat {
    /// Every format, in declaration order.
    pub const ALL: [PixelFormat; 9] = [
        Self::A8R8G8B8,
        Self::R8G8B8A8,
        Self::R8G8B8,
        Self::Float16R,
        Self::Float16Rgb,
        Self::Float16Rgba,
        Self::Float32R,
        Self::Float32Rgb,
        Self::Float32Rgba,
    ];

    /// Bytes per pixel, used for pool memory statistics.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::A8R8G8B8 | Self::R8G8B8A8 => 4,
            Self::R8G8B8 => 3,
            Self::Float16R => 2,
            Self::Float16Rgb => 6,
            Self::Float16Rgba => 8,
            Self::Float32R => 4,
            Self::Float32Rgb => 12,
            Self::Float32Rgba => 16,
        }
    }

    /// Returns `true` for floating-point formats.
    #[inline]
    #[must_use]
    pub const fn is_float(self) -> bool {
        !matches!(self, Self::A8R8G8B8 | Self::R8G8B8A8 | Self::R8G8B8)
    }
}

impl Default for PixelFormat {
    #[inline]
    fn default() -> Self {
        Self::A8R8G8B8
    }
}

bitflags! {
    /// Optional render system features a technique may depend on.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RenderFeatures: u32 {
        const VERTEX_PROGRAMS     = 1 << 0;
        const FRAGMENT_PROGRAMS   = 1 << 1;
        const FLOAT_TEXTURES      = 1 << 2;
        const NON_POWER_OF_TWO    = 1 << 3;
        const MULTIPLE_RENDER_TARGETS = 1 << 4;
    }
}

/// What a render system can do, as reported by the render system itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Features available on this device.
    pub features: RenderFeatures,
    /// Pixel formats usable as render targets.
    pub render_target_formats: SmallVec<[PixelFormat; 9]>,
}

impl Capabilities {
    /// Capabilities of a device that supports every feature and format.
    #[must_use]
    pub fn all() -> Self {
        Self {
            features: RenderFeatures::all(),
            render_target_formats: PixelFormat::ALL.iter().copied().collect(),
        }
    }

    /// Returns `true` if `format` can be rendered to.
    #[inline]
    #[must_use]
    pub fn supports_format(&self, format: PixelFormat) -> bool {
        self.render_target_formats.contains(&format)
    }

    /// Returns `true` if every feature in `required` is available.
    #[inline]
    #[must_use]
    pub fn supports_features(&self, required: RenderFeatures) -> bool {
        self.features.contains(required)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(PixelFormat::A8R8G8B8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::R8G8B8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Float16Rgba.bytes_per_pixel(), 8);
        assert_eq!(PixelFormat::Float32Rgb.bytes_per_pixel(), 12);
        assert_eq!(PixelFormat::Float32Rgba.bytes_per_pixel(), 16);
    }

    #[test]
    fn test_capabilities_filtering() {
        let caps = Capabilities {
            features: RenderFeatures::FRAGMENT_PROGRAMS,
            render_target_formats: [PixelFormat::A8R8G8B8, PixelFormat::R8G8B8].into_iter().collect(),
        };
        assert!(caps.supports_format(PixelFormat::R8G8B8));
        assert!(!caps.supports_format(PixelFormat::Float16Rgba));
        assert!(caps.supports_features(RenderFeatures::FRAGMENT_PROGRAMS));
        assert!(!caps.supports_features(
            RenderFeatures::FRAGMENT_PROGRAMS | RenderFeatures::FLOAT_TEXTURES
        ));
        assert!(caps.supports_features(RenderFeatures::empty()));
    }
}
