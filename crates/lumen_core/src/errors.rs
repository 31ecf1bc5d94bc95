//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`LumenError`] covers every failure the compositor
//! framework reports:
//! - Malformed compositor definitions
//! - Lookups of unknown compositors, materials or viewports
//! - Techniques the current render system cannot run
//! - Render texture allocation failures
//!
//! All of them are raised while a compositor is being attached, recompiled or
//! re-targeted. Executing an already compiled chain never fails.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, LumenError>`.
//!
//! ```rust,ignore
//! use lumen_core::errors::{LumenError, Result};
//!
//! fn attach() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::format::PixelFormat;
use crate::viewport::ViewportKey;

/// The main error type for the Lumen engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LumenError {
    // ========================================================================
    // Definition Errors
    // ========================================================================
    /// A compositor definition is malformed (unknown input name, missing
    /// material, technique that produces nothing, ...).
    #[error("Invalid compositor definition '{compositor}': {reason}")]
    Definition {
        /// Name of the offending compositor (empty while it is still being authored)
        compositor: String,
        /// Human readable description of the problem
        reason: String,
    },

    /// A compositor with this name is already registered.
    #[error("Compositor '{0}' already exists")]
    DuplicateName(String),

    /// The compositor is already attached to the viewport's chain.
    #[error("Compositor '{0}' is already attached to this viewport")]
    DuplicateInstance(String),

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// No compositor with this name is registered.
    #[error("Compositor not found: {0}")]
    CompositorNotFound(String),

    /// The material system does not know this material.
    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    /// The viewport handle does not resolve in the viewport arena.
    #[error("Viewport not found: {0:?}")]
    ViewportNotFound(ViewportKey),

    // ========================================================================
    // Capability & Resource Errors
    // ========================================================================
    /// None of the compositor's techniques is supported by the render system.
    #[error("No supported technique for compositor '{0}'")]
    Unsupported(String),

    /// The render system could not allocate a render texture.
    #[error("Failed to allocate {width}x{height} {format:?} render texture: {reason}")]
    ResourceAllocation {
        /// Requested width in pixels
        width: u32,
        /// Requested height in pixels
        height: u32,
        /// Requested pixel format
        format: PixelFormat,
        /// Reason reported by the render system
        reason: String,
    },
}

impl LumenError {
    /// Shorthand for a [`LumenError::Definition`].
    pub fn definition(compositor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Definition {
            compositor: compositor.into(),
            reason: reason.into(),
        }
    }
}

/// Alias for `Result<T, LumenError>`.
pub type Result<T> = std::result::Result<T, LumenError>;
