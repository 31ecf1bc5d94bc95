//! Lumen Compositor
//!
//! Declarative, multi-pass, full-screen post-processing. An application
//! describes an effect as a [`Compositor`] definition; the
//! [`CompositorManager`] instantiates it per viewport, compiles it against
//! pooled render textures and executes the resulting chain every frame.
//!
//! # Module Overview
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`definition`] | Compositor → technique → target pass → pass data model |
//! | [`backend`] | Render system and material system traits |
//! | [`pool`] | Reference-counted render texture pool |
//! | [`instance`] | Compilation and per-frame execution of one compositor |
//! | [`chain`] | Per-viewport instance ordering and input threading |
//! | [`manager`] | Registry, chains and pool owner |
//! | [`listener`] | Per-pass material parameter callbacks |
//! | [`settings`] | Framework configuration |

pub mod backend;
pub mod chain;
pub mod definition;
pub mod instance;
pub mod listener;
pub mod manager;
pub mod pool;
pub mod settings;

pub use backend::{
    MaterialHandle, MaterialSystem, RenderSystem, RenderTarget, SceneRequest, TextureDesc,
    TextureId,
};
pub use chain::{ChainState, CompositorChain, InstanceKey};
pub use definition::{
    ClearBuffers, ClearSettings, CompositionPass, CompositionTargetPass, CompositionTechnique,
    Compositor, InputMode, PREVIOUS_INPUT, PassKind, PassType, TargetOutput, TextureDefinition,
};
pub use instance::CompositorInstance;
pub use listener::PassListener;
pub use manager::CompositorManager;
pub use pool::{PoolEntryKey, Sharing, TextureKey, TexturePool};
pub use settings::CompositorSettings;
