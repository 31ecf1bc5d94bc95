//! Compositor Definitions
//!
//! The immutable blueprint side of the framework, leaf-first:
//!
//! ```text
//! Compositor
//!   └─ CompositionTechnique      (one per capability level, first supported wins)
//!        ├─ TextureDefinition    (name → width × height × format, 0 = viewport)
//!        ├─ CompositionTargetPass (intermediate stages, in order)
//!        └─ CompositionTargetPass (output stage)
//!             └─ CompositionPass  (Clear | RenderScene | RenderQuad)
//! ```
//!
//! Definitions are plain data: they can be built through the authoring
//! methods or deserialized with `serde`.

mod compositor;
mod pass;
mod target_pass;
mod technique;

pub use compositor::{Compositor, DEFAULT_GROUP};
pub use pass::{
    ClearBuffers, ClearSettings, CompositionPass, MAX_PASS_INPUTS, PREVIOUS_INPUT, PassKind,
    PassType, QuadPass, RENDER_QUEUE_BACKGROUND, RENDER_QUEUE_SKIES_LATE, ScenePass,
};
pub use target_pass::{CompositionTargetPass, InputMode, TargetOutput};
pub use technique::{CompositionTechnique, TextureDefinition};
