//! Composition Techniques
//!
//! A technique is one complete pipeline variant of a compositor: the
//! intermediate textures it needs, the stages that render into them, and the
//! output stage that produces the final image.

use lumen_core::errors::{LumenError, Result};
use lumen_core::format::{Capabilities, PixelFormat, RenderFeatures};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::pass::{PREVIOUS_INPUT, PassKind};
use super::target_pass::{CompositionTargetPass, InputMode, TargetOutput};

/// An intermediate render texture declared by a technique.
///
/// A `width` or `height` of `0` tracks the viewport's dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureDefinition {
    pub name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub format: PixelFormat,
    /// Whether the storage may be shared with other instances through the
    /// pool. Textures whose contents must survive between frames clear this.
    #[serde(default = "default_pooled")]
    pub pooled: bool,
}

const fn default_pooled() -> bool {
    true
}

impl TextureDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: 0,
            height: 0,
            format: PixelFormat::default(),
            pooled: true,
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) -> &mut Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn set_format(&mut self, format: PixelFormat) -> &mut Self {
        self.format = format;
        self
    }

    pub fn set_pooled(&mut self, pooled: bool) -> &mut Self {
        self.pooled = pooled;
        self
    }

    /// `true` if either dimension follows the viewport.
    #[inline]
    #[must_use]
    pub const fn is_viewport_relative(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Concrete size against a viewport of `viewport` pixels.
    #[inline]
    #[must_use]
    pub const fn resolve_size(&self, viewport: (u32, u32)) -> (u32, u32) {
        let width = if self.width == 0 { viewport.0 } else { self.width };
        let height = if self.height == 0 { viewport.1 } else { self.height };
        (width, height)
    }
}

/// One pipeline variant of a compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionTechnique {
    #[serde(default)]
    pub texture_definitions: Vec<TextureDefinition>,
    /// Intermediate stages, executed in order before the output stage.
    #[serde(default)]
    pub target_passes: Vec<CompositionTargetPass>,
    pub output_target_pass: CompositionTargetPass,
    /// Render system features this technique needs.
    #[serde(default)]
    pub required_features: RenderFeatures,
}

impl Default for CompositionTechnique {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionTechnique {
    #[must_use]
    pub fn new() -> Self {
        Self {
            texture_definitions: Vec::new(),
            target_passes: Vec::new(),
            output_target_pass: CompositionTargetPass::new(TargetOutput::Final),
            required_features: RenderFeatures::empty(),
        }
    }

    // ── Texture definitions ────────────────────────────────────────────────

    /// Declares a new intermediate texture and returns it for authoring.
    ///
    /// Fails if the name is already declared or is the reserved
    /// [`PREVIOUS_INPUT`].
    pub fn create_texture_definition(
        &mut self,
        name: impl Into<String>,
    ) -> Result<&mut TextureDefinition> {
        let name = name.into();
        if name.is_empty() || name == PREVIOUS_INPUT {
            return Err(LumenError::definition(
                "",
                format!("'{name}' is not a valid texture definition name"),
            ));
        }
        if self.texture_definition(&name).is_some() {
            return Err(LumenError::definition(
                "",
                format!("texture definition '{name}' declared twice"),
            ));
        }
        self.texture_definitions.push(TextureDefinition::new(name));
        let last = self.texture_definitions.len() - 1;
        Ok(&mut self.texture_definitions[last])
    }

    #[must_use]
    pub fn texture_definition(&self, name: &str) -> Option<&TextureDefinition> {
        self.texture_definitions.iter().find(|d| d.name == name)
    }

    pub fn remove_texture_definition(&mut self, name: &str) -> Option<TextureDefinition> {
        let index = self.texture_definitions.iter().position(|d| d.name == name)?;
        Some(self.texture_definitions.remove(index))
    }

    // ── Stages ─────────────────────────────────────────────────────────────

    /// Appends an intermediate stage. Set its destination with
    /// [`CompositionTargetPass::set_output_name`].
    pub fn create_target_pass(&mut self) -> &mut CompositionTargetPass {
        self.target_passes
            .push(CompositionTargetPass::new(TargetOutput::Texture(String::new())));
        let last = self.target_passes.len() - 1;
        &mut self.target_passes[last]
    }

    pub fn remove_target_pass(&mut self, index: usize) -> Option<CompositionTargetPass> {
        (index < self.target_passes.len()).then(|| self.target_passes.remove(index))
    }

    #[must_use]
    pub fn output_target_pass(&self) -> &CompositionTargetPass {
        &self.output_target_pass
    }

    pub fn output_target_pass_mut(&mut self) -> &mut CompositionTargetPass {
        &mut self.output_target_pass
    }

    /// All stages in execution order: intermediates, then the output stage.
    pub fn stages(&self) -> impl Iterator<Item = &CompositionTargetPass> {
        self.target_passes
            .iter()
            .chain(std::iter::once(&self.output_target_pass))
    }

    // ── Capabilities ───────────────────────────────────────────────────────

    pub fn require(&mut self, features: RenderFeatures) -> &mut Self {
        self.required_features |= features;
        self
    }

    /// `true` if the render system has every required feature and can
    /// render to every declared format. Float formats also need
    /// `FLOAT_TEXTURES`.
    #[must_use]
    pub fn is_supported(&self, caps: &Capabilities) -> bool {
        caps.supports_features(self.required_features)
            && self.texture_definitions.iter().all(|d| {
                caps.supports_format(d.format)
                    && (!d.format.is_float()
                        || caps.supports_features(RenderFeatures::FLOAT_TEXTURES))
            })
    }

    // ── Validation ─────────────────────────────────────────────────────────

    /// Checks that the technique can be compiled. `compositor` names the
    /// owner in the returned error.
    pub fn validate(&self, compositor: &str) -> Result<()> {
        let mut seen = FxHashSet::default();
        for def in &self.texture_definitions {
            if !seen.insert(def.name.as_str()) {
                return Err(LumenError::definition(
                    compositor,
                    format!("texture definition '{}' declared twice", def.name),
                ));
            }
            if def.name == PREVIOUS_INPUT {
                return Err(LumenError::definition(
                    compositor,
                    "'previous' cannot be used as a texture definition name",
                ));
            }
        }

        for (index, stage) in self.target_passes.iter().enumerate() {
            match &stage.output {
                TargetOutput::Texture(name) if seen.contains(name.as_str()) => {}
                TargetOutput::Texture(name) => {
                    return Err(LumenError::definition(
                        compositor,
                        format!("stage {index} renders to undefined texture '{name}'"),
                    ));
                }
                TargetOutput::Final => {
                    return Err(LumenError::definition(
                        compositor,
                        format!("stage {index} targets the final output; only the output stage may"),
                    ));
                }
            }
        }
        if self.output_target_pass.output != TargetOutput::Final {
            return Err(LumenError::definition(
                compositor,
                "output stage must render to the final output",
            ));
        }

        for stage in self.stages() {
            for pass in &stage.passes {
                let PassKind::RenderQuad(quad) = &pass.kind else {
                    continue;
                };
                if quad.material.as_deref().is_none_or(str::is_empty) {
                    return Err(LumenError::definition(
                        compositor,
                        "render quad pass without a material",
                    ));
                }
                for (slot, input) in quad.bound_inputs() {
                    if input == PREVIOUS_INPUT {
                        if stage.input_mode != InputMode::Previous {
                            return Err(LumenError::definition(
                                compositor,
                                format!(
                                    "input slot {slot} reads 'previous' in a stage whose input mode is None"
                                ),
                            ));
                        }
                    } else if !seen.contains(input) {
                        return Err(LumenError::definition(
                            compositor,
                            format!("input slot {slot} names undefined texture '{input}'"),
                        ));
                    }
                }
            }
        }

        let output = &self.output_target_pass;
        if self.target_passes.is_empty()
            && output.passes.is_empty()
            && output.input_mode == InputMode::None
        {
            return Err(LumenError::definition(compositor, "technique produces no output"));
        }
        Ok(())
    }
}
