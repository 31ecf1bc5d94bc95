//! Target Passes
//!
//! A target pass is one stage of a technique: an ordered list of passes that
//! all render into the same destination.

use serde::{Deserialize, Serialize};

use super::pass::{CompositionPass, PassType};

/// Where a stage renders to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOutput {
    /// A texture definition of the technique.
    Texture(String),
    /// The instance's final output (next instance's input, or the viewport).
    Final,
}

/// How a stage obtains its implicit input.
///
/// | Mode | `"previous"` binding | Stage without passes |
/// |------|----------------------|----------------------|
/// | `None` | unavailable | does nothing |
/// | `Previous` | preceding stage's destination | copies the previous content |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    None,
    Previous,
}

/// One stage of a technique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionTargetPass {
    pub output: TargetOutput,
    #[serde(default)]
    pub input_mode: InputMode,
    /// Execute only on the first frame after the instance (re)allocates its
    /// textures.
    #[serde(default)]
    pub only_initial: bool,
    /// Scene visibility mask forwarded to scene renders of this stage.
    #[serde(default = "default_visibility_mask")]
    pub visibility_mask: u32,
    /// LOD bias forwarded to scene renders of this stage.
    #[serde(default = "default_lod_bias")]
    pub lod_bias: f32,
    /// Material scheme forwarded to scene renders of this stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_scheme: Option<String>,
    #[serde(default)]
    pub passes: Vec<CompositionPass>,
}

const fn default_visibility_mask() -> u32 {
    0xFFFF_FFFF
}

const fn default_lod_bias() -> f32 {
    1.0
}

impl CompositionTargetPass {
    #[must_use]
    pub fn new(output: TargetOutput) -> Self {
        Self {
            output,
            input_mode: InputMode::None,
            only_initial: false,
            visibility_mask: default_visibility_mask(),
            lod_bias: default_lod_bias(),
            material_scheme: None,
            passes: Vec::new(),
        }
    }

    /// Renders this stage into the named texture definition.
    pub fn set_output_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.output = TargetOutput::Texture(name.into());
        self
    }

    /// Name of the destination texture, `None` for the final output.
    #[must_use]
    pub fn output_name(&self) -> Option<&str> {
        match &self.output {
            TargetOutput::Texture(name) => Some(name),
            TargetOutput::Final => None,
        }
    }

    pub fn set_input_mode(&mut self, mode: InputMode) -> &mut Self {
        self.input_mode = mode;
        self
    }

    pub fn set_only_initial(&mut self, only_initial: bool) -> &mut Self {
        self.only_initial = only_initial;
        self
    }

    pub fn set_visibility_mask(&mut self, mask: u32) -> &mut Self {
        self.visibility_mask = mask;
        self
    }

    pub fn set_lod_bias(&mut self, bias: f32) -> &mut Self {
        self.lod_bias = bias;
        self
    }

    pub fn set_material_scheme(&mut self, scheme: impl Into<String>) -> &mut Self {
        self.material_scheme = Some(scheme.into());
        self
    }

    /// Appends a pass and returns it for authoring.
    pub fn create_pass(&mut self, pass_type: PassType) -> &mut CompositionPass {
        self.passes.push(CompositionPass::new(pass_type));
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    pub fn remove_pass(&mut self, index: usize) -> Option<CompositionPass> {
        (index < self.passes.len()).then(|| self.passes.remove(index))
    }

    #[inline]
    #[must_use]
    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    /// `true` for a `Previous` stage without passes of its own, which copies
    /// its input into its destination.
    #[inline]
    #[must_use]
    pub fn is_implicit_copy(&self) -> bool {
        self.input_mode == InputMode::Previous && self.passes.is_empty()
    }
}
