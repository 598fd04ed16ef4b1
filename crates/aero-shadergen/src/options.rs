use serde::{Deserialize, Serialize};

/// Default number of texcoord interpolators available between the vertex and fragment stage.
pub const DEFAULT_MAX_TEXCOORD_SLOTS: usize = 8;

/// Default number of floats carried by those interpolators (4 per slot).
pub const DEFAULT_MAX_TEXCOORD_FLOATS: usize = DEFAULT_MAX_TEXCOORD_SLOTS * 4;

/// How aggressively vertex shader texcoord outputs are packed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompactPolicy {
    /// Only compact when the outputs do not fit the slot budget.
    Low,
    /// Always compact, but avoid splitting a parameter across slots when the budget allows it.
    #[default]
    Medium,
    /// Pack as tightly as possible, splitting parameters across slots when needed.
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderGenOptions {
    /// Name of the registered program writer used for output (`hlsl`, `glsl`, `glsles`).
    pub target_language: String,
    pub compact_policy: CompactPolicy,
    pub max_texcoord_slots: usize,
    pub max_texcoord_floats: usize,
    /// Shader profiles supported by the HLSL target (e.g. `vs_3_0`, `ps_4_0`).
    ///
    /// Any profile with major version 4 or above switches the HLSL writer to shader model 4
    /// syntax (`SV_Target`, packed vertex colours).
    pub hlsl_profiles: Vec<String>,
    pub glsl_version: u32,
    pub glsles_version: u32,
}

impl Default for ShaderGenOptions {
    fn default() -> Self {
        Self {
            target_language: "hlsl".to_owned(),
            compact_policy: CompactPolicy::default(),
            max_texcoord_slots: DEFAULT_MAX_TEXCOORD_SLOTS,
            max_texcoord_floats: DEFAULT_MAX_TEXCOORD_FLOATS,
            hlsl_profiles: vec!["vs_3_0".to_owned(), "ps_3_0".to_owned()],
            glsl_version: 120,
            glsles_version: 100,
        }
    }
}

impl ShaderGenOptions {
    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    pub fn with_compact_policy(mut self, policy: CompactPolicy) -> Self {
        self.compact_policy = policy;
        self
    }

    /// True when any configured HLSL profile is shader model 4 or newer.
    pub fn hlsl_shader_model_4(&self) -> bool {
        self.hlsl_profiles
            .iter()
            .any(|profile| profile_major_version(profile).is_some_and(|major| major >= 4))
    }
}

/// Extracts the major version from profiles like `vs_4_0` or `ps_5_1`.
fn profile_major_version(profile: &str) -> Option<u32> {
    let mut parts = profile.split('_');
    let stage = parts.next()?;
    if stage.len() != 2 || !stage.ends_with('s') {
        return None;
    }
    parts.next()?.parse().ok()
}
