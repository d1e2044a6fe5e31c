//! Hardware profile resolution.
//!
//! Maps the `INFRA_ABILITY` / `MODEL_MODE` tags to a fixed generation strategy.
//! Resolution is a pure lookup: the same tags always give the same strategy and
//! unknown tags fall back to the conservative defaults.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Named hardware-capability tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceProfile {
    Low,
    High,
    AppleSilicon,
}

impl ResourceProfile {
    /// Parse a profile tag, case-insensitively. Returns `None` for unknown tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "HIGH" => Some(Self::High),
            "APPLE_SILICON" => Some(Self::AppleSilicon),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::High => "HIGH",
            Self::AppleSilicon => "APPLE_SILICON",
        }
    }
}

impl fmt::Display for ResourceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Whether the model accepts image input alongside text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelMode {
    Text,
    Vlm,
}

impl ModelMode {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Some(Self::Text),
            "VLM" => Some(Self::Vlm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantization {
    FourBit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Float16,
    BFloat16,
    Float32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTarget {
    Accelerator,
    Cpu,
    UnifiedMemory,
}

/// Decoding policy passed through to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sampling {
    Greedy,
    Nucleus { temperature: f32, top_p: f32 },
}

/// Concrete strategy derived from a [`ResourceProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStrategy {
    pub profile: ResourceProfile,
    pub quantization: Quantization,
    pub precision: Precision,
    pub device: DeviceTarget,
    pub max_new_tokens: u32,
    pub sampling: Sampling,
}

impl GenerationStrategy {
    pub fn for_profile(profile: ResourceProfile) -> Self {
        match profile {
            ResourceProfile::Low => Self {
                profile,
                quantization: Quantization::FourBit,
                precision: Precision::Float16,
                device: DeviceTarget::Accelerator,
                max_new_tokens: 1536,
                sampling: Sampling::Greedy,
            },
            ResourceProfile::High => Self {
                profile,
                quantization: Quantization::None,
                precision: Precision::BFloat16,
                device: DeviceTarget::Accelerator,
                max_new_tokens: 2048,
                sampling: Sampling::Nucleus {
                    temperature: 0.6,
                    top_p: 0.9,
                },
            },
            ResourceProfile::AppleSilicon => Self {
                profile,
                quantization: Quantization::None,
                precision: Precision::Float32,
                device: DeviceTarget::UnifiedMemory,
                max_new_tokens: 3096,
                sampling: Sampling::Nucleus {
                    temperature: 0.3,
                    top_p: 0.9,
                },
            },
        }
    }
}

/// Process-wide generation settings. Resolved once at startup and then shared read-only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProfile {
    pub strategy: GenerationStrategy,
    pub mode: ModelMode,
    pub accepts_images: bool,
}

impl ResolvedProfile {
    pub fn profile(&self) -> ResourceProfile {
        self.strategy.profile
    }

    pub fn max_new_tokens(&self) -> u32 {
        self.strategy.max_new_tokens
    }
}

impl Default for ResolvedProfile {
    fn default() -> Self {
        resolve_profile("LOW", "TEXT")
    }
}

/// Resolve the profile and model-mode tags.
///
/// Unknown tags are not fatal: the profile falls back to `LOW` and the mode to `TEXT`,
/// each with a warning.
pub fn resolve_profile(profile_tag: &str, mode_tag: &str) -> ResolvedProfile {
    let profile = ResourceProfile::from_tag(profile_tag).unwrap_or_else(|| {
        warn!(
            requested = %profile_tag,
            fallback = %ResourceProfile::Low,
            "Unrecognized hardware profile, falling back"
        );
        ResourceProfile::Low
    });

    let mode = ModelMode::from_tag(mode_tag).unwrap_or_else(|| {
        warn!(requested = %mode_tag, "Unrecognized model mode, falling back to TEXT");
        ModelMode::Text
    });

    ResolvedProfile {
        strategy: GenerationStrategy::for_profile(profile),
        mode,
        accepts_images: mode == ModelMode::Vlm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_profiles_case_insensitively() {
        let high = resolve_profile("high", "TEXT");
        assert_eq!(high.profile(), ResourceProfile::High);
        assert_eq!(high.strategy.quantization, Quantization::None);
        assert_eq!(high.strategy.precision, Precision::BFloat16);

        let apple = resolve_profile(" Apple_Silicon ", "text");
        assert_eq!(apple.profile(), ResourceProfile::AppleSilicon);
        assert_eq!(apple.strategy.device, DeviceTarget::UnifiedMemory);
        assert_eq!(apple.strategy.precision, Precision::Float32);
    }

    #[test]
    fn low_profile_is_quantized() {
        let low = resolve_profile("LOW", "TEXT");
        assert_eq!(low.strategy.quantization, Quantization::FourBit);
        assert_eq!(low.strategy.precision, Precision::Float16);
        assert_eq!(low.max_new_tokens(), 1536);
        assert_eq!(low.strategy.sampling, Sampling::Greedy);
    }

    #[test]
    fn unknown_profile_falls_back_to_low() {
        let resolved = resolve_profile("QUANTUM", "TEXT");
        assert_eq!(resolved, resolve_profile("LOW", "TEXT"));
        assert_eq!(resolved, ResolvedProfile::default());
    }

    #[test]
    fn resolution_is_deterministic() {
        for tag in ["LOW", "HIGH", "APPLE_SILICON", "bogus", ""] {
            assert_eq!(resolve_profile(tag, "VLM"), resolve_profile(tag, "VLM"));
        }
    }

    #[test]
    fn vlm_mode_accepts_images() {
        assert!(resolve_profile("LOW", "vlm").accepts_images);
        assert!(!resolve_profile("LOW", "TEXT").accepts_images);
        let fallback = resolve_profile("LOW", "AUDIO");
        assert_eq!(fallback.mode, ModelMode::Text);
        assert!(!fallback.accepts_images);
    }
}
