use std::path::PathBuf;
use std::time::Duration;

use summary_flow::{ResolvedProfile, resolve_profile};
use tracing::warn;

pub const DEFAULT_MODEL: &str = "google/medgemma-1.5-4b-it";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_PORT: u16 = 3000;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub profile: ResolvedProfile,
    pub prompt_dir: PathBuf,
    /// Where HTTP clients may point `image_path`. Unset disables image input.
    pub image_dir: Option<PathBuf>,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub port: u16,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let profile = resolve_profile(
            &get("INFRA_ABILITY").unwrap_or_else(|| "LOW".to_string()),
            &get("MODEL_MODE").unwrap_or_else(|| "TEXT".to_string()),
        );

        let timeout_secs = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid LLM_TIMEOUT_SECS, using default");
                DEFAULT_TIMEOUT_SECS
            }),
            None => DEFAULT_TIMEOUT_SECS,
        };

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid PORT, using default");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Self {
            profile,
            prompt_dir: get("PROMPT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./prompts")),
            image_dir: get("IMAGE_DIR").map(PathBuf::from),
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: get("OPENROUTER_API_KEY"),
            timeout: Duration::from_secs(timeout_secs),
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use summary_flow::{ModelMode, ResourceProfile};

    fn config(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]);
        assert_eq!(config.profile.profile(), ResourceProfile::Low);
        assert_eq!(config.profile.mode, ModelMode::Text);
        assert_eq!(config.prompt_dir, PathBuf::from("./prompts"));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.api_key.is_none());
        assert!(config.image_dir.is_none());
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("INFRA_ABILITY", "APPLE_SILICON"),
            ("MODEL_MODE", "VLM"),
            ("PROMPT_DIR", "/etc/prompts"),
            ("IMAGE_DIR", "/srv/scans"),
            ("LLM_BASE_URL", "http://localhost:8000/v1/"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("LLM_TIMEOUT_SECS", "30"),
            ("PORT", "8080"),
        ]);
        assert_eq!(config.profile.profile(), ResourceProfile::AppleSilicon);
        assert!(config.profile.accepts_images);
        assert_eq!(config.prompt_dir, PathBuf::from("/etc/prompts"));
        assert_eq!(config.image_dir, Some(PathBuf::from("/srv/scans")));
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn bad_values_fall_back() {
        let config = config(&[
            ("INFRA_ABILITY", "QUANTUM"),
            ("PORT", "not-a-port"),
            ("LLM_TIMEOUT_SECS", "-1"),
            ("OPENROUTER_API_KEY", "  "),
        ]);
        assert_eq!(config.profile.profile(), ResourceProfile::Low);
        assert_eq!(config.port, 3000);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(config.api_key.is_none());
    }
}
