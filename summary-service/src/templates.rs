use std::path::Path;

use summary_flow::PromptTemplates;
use summary_flow::prompt::{FOLLOW_UP_FILE, INITIAL_SYNTHESIS_FILE};
use tracing::{info, warn};

/// Load both prompt templates from `dir`. A missing or empty file falls back to the
/// built-in template.
pub fn load_templates(dir: &Path) -> PromptTemplates {
    let initial = read_or_fallback(
        dir,
        INITIAL_SYNTHESIS_FILE,
        PromptTemplates::builtin_initial_synthesis(),
    );
    let follow_up = read_or_fallback(dir, FOLLOW_UP_FILE, PromptTemplates::builtin_follow_up());
    PromptTemplates::new(initial, follow_up)
}

fn read_or_fallback(dir: &Path, name: &str, fallback: &str) -> String {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => {
            info!(path = %path.display(), "Loaded prompt template");
            text
        }
        Ok(_) => {
            warn!(path = %path.display(), "Prompt file is empty. Using fallback");
            fallback.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Prompt file not found. Using fallback");
            fallback.to_string()
        }
    }
}
