//! Loading declaration contexts from disk.
//!
//! `.yaml` and `.yml` files are read as YAML, everything else as JSON.

use std::path::Path;

use anyhow::{Context, Result};
use dpae_core::{DeclarationContext, Environment};

/// Read a declaration context from a JSON or YAML file.
pub fn load_context(path: &Path) -> Result<DeclarationContext> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let context = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML declaration {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON declaration {}", path.display()))?
    };
    tracing::debug!(path = %path.display(), "declaration loaded");
    Ok(context)
}

/// Load a context and switch it to production when asked.
pub fn load_for(path: &Path, production: bool) -> Result<DeclarationContext> {
    let mut context = load_context(path)?;
    if production {
        context.set_environment(Environment::Production);
    }
    Ok(context)
}
