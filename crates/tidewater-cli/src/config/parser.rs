//! YAML loading with `${VAR}` environment substitution.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::types::PipelineConfig;
use super::{ConfigError, Result};

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Replace every `${NAME}` with `lookup(NAME)`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnv`] naming every unresolved variable.
pub fn substitute_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    let mut missing = Vec::new();
    let out = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        lookup(&cap[1]).unwrap_or_else(|| {
            missing.push(cap[1].to_string());
            String::new()
        })
    });
    if !missing.is_empty() {
        missing.sort_unstable();
        missing.dedup();
        return Err(ConfigError::MissingEnv(missing));
    }
    Ok(out.into_owned())
}

/// Parse and validate a config document, substituting from the process
/// environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] for unset variables, invalid YAML or a config
/// that fails validation.
pub fn parse_config_str(yaml: &str) -> Result<PipelineConfig> {
    let substituted = substitute_vars(yaml, |name| std::env::var(name).ok())?;
    let config: PipelineConfig = serde_yaml::from_str(&substituted)?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a config file.
///
/// # Errors
///
/// As [`parse_config_str`], plus [`ConfigError::Read`] if the file cannot
/// be read.
pub fn parse_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content)
}
