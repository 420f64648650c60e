//! Runtime config TOML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::RuntimeConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();
    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| {
            if !missing.iter().any(|name| name == &cap[1]) {
                missing.push(cap[1].to_string());
            }
            String::new()
        })
    });

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

/// Parse a runtime config TOML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the TOML is invalid.
pub fn parse_config_str(toml_str: &str) -> Result<RuntimeConfig> {
    let substituted = substitute_env_vars(toml_str)?;
    let config: RuntimeConfig =
        toml::from_str(&substituted).context("Failed to parse runtime config TOML")?;
    Ok(config)
}

/// Parse a runtime config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn parse_config(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn env_vars_are_substituted() {
        std::env::set_var("PTC_TEST_SITE", "/opt/site-packages");
        let input = "[scan]\nsite_dirs = [\"${PTC_TEST_SITE}\"]";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("/opt/site-packages"));
        assert!(!result.contains("${PTC_TEST_SITE}"));
        std::env::remove_var("PTC_TEST_SITE");
    }

    #[test]
    fn text_without_env_vars_passes_through() {
        let input = "dev_mode = true";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn every_missing_env_var_is_reported() {
        let input = "${PTC_MISSING_X} and ${PTC_MISSING_Y} and ${PTC_MISSING_X}";
        let err_msg = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err_msg.contains("PTC_MISSING_X, PTC_MISSING_Y"), "{err_msg}");
    }

    #[test]
    fn parses_full_config_from_string() {
        let config = parse_config_str(
            r#"
dev_mode = true

[scan]
site_dirs = ["/venv/lib/site-packages"]
max_workers = 4

[watch]
extra_ignored_dirs = ["coverage"]
"#,
        )
        .unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.scan.site_dirs, vec![PathBuf::from("/venv/lib/site-packages")]);
        assert_eq!(config.scan.max_workers, Some(4));
        assert_eq!(config.watch.extra_ignored_dirs, vec!["coverage"]);
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert_eq!(parse_config_str("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn unknown_field_rejected() {
        let err = parse_config_str("dev_mod = true").unwrap_err();
        assert!(format!("{err:#}").contains("dev_mod"));
    }

    #[test]
    fn parses_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\nmax_workers = 2").unwrap();
        let config = parse_config(file.path()).unwrap();
        assert_eq!(config.scan.max_workers, Some(2));
    }

    #[test]
    fn missing_file_names_path() {
        let err = parse_config(Path::new("/definitely/not/portico-runtime.toml")).unwrap_err();
        assert!(err.to_string().contains("portico-runtime.toml"));
    }
}
