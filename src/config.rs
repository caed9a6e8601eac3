//! Compiler configuration.
//!
//! Options come from an optional TOML file, then `CINDER_*` environment
//! variables, then command-line flags (applied by the binary).

use std::path::{Path, PathBuf};

use crate::bytecode::context::{CompilerOptions, ResolveMode};

pub const ENV_MODE: &str = "CINDER_MODE";
pub const ENV_WARNINGS_AS_ERRORS: &str = "CINDER_WARNINGS_AS_ERRORS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{path:?}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config '{path:?}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Load options from `path` (if any) and the process environment.
pub fn load_options(path: Option<&Path>) -> Result<CompilerOptions, ConfigError> {
    let options = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            parse_options(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => CompilerOptions::default(),
    };

    apply_env(options, |var| std::env::var(var).ok())
}

pub fn parse_options(content: &str) -> Result<CompilerOptions, toml::de::Error> {
    toml::from_str(content)
}

/// Override `options` with whatever `lookup` finds for the `CINDER_*`
/// variables.
pub fn apply_env<F>(mut options: CompilerOptions, lookup: F) -> Result<CompilerOptions, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_MODE) {
        options.mode = match value.to_ascii_lowercase().as_str() {
            "immediate" => ResolveMode::Immediate,
            "deferred" => ResolveMode::Deferred,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    var: ENV_MODE,
                    value,
                });
            }
        };
    }

    if let Some(value) = lookup(ENV_WARNINGS_AS_ERRORS) {
        options.warnings_as_errors = match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    var: ENV_WARNINGS_AS_ERRORS,
                    value,
                });
            }
        };
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let options = parse_options(
            r#"
            mode = "deferred"
            warnings_as_errors = true
            chunk_words = 256
            "#,
        )
        .unwrap();

        assert_eq!(options.mode, ResolveMode::Deferred);
        assert!(options.warnings_as_errors);
        assert_eq!(options.chunk_words, 256);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let options = parse_options("warnings_as_errors = true").unwrap();
        assert_eq!(options.mode, ResolveMode::Immediate);
        assert_eq!(options.chunk_words, CompilerOptions::default().chunk_words);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(parse_options(r#"mode = "lazy""#).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let options = apply_env(CompilerOptions::default(), |var| match var {
            ENV_MODE => Some("Deferred".to_string()),
            ENV_WARNINGS_AS_ERRORS => Some("yes".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(options.mode, ResolveMode::Deferred);
        assert!(options.warnings_as_errors);
    }

    #[test]
    fn test_env_invalid_value() {
        let err = apply_env(CompilerOptions::default(), |var| {
            (var == ENV_WARNINGS_AS_ERRORS).then(|| "maybe".to_string())
        })
        .unwrap_err();

        assert!(err.to_string().contains("maybe"));
        assert!(err.to_string().contains(ENV_WARNINGS_AS_ERRORS));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_options(Some(Path::new("/nonexistent/cinder.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
