//! Error conversion utilities for CLI.
//!
//! Converts reposweep-core's startup errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use reposweep_core::ConfigError;
use reposweep_core::TargetError;

/// Converts `ConfigError` to user-friendly anyhow error with context
pub fn convert_config_error(err: ConfigError) -> anyhow::Error {
    match err {
        ConfigError::HomeDirUnavailable => {
            anyhow!(
                "Unable to determine the home directory\n\
                 HINT: Use --out-dir to choose the output directory explicitly."
            )
        }
        ConfigError::OutputDir { path, source } => {
            anyhow!(
                "Could not prepare output directory '{}': {}\n\
                 HINT: Check permissions or pick another location with --out-dir.",
                path.display(),
                source
            )
        }
        ConfigError::ScannerConfig { path, source } => {
            anyhow!(
                "Could not read scanner config '{}': {}\n\
                 HINT: The file needs a FLAGS= line; use --config-path to point elsewhere.",
                path.display(),
                source
            )
        }
        ConfigError::InvalidFilter(filter) => {
            anyhow!(
                "Invalid file count filter '{filter}'\n\
                 HINT: Use N, A-B, A- or -B, e.g. --filter-files 100-2k."
            )
        }
        ConfigError::NoWorkers => {
            anyhow!("Worker count must be at least 1\nHINT: Use --threads 1 or more.")
        }
    }
}

/// Converts an invalid `--repo` value into an error with a usage hint.
pub fn convert_target_error(err: &TargetError) -> anyhow::Error {
    anyhow!(
        "{err}\n\
         HINT: Expected github.com/<owner>/<repo>, optionally with an http(s):// prefix."
    )
}

/// Adds context to a startup configuration result.
pub fn add_config_context<T>(result: Result<T, ConfigError>) -> anyhow::Result<T> {
    result.map_err(convert_config_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_convert_output_dir_error() {
        let err = ConfigError::OutputDir {
            path: PathBuf::from("/root/forbidden"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        let msg = format!("{:?}", convert_config_error(err));
        assert!(msg.contains("/root/forbidden"));
        assert!(msg.contains("permission denied"));
        assert!(msg.contains("HINT"));
        assert!(msg.contains("--out-dir"));
    }

    #[test]
    fn test_convert_home_dir_error() {
        let msg = format!("{:?}", convert_config_error(ConfigError::HomeDirUnavailable));
        assert!(msg.contains("home directory"));
        assert!(msg.contains("--out-dir"));
    }

    #[test]
    fn test_convert_target_error() {
        let err = TargetError::InvalidTarget("gitlab.com/a/b".into());
        let msg = format!("{:?}", convert_target_error(&err));
        assert!(msg.contains("gitlab.com/a/b"));
        assert!(msg.contains("github.com/<owner>/<repo>"));
    }

    #[test]
    fn test_add_config_context_passes_ok() {
        assert_eq!(add_config_context(Ok::<_, ConfigError>(3)).ok(), Some(3));
    }
}
