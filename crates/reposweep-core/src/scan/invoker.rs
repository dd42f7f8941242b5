//! External scanner process.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;

use log::debug;

use crate::cancel::ChildRegistry;
use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::scan::output::ScanOutput;

/// Runs an analysis tool against an extracted tree.
pub trait Scanner: Send + Sync {
    /// Scans `source`, using `output_dir` for the tool's result file.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError`] unless the tool exits successfully and leaves
    /// parsable JSON behind.
    fn invoke(&self, source: &Path, output_dir: &Path) -> Result<ScanOutput, ScanError>;
}

/// Scanner that spawns a child process per invocation.
///
/// Each child runs in its own process group, registered with the shared
/// [`ChildRegistry`] while it runs so a forced exit can kill it together
/// with anything it spawned.
#[derive(Debug, Clone)]
pub struct CommandScanner {
    config: ScannerConfig,
    children: Arc<ChildRegistry>,
}

impl CommandScanner {
    /// Creates a scanner launching `config.binary`.
    #[must_use]
    pub const fn new(config: ScannerConfig, children: Arc<ChildRegistry>) -> Self {
        Self { config, children }
    }

    /// Launch settings in use.
    #[must_use]
    pub const fn config(&self) -> &ScannerConfig {
        &self.config
    }

    fn command(&self, output: &Path, source: &Path) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .arg("--json")
            .arg("--output")
            .arg(output)
            .args(&self.config.extra_flags)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if let Some(path) = self.child_path() {
            command.env("PATH", path);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command
    }

    fn child_path(&self) -> Option<OsString> {
        let extra = self.config.extra_path.as_ref()?;
        let current = env::var_os("PATH").unwrap_or_default();
        let paths = env::split_paths(&current).chain(std::iter::once(extra.clone()));
        env::join_paths(paths).ok()
    }
}

impl Scanner for CommandScanner {
    fn invoke(&self, source: &Path, output_dir: &Path) -> Result<ScanOutput, ScanError> {
        // removed on drop, whatever happens below
        let output = tempfile::Builder::new()
            .prefix("output-")
            .suffix(".json")
            .tempfile_in(output_dir)
            .map_err(ScanError::OutputFile)?
            .into_temp_path();

        let mut child = self
            .command(&output, source)
            .spawn()
            .map_err(|source| ScanError::Spawn {
                binary: self.config.binary.clone(),
                source,
            })?;
        let status = {
            let _registered = self.children.register(child.id());
            debug!(
                "scanner pid {} started on {}",
                child.id(),
                source.display()
            );
            child.wait().map_err(ScanError::Wait)?
        };
        if !status.success() {
            return Err(ScanError::ExitStatus(status));
        }

        let bytes = fs::read(&output).map_err(ScanError::ReadOutput)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
