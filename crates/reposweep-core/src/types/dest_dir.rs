//! Validated destination root for one extraction.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::ExtractionError;
use crate::Result;

/// An absolute, canonical, writable directory bounding every write of one
/// extraction.
///
/// Every path the extractor writes must canonicalize to a location strictly
/// below this root.
///
/// # Examples
///
/// ```no_run
/// use reposweep_core::DestRoot;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let root = DestRoot::new("/tmp/extraction")?;
/// println!("Extracting to: {}", root.as_path().display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestRoot(PathBuf);

impl DestRoot {
    /// Validates `path` and canonicalizes it.
    ///
    /// There is a window between these checks and later writes in which the
    /// directory could be swapped; every written path is therefore checked
    /// again against the canonical root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist, is not a directory,
    /// cannot be canonicalized, or is not writable (on Unix).
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let metadata = std::fs::metadata(&path).map_err(|e| {
            ExtractionError::Io(io::Error::new(
                e.kind(),
                format!("destination root unavailable {}: {e}", path.display()),
            ))
        })?;
        if !metadata.is_dir() {
            return Err(ExtractionError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }

        let canonical = path.canonicalize().map_err(|e| {
            ExtractionError::Io(io::Error::new(
                e.kind(),
                format!("failed to canonicalize path {}: {e}", path.display()),
            ))
        })?;

        #[cfg(unix)]
        {
            use std::ffi::CString;
            use std::os::unix::ffi::OsStrExt;

            let path_cstring = CString::new(canonical.as_os_str().as_bytes()).map_err(|_| {
                ExtractionError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path contains null byte",
                ))
            })?;

            // SAFETY: access() only reads the NUL-terminated string, which
            // outlives the call.
            #[allow(unsafe_code)]
            let result = unsafe { libc::access(path_cstring.as_ptr(), libc::W_OK) };

            if result != 0 {
                return Err(ExtractionError::Io(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("directory is not writable: {}", canonical.display()),
                )));
            }
        }

        Ok(Self(canonical))
    }

    /// Returns the canonical root path.
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Converts into the inner `PathBuf`.
    #[inline]
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for DestRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
