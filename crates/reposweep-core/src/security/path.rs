//! Entry name policy and trusted-root resolution.
//!
//! Two layers guard every write: cheap token checks on the raw entry name,
//! then canonicalization of the joined path and a strict prefix check
//! against the canonical destination root. The token checks are only a
//! pre-filter; the prefix check is what keeps writes inside the root.

use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::error::PolicyViolation;
use crate::types::DestRoot;

/// Windows UNC prefix sequence.
const UNC_SEPARATOR: &str = r"\\";

/// Extension of archives that are refused as nested entries.
const NESTED_ARCHIVE_EXTENSION: &str = ".zip";

/// Screens an entry name before it counts against the extraction budget.
///
/// # Errors
///
/// Returns [`PolicyViolation::UncPath`] for names containing `\\` and
/// [`PolicyViolation::NestedArchive`] for `.zip` files (any case).
///
/// # Examples
///
/// ```
/// use reposweep_core::PolicyViolation;
/// use reposweep_core::security::screen_entry_name;
///
/// assert!(screen_entry_name("repo-main/src/lib.rs").is_ok());
/// assert_eq!(
///     screen_entry_name("repo-main/42.ZIP"),
///     Err(PolicyViolation::NestedArchive)
/// );
/// ```
pub fn screen_entry_name(name: &str) -> Result<(), PolicyViolation> {
    if name.contains(UNC_SEPARATOR) {
        return Err(PolicyViolation::UncPath);
    }

    let file_name = name.rsplit('/').next().unwrap_or(name);
    if has_nested_archive_extension(file_name) {
        return Err(PolicyViolation::NestedArchive);
    }

    Ok(())
}

fn has_nested_archive_extension(file_name: &str) -> bool {
    let ext_len = NESTED_ARCHIVE_EXTENSION.len();
    file_name.len() > ext_len
        && file_name
            .get(file_name.len() - ext_len..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(NESTED_ARCHIVE_EXTENSION))
}

/// Resolves an entry name to the canonical path it may be written to.
///
/// Checks, in order: null bytes, `..` segments (either separator), absolute
/// names, segment depth, containment of the canonicalized path strictly
/// inside `root`, and absence of any existing filesystem object (including
/// a dangling symlink) at the path.
///
/// Missing path components are not created; the nearest existing ancestor
/// is canonicalized and the missing components appended.
///
/// # Errors
///
/// Returns the first [`PolicyViolation`] the name triggers.
pub fn resolve_entry_path(
    name: &str,
    root: &DestRoot,
    max_depth: usize,
) -> Result<PathBuf, PolicyViolation> {
    if name.contains('\0') {
        return Err(PolicyViolation::NullByte);
    }

    let segments: Vec<&str> = name
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if segments.contains(&"..") {
        return Err(PolicyViolation::ParentTraversal);
    }

    if is_absolute_name(name, segments.first().copied()) {
        return Err(PolicyViolation::AbsolutePath);
    }

    if segments.is_empty() {
        return Err(PolicyViolation::EmptyName);
    }

    if segments.len() > max_depth {
        return Err(PolicyViolation::TooDeep {
            depth: segments.len(),
            max: max_depth,
        });
    }

    let candidate: PathBuf = segments
        .iter()
        .fold(root.as_path().to_path_buf(), |path, segment| path.join(segment));

    let canonical = match canonicalize_lenient(&candidate) {
        Ok(path) => path,
        Err(_) if exists_no_follow(&candidate) => {
            return Err(PolicyViolation::AlreadyExists { path: candidate });
        }
        Err(e) => {
            return Err(PolicyViolation::Unresolvable {
                path: candidate,
                kind: e.kind(),
            });
        }
    };

    if !is_strictly_within(&canonical, root.as_path()) {
        return Err(PolicyViolation::OutsideRoot { path: canonical });
    }

    if exists_no_follow(&canonical) || exists_no_follow(&candidate) {
        return Err(PolicyViolation::AlreadyExists { path: canonical });
    }

    Ok(canonical)
}

fn is_absolute_name(name: &str, first_segment: Option<&str>) -> bool {
    if name.starts_with(['/', '\\']) || Path::new(name).is_absolute() {
        return true;
    }

    // drive prefix such as `C:`
    first_segment.is_some_and(|segment| {
        let bytes = segment.as_bytes();
        bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
    })
}

/// Returns `true` if `path` is below `root` and not equal to it.
///
/// Both paths are compared component-wise, so `/tmp/xy` is not inside
/// `/tmp/x`.
#[must_use]
pub fn is_strictly_within(path: &Path, root: &Path) -> bool {
    path != root && path.starts_with(root)
}

/// Canonicalizes a path whose trailing components may not exist yet.
///
/// The nearest existing ancestor is resolved with `canonicalize` (following
/// symlinks); the missing components are appended verbatim. A dangling
/// symlink along the way makes resolution fail.
///
/// # Errors
///
/// Returns an error if the existing ancestor cannot be canonicalized or the
/// path has a component that cannot be appended.
pub fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        match fs::symlink_metadata(existing) {
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let name = existing.file_name().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "path has no existing ancestor")
                })?;
                missing.push(name);
                existing = existing.parent().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "path has no existing ancestor")
                })?;
            }
            Err(e) => return Err(e),
        }
    }

    let mut canonical = existing.canonicalize()?;
    for name in missing.iter().rev() {
        if Path::new(name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "non-normal path component",
            ));
        }
        canonical.push(name);
    }

    Ok(canonical)
}

fn exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
