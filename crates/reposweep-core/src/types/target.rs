//! Validated repository target.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::TargetError;

const REPOSITORY_URL_PATTERN: &str = r"^(?:https?://)?github\.com/((?:[A-Za-z0-9_-]+\.?)*[A-Za-z0-9_-]+)/((?:[A-Za-z0-9_-]+\.?)*[A-Za-z0-9_-]+)$";

#[allow(clippy::unwrap_used)]
fn repository_url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(REPOSITORY_URL_PATTERN).unwrap())
}

/// A GitHub repository URL, normalized to `https://github.com/<owner>/<repo>`.
///
/// Targets are immutable once constructed and cheap to clone.
///
/// # Examples
///
/// ```
/// use reposweep_core::Target;
///
/// let target: Target = "github.com/rust-lang/regex".parse().unwrap();
/// assert_eq!(target.url(), "https://github.com/rust-lang/regex");
/// assert_eq!(target.dir_name(), "rust-lang-regex");
///
/// assert!("https://example.com/a/b".parse::<Target>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    url: String,
    owner_end: usize,
}

impl Target {
    /// Validates and normalizes a repository URL.
    ///
    /// Surrounding whitespace is ignored; `http://` and bare `github.com/...`
    /// forms are normalized to `https://`.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::InvalidTarget`] if the string is not a GitHub
    /// repository URL.
    pub fn parse(input: &str) -> Result<Self, TargetError> {
        let trimmed = input.trim();
        let captures = repository_url_regex()
            .captures(trimmed)
            .ok_or_else(|| TargetError::InvalidTarget(trimmed.to_string()))?;

        let owner = &captures[1];
        let repo = &captures[2];
        let url = format!("https://github.com/{owner}/{repo}");
        let owner_end = "https://github.com/".len() + owner.len();

        Ok(Self { url, owner_end })
    }

    /// Returns the normalized URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the repository owner.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.url["https://github.com/".len()..self.owner_end]
    }

    /// Returns the repository name.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.url[self.owner_end + 1..]
    }

    /// Name of the per-target directory: `<owner>-<repo>`.
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.owner(), self.repo())
    }

    /// Returns the URL with `github.com/` replaced by `mirror`, if given.
    #[must_use]
    pub fn url_via(&self, mirror: Option<&str>) -> String {
        match mirror {
            Some(host) => self.url.replacen("github.com/", host, 1),
            None => self.url.clone(),
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_target_normalizes_scheme() {
        for input in [
            "github.com/owner/repo",
            "http://github.com/owner/repo",
            "https://github.com/owner/repo",
            "  https://github.com/owner/repo\n",
        ] {
            let target = Target::parse(input).unwrap();
            assert_eq!(target.url(), "https://github.com/owner/repo");
        }
    }

    #[test]
    fn test_target_components() {
        let target = Target::parse("https://github.com/some.org/my-repo.rs").unwrap();
        assert_eq!(target.owner(), "some.org");
        assert_eq!(target.repo(), "my-repo.rs");
        assert_eq!(target.dir_name(), "some.org-my-repo.rs");
        assert_eq!(target.to_string(), "https://github.com/some.org/my-repo.rs");
    }

    #[test]
    fn test_target_rejects_invalid() {
        for input in [
            "",
            "github.com/owner",
            "github.com/owner/repo/tree/main",
            "https://gitlab.com/owner/repo",
            "https://github.com/../repo",
            "https://github.com/owner/..",
            "https://github.com/owner/re po",
            "ftp://github.com/owner/repo",
        ] {
            let result = Target::parse(input);
            assert!(
                matches!(result, Err(TargetError::InvalidTarget(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_target_mirror_rewrite() {
        let target = Target::parse("github.com/owner/repo").unwrap();
        assert_eq!(
            target.url_via(Some("proxy.example.net/gh/")),
            "https://proxy.example.net/gh/owner/repo"
        );
        assert_eq!(target.url_via(None), "https://github.com/owner/repo");
    }
}
