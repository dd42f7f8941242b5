//! Repository archive download.
//!
//! One HTTP GET per target. Success is exactly `200`; `404` and `422` are
//! reported as their own outcomes and every other status or transport
//! failure collapses into [`FetchError::Transport`]. No retries happen
//! here.

use std::io;
use std::io::Read;
use std::time::Duration;

use log::debug;

use crate::error::FetchError;
use crate::types::Target;

/// Browser identification sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Default ceiling on a downloaded archive (2 GiB).
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Source of repository archives.
pub trait ArchiveFetcher: Send + Sync {
    /// Downloads the archive of `target` at `branch` (default branch when
    /// `None`).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`], [`FetchError::Unprocessable`] or
    /// [`FetchError::Transport`].
    fn fetch(&self, target: &Target, branch: Option<&str>) -> Result<Vec<u8>, FetchError>;
}

/// Builds the archive URL of `target`.
///
/// # Examples
///
/// ```
/// use reposweep_core::Target;
/// use reposweep_core::fetch::archive_url;
///
/// let target: Target = "github.com/owner/repo".parse().unwrap();
/// assert_eq!(
///     archive_url(&target, Some("main"), None),
///     "https://github.com/owner/repo/archive/refs/heads/main.zip"
/// );
/// assert_eq!(
///     archive_url(&target, None, None),
///     "https://github.com/owner/repo/archive/HEAD.zip"
/// );
/// ```
#[must_use]
pub fn archive_url(target: &Target, branch: Option<&str>, mirror: Option<&str>) -> String {
    let base = target.url_via(mirror);
    match branch {
        Some(branch) => format!("{base}/archive/refs/heads/{branch}.zip"),
        None => format!("{base}/archive/HEAD.zip"),
    }
}

/// Fetcher backed by a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    mirror: Option<String>,
    headers: Vec<(String, String)>,
    max_bytes: u64,
}

impl HttpFetcher {
    /// Creates a fetcher with the default timeouts and body ceiling.
    #[must_use]
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();

        Self {
            agent,
            mirror: None,
            headers: Vec::new(),
            max_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        }
    }

    /// Routes downloads through `host`, which replaces `github.com/`.
    #[must_use]
    pub fn with_mirror(mut self, host: Option<String>) -> Self {
        self.mirror = host;
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the maximum accepted body size.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Performs one GET and returns the body of a `200` response.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] for any other outcome, including a body
    /// larger than the configured ceiling.
    pub fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request = self
            .headers
            .iter()
            .fold(self.agent.get(url), |request, (name, value)| {
                request.set(name, value)
            });

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Err(FetchError::NotFound),
            Err(ureq::Error::Status(422, _)) => return Err(FetchError::Unprocessable),
            Err(ureq::Error::Status(code, _)) => {
                return Err(FetchError::Transport(format!("{url}: status code {code}")));
            }
            Err(e) => return Err(FetchError::Transport(e.to_string())),
        };

        if response.status() != 200 {
            return Err(FetchError::Transport(format!(
                "{url}: status code {}",
                response.status()
            )));
        }

        let body = read_limited(response.into_reader(), self.max_bytes)
            .map_err(|e| FetchError::Transport(format!("{url}: {e}")))?;
        debug!("fetched {} bytes from {url}", body.len());
        Ok(body)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(&self, target: &Target, branch: Option<&str>) -> Result<Vec<u8>, FetchError> {
        self.get(&archive_url(target, branch, self.mirror.as_deref()))
    }
}

fn read_limited(reader: impl Read, max_bytes: u64) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut bytes)?;
    if bytes.len() as u64 > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("response exceeded {max_bytes} bytes"),
        ));
    }
    Ok(bytes)
}
