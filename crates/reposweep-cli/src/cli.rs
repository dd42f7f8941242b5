//! CLI argument parsing using clap.

use clap::Parser;
use reposweep_core::config::RangeFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reposweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Single repository to scan (github.com/<owner>/<repo>)
    #[arg(short, long, value_name = "URL", conflicts_with = "repos")]
    pub repo: Option<String>,

    /// File with one repository per line (default: read stdin)
    #[arg(short = 'R', long, value_name = "FILE")]
    pub repos: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    /// Output directory (default: ~/reposweep/scans)
    #[arg(short, long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Keep downloaded repositories after scanning
    #[arg(long)]
    pub save_repo: bool,

    /// Scanner config file holding a FLAGS= line
    #[arg(long, value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Scanner executable (default: ~/.local/bin/semgrep, then PATH)
    #[arg(long, value_name = "PATH")]
    pub scanner_path: Option<PathBuf>,

    /// Download and extract only, do not run the scanner
    #[arg(long)]
    pub no_scan: bool,

    /// Branch to download (default: repository default branch)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Host replacing github.com in download URLs
    #[arg(long, value_name = "HOST")]
    pub mirror: Option<String>,

    /// Link findings to github1s.com instead of github.com
    #[arg(long)]
    pub github1s: bool,

    /// Show the number of files of each repository
    #[arg(long)]
    pub files: bool,

    /// Only report repositories whose file count is in RANGE (N, A-B, A-, -B)
    #[arg(long, value_name = "RANGE")]
    pub filter_files: Option<RangeFilter>,

    /// Maximum number of entries per archive
    #[arg(long, default_value = "500000")]
    pub max_entries: usize,

    /// Maximum total extracted size per archive (K, M, G, T suffixes)
    #[arg(long, value_parser = parse_byte_size)]
    pub max_total_size: Option<u64>,

    /// Maximum path depth of archive entries
    #[arg(long, default_value = "100")]
    pub max_depth: usize,

    /// Maximum download size per archive (K, M, G, T suffixes)
    #[arg(long, value_parser = parse_byte_size)]
    pub max_archive_size: Option<u64>,

    /// Output results as JSON lines
    #[arg(short, long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

/// Parse byte size with optional suffix (K, M, G, T)
fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty byte size".to_string());
    }

    let (num_str, multiplier) = if let Some(stripped) = s.strip_suffix('T') {
        (stripped, 1024_u64.pow(4))
    } else if let Some(stripped) = s.strip_suffix('G') {
        (stripped, 1024_u64.pow(3))
    } else if let Some(stripped) = s.strip_suffix('M') {
        (stripped, 1024_u64.pow(2))
    } else if let Some(stripped) = s.strip_suffix('K') {
        (stripped, 1024)
    } else {
        (s, 1)
    };

    num_str
        .parse::<u64>()
        .map_err(|_| format!("invalid byte size: {s}"))
        .and_then(|n| {
            n.checked_mul(multiplier)
                .ok_or_else(|| format!("byte size overflow: {s}"))
        })
}
