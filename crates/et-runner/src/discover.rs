use std::path::{Path, PathBuf};

use et_resample::is_processed_output;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::RunnerError;

pub const DEFAULT_FILE_TYPES: [&str; 2] = ["txt", "text"];
pub const DEFAULT_FILE_PATTERN: &str = "*";

/// Which files under the scan root are resampled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Extensions without the leading dot, compared exactly.
    pub file_types: Vec<String>,
    /// Wildcard matched against the file name.
    pub pattern: String,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl DiscoveryOptions {
    /// Build from the raw `FILE_TYPES` list and `FILE_TO_PROCESS` pattern.
    /// Blank values keep the defaults.
    #[must_use]
    pub fn new(file_types: Option<&str>, pattern: Option<&str>) -> Self {
        let mut types: Vec<String> = file_types
            .unwrap_or_default()
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(str::to_owned)
            .collect();
        if types.is_empty() {
            types = DEFAULT_FILE_TYPES.iter().map(|ext| (*ext).to_owned()).collect();
        }

        let pattern = pattern
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .unwrap_or(DEFAULT_FILE_PATTERN)
            .to_owned();

        Self {
            file_types: types,
            pattern,
        }
    }

    /// Whether `path` names an input file: a known extension, a name that
    /// matches the pattern, and not an earlier output.
    #[must_use]
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
            return false;
        };
        let extension_ok = path
            .extension()
            .map(|ext| ext.to_string_lossy())
            .is_some_and(|ext| self.file_types.iter().any(|known| *known == ext));

        extension_ok && !is_processed_output(path) && wildcard_match(&self.pattern, &name)
    }
}

/// Recursively list input files under `root`, in file-name order within each
/// directory. An unreadable root is an error; unreadable entries below it
/// are logged and skipped.
pub fn discover_files(root: &Path, options: &DiscoveryOptions) -> Result<Vec<PathBuf>, RunnerError> {
    if !root.is_dir() {
        return Err(RunnerError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                log::warn!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if entry.file_type().is_file() && options.is_candidate(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// `*` matches any run of characters (including none), `?` exactly one.
/// Everything else matches itself.
#[must_use]
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, from)) => {
                    p = star + 1;
                    t = from + 1;
                    backtrack = Some((star, from + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
