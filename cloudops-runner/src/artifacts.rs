//! Artifact reader
//!
//! Recovers the files a generator run left behind in its task directory.

use cloudops_core::domain::artifact::{Artifact, ArtifactBundle};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Prompt file written into every task directory; never reported as output
pub const PROMPT_FILE: &str = "task.txt";

/// Reads the generated files in `dir`
///
/// Only regular files directly inside `dir` are considered. The prompt file,
/// dotfiles, unreadable or non-UTF-8 files and files that are empty after
/// trimming are skipped. Files are returned sorted by name.
///
/// Returns `None` when the directory does not exist or nothing qualifies.
pub fn read_artifacts(dir: &Path) -> Option<ArtifactBundle> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), "Task directory not readable: {}", e);
            return None;
        }
    };

    let mut files = Vec::new();

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();

        if name == PROMPT_FILE || name.starts_with('.') {
            continue;
        }

        match entry.file_type() {
            Ok(ft) if ft.is_file() => {}
            _ => continue,
        }

        let content = match fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %name, "Skipping unreadable generated file: {}", e);
                continue;
            }
        };

        if content.trim().is_empty() {
            continue;
        }

        info!(file = %name, size = content.len(), "Found generated file");
        files.push(Artifact::new(name, content));
    }

    if files.is_empty() {
        return None;
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Some(ArtifactBundle { files })
}
