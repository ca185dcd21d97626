use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path};

use regex::Regex;

use crate::EngineError;

/// Files below one session root, as `/`-separated relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionListing {
    pub files: BTreeSet<String>,
    /// Subdirectories that could not be read, or were symlinks, and were skipped.
    pub warnings: Vec<String>,
}

/// Walk `root` without descending into directories whose name matches `exclude`.
///
/// A missing root is an error; an unreadable subdirectory is recorded in
/// [`SessionListing::warnings`] and the walk continues. Symlinked directories
/// are skipped with a warning; symlinked files are listed.
pub fn list_session_files(root: &Path, exclude: &Regex) -> Result<SessionListing, EngineError> {
    if !root.is_dir() {
        return Err(EngineError::RootNotFound(root.to_path_buf()));
    }

    let mut listing = SessionListing::default();
    let mut stack = vec![root.to_path_buf()];

    while let Some(current) = stack.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if current.as_path() != root => {
                let warning = format!("cannot read directory {}: {err}", current.display());
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    directory = %current.display(),
                    error = %err,
                    "skipping unreadable directory"
                );
                listing.warnings.push(warning);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    listing
                        .warnings
                        .push(format!("cannot list entry in {}: {err}", current.display()));
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    listing
                        .warnings
                        .push(format!("cannot stat {}: {err}", path.display()));
                    continue;
                }
            };
            if file_type.is_symlink() && path.is_dir() {
                #[cfg(feature = "tracing")]
                tracing::warn!(link = %path.display(), "not following symlinked directory");
                listing
                    .warnings
                    .push(format!("not following symlinked directory {}", path.display()));
                continue;
            }
            if file_type.is_dir() {
                let name = entry.file_name();
                if exclude.is_match(&name.to_string_lossy()) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(directory = %path.display(), "excluded directory");
                    continue;
                }
                stack.push(path);
            } else if let Some(relative) = relative_key(root, &path) {
                listing.files.insert(relative);
            }
        }
    }

    Ok(listing)
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>();
    (!parts.is_empty()).then(|| parts.join("/"))
}
