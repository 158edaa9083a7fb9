//! Pure helpers for deriving safe file and directory names.

use std::path::{Component, Path};

use crate::settings::SEPARATOR;

/// Longest single path component most filesystems accept.
const MAX_COMPONENT_LEN: usize = 255;

/// Longest full path accepted (Linux `PATH_MAX`).
const MAX_PATH_LEN: usize = 4096;

#[cfg(windows)]
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
#[cfg(not(windows))]
const RESERVED_CHARS: &[char] = &[];

/// Check whether `path` could name a directory on this platform.
///
/// Every component is checked for length and reserved characters; components
/// need not exist. A path that points at an existing regular file is not a
/// valid directory name.
pub fn is_valid_directory_name(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let text = path.to_string_lossy();
    if text.is_empty() || text.len() > MAX_PATH_LEN || text.contains('\0') {
        return false;
    }
    if path.is_file() {
        return false;
    }

    path.components().all(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            !part.is_empty()
                && part.len() <= MAX_COMPONENT_LEN
                && !part.contains(RESERVED_CHARS)
        }
        _ => true,
    })
}

/// Replace every ASCII punctuation character with [`SEPARATOR`] and lower-case the rest.
pub fn strip_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_punctuation() {
                SEPARATOR
            } else {
                c
            }
        })
        .collect::<String>()
        .to_lowercase()
}
