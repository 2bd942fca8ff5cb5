//! Per-file unified diff splitting.

/// Prefix of the line that begins a per-file section in unified diff output.
const FILE_HEADER_PREFIX: &str = "diff --git ";

/// Separator between the old and new path in a `diff --git` header.
const NEW_PATH_SEPARATOR: &str = " b/";

/// One file's slice of a staged diff, the unit of concurrent analysis.
///
/// Units are produced once by [`split_diff`] and never mutated afterwards.
/// Their position in the returned `Vec` is the file's declaration order in
/// the source diff; later stages index per-unit bookkeeping by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffUnit {
    /// Path of the file, taken from the `b/` side of the header.
    pub path: String,
    /// Raw text of this file's diff (header and all hunks), without the
    /// trailing newline.
    pub patch_text: String,
}

/// Splits a flat unified diff at `diff --git ` line boundaries.
///
/// Returns one [`DiffUnit`] per file header, in header order. Content
/// before the first header is dropped, so an empty input or one without
/// any header yields an empty `Vec`. A single trailing newline is removed
/// from every unit; joining the units' text with `"\n"` reproduces the
/// input up to one trailing newline.
pub fn split_diff(diff: &str) -> Vec<DiffUnit> {
    let mut positions = Vec::new();

    if diff.starts_with(FILE_HEADER_PREFIX) {
        positions.push(0);
    }
    let search = format!("\n{FILE_HEADER_PREFIX}");
    let mut start = 0;
    while let Some(pos) = diff[start..].find(&search) {
        // +1 skips the newline; the section starts at `diff`.
        positions.push(start + pos + 1);
        start = start + pos + 1;
    }

    positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| {
            let end = positions.get(i + 1).copied().unwrap_or(diff.len());
            let section = &diff[pos..end];
            let header = section.lines().next().unwrap_or_default();
            DiffUnit {
                path: extract_path_from_header(header),
                patch_text: section.strip_suffix('\n').unwrap_or(section).to_string(),
            }
        })
        .collect()
}

/// Extracts the file path from a `diff --git a/<path> b/<path>` header.
///
/// Takes everything after the first `" b/"`, which keeps paths containing
/// spaces intact. Falls back to the `a/` token when there is no `b/` side.
fn extract_path_from_header(header: &str) -> String {
    let rest = header.strip_prefix(FILE_HEADER_PREFIX).unwrap_or(header);

    if let Some((_, new_path)) = rest.split_once(NEW_PATH_SEPARATOR) {
        return new_path.to_string();
    }

    if let Some(old) = rest.strip_prefix("a/") {
        return old.split(' ').next().unwrap_or(old).to_string();
    }

    rest.to_string()
}
