// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Stem used when nothing usable survives sanitization
pub const PLACEHOLDER_STEM: &str = "untitled";

/// Check if a character may appear in a sanitized stem (whitelist approach)
fn is_valid_stem_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_')
}

/// Map an arbitrary file name onto a safe, stable key
///
/// The stem is lower-cased, every character outside `[a-z0-9_-]` becomes `_`,
/// runs of `_` collapse into one and leading/trailing `_` are stripped. The
/// extension is kept and lower-cased on its own. Sanitizing an already
/// sanitized name returns it unchanged.
pub fn sanitize_filename(name: &str) -> String {
    let (stem, ext) = split_extension(name);
    let sanitized = sanitize_stem(stem);

    match ext {
        Some(ext) => format!("{}.{}", sanitized, ext.to_ascii_lowercase()),
        None => sanitized,
    }
}

/// Return the part of a file name before its extension
pub fn stem_of(filename: &str) -> &str {
    split_extension(filename).0
}

/// Split at the last dot, but only when both sides look like stem and extension
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, Some(ext))
        }
        _ => (name, None),
    }
}

fn sanitize_stem(stem: &str) -> String {
    let replaced: String = stem
        .to_lowercase()
        .chars()
        .map(|c| if is_valid_stem_char(c) { c } else { '_' })
        .collect();

    let collapsed = collapse_underscores(&replaced);
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        PLACEHOLDER_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Collapse runs of underscores into a single underscore
fn collapse_underscores(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_underscore = false;

    for c in s.chars() {
        if c == '_' {
            if !last_was_underscore {
                result.push(c);
            }
            last_was_underscore = true;
        } else {
            result.push(c);
            last_was_underscore = false;
        }
    }

    result
}
