//! Slug and title derivation.
//!
//! Converts post titles to URL-safe slugs and reverses filenames back into
//! human-readable titles for files that arrive without front matter.

use std::path::Path;

/// Convert a title to a URL-safe slug.
///
/// Unicode is ASCII-folded first, then any run of non-alphanumeric
/// characters collapses to a single hyphen. Leading/trailing hyphens are
/// trimmed so `" Hello,  World! "` becomes `hello-world`.
pub fn slugify(title: &str) -> String {
    let folded = deunicode::deunicode(title).to_lowercase();

    let mut slug = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Derive a display title from a filename.
///
/// Strips the extension, replaces hyphens and underscores with spaces and
/// capitalizes each word: `my-first-post.md` becomes `My First Post`.
pub fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    stem.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Filename stem with the extension stripped, used as the slug for files
/// removed from a watched directory.
pub fn slug_from_filename(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Uppercase the first character of a word.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
