//! Name-based catalog lookup.
//!
//! Names coming back from OCR or the secondary recognizer rarely match the
//! catalog byte for byte ("The Beatles" vs "Beatles", "Abbey Road" vs
//! "Abbey Road (Remastered)"), so both sides are normalized before comparing
//! and a substring fallback is tried when the exact comparison fails.

use super::CatalogEntry;

/// Normalize an artist or album name for comparison.
///
/// Lowercases, strips a leading "the ", drops punctuation (keeping letters,
/// digits, `-` and `_`) and collapses whitespace.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let without_article = strip_leading_article(&lowered);

    let kept: String = without_article
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_leading_article(name: &str) -> &str {
    match name.strip_prefix("the") {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => name,
    }
}

/// Exact normalized equality, else containment in either direction.
fn field_matches(query: Option<&str>, candidate: &str) -> bool {
    let Some(query) = query else {
        return true;
    };
    if query == candidate {
        return true;
    }
    // An empty side would be contained in everything.
    if query.is_empty() || candidate.is_empty() {
        return false;
    }
    candidate.contains(query) || query.contains(candidate)
}

/// Filter `entries` by artist and album name.
///
/// Omitted (or blank) fields match everything; with both omitted the whole
/// slice is returned.
pub fn search_entries(
    entries: &[CatalogEntry],
    artist: Option<&str>,
    album: Option<&str>,
) -> Vec<CatalogEntry> {
    let artist = artist.filter(|a| !a.trim().is_empty()).map(normalize_name);
    let album = album.filter(|a| !a.trim().is_empty()).map(normalize_name);

    if artist.is_none() && album.is_none() {
        return entries.to_vec();
    }

    entries
        .iter()
        .filter(|entry| {
            field_matches(artist.as_deref(), &normalize_name(&entry.artist))
                && field_matches(album.as_deref(), &normalize_name(&entry.title))
        })
        .cloned()
        .collect()
}
