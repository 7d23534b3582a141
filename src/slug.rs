//! Slug derivation from post titles

/// Derive a URL-safe slug from a title.
///
/// Deterministic and non-randomized: lowercase, spaces and slashes become
/// hyphens, quoting and sentence punctuation is stripped, `&` becomes `and`.
/// Collisions against existing slugs are not checked here; the store's save
/// path rejects a slug already owned by another document.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.trim().to_lowercase().chars() {
        match c {
            ' ' | '/' | '\\' => out.push('-'),
            '&' => out.push_str("and"),
            '\'' | '"' | '?' | '!' | '.' | ',' | ';' | ':' => {}
            _ => out.push(c),
        }
    }
    out
}
