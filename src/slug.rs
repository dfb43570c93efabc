//! Heading slugs and note identity.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("id regex"));

/// Check that `id` is a well-formed note id (filename stem charset).
pub fn is_valid_id(id: &str) -> bool {
    ID_RE.is_match(id)
}

/// Generate a fresh random id: `nbytes` random bytes rendered lowercase hex.
///
/// The default of 6 bytes yields 12-character ids.
pub fn new_id(nbytes: usize) -> String {
    let mut buf = vec![0u8; nbytes];
    rand::rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Canonicalize heading text into an anchor slug.
///
/// Lowercase, map en/em/minus dashes to `-`, NFKD-normalize and drop
/// combining marks, keep alphanumerics/whitespace/`-`, turn whitespace runs
/// into single `-`, collapse `-` runs, trim `-`. Idempotent on non-empty
/// outputs.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();

    let mut filtered = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        let c = match c {
            '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            c => c,
        };
        for n in c.nfkd() {
            if is_combining_mark(n) {
                continue;
            }
            // Compatibility decompositions can reintroduce uppercase
            // ("\u{213b}" expands to "FAX"); lowercase again so the
            // function stays idempotent.
            for low in n.to_lowercase() {
                if low.is_alphanumeric() || low == '-' {
                    filtered.push(low);
                } else if low.is_whitespace() {
                    filtered.push(' ');
                }
            }
        }
    }

    let mut out = String::with_capacity(filtered.len());
    let mut pending_sep = false;
    for c in filtered.chars() {
        if c == ' ' || c == '-' {
            pending_sep = !out.is_empty();
        } else {
            if pending_sep {
                out.push('-');
                pending_sep = false;
            }
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_basics() {
        assert_eq!(slugify("Parallel transport"), "parallel-transport");
        assert_eq!(
            slugify("Riemann\u{2013}Christoffel symbols"),
            "riemann-christoffel-symbols"
        );
        assert_eq!(slugify("C++ Programming"), "c-programming");
        assert_eq!(slugify("Node.js"), "nodejs");
    }

    #[test]
    fn slug_diacritics_folded() {
        assert_eq!(slugify("Schr\u{f6}dinger"), "schrodinger");
        assert_eq!(slugify("na\u{ef}ve \u{e9}tude"), "naive-etude");
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slugify("  a   b -- c  "), "a-b-c");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn slug_idempotent() {
        for s in ["Riemann\u{2013}Christoffel", "C++ Programming", "a  b"] {
            let once = slugify(s);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn id_charset() {
        assert!(is_valid_id("a1b2c3d4e5f6"));
        assert!(is_valid_id("notes_2024-01"));
        assert!(!is_valid_id("has space"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("dot.md"));
    }

    #[test]
    fn new_id_is_hex_of_expected_length() {
        let id = new_id(6);
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_valid_id(&id));
    }
}
