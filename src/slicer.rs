//! Anchor-resolved slicing: turn an anchor into a `(start, end)` character
//! range over the note body.
//!
//! `(0, 0)` together with a present anchor means "anchor not found"; the
//! whole-body case is only reachable with no anchor, so the sentinel is
//! unambiguous.

use crate::note::{Anchor, Block, BlockKind, Note};

/// First block carrying the given label, in source order.
pub fn find_label<'a>(note: &'a Note, label: &str) -> Option<&'a Block> {
    note.body
        .blocks
        .iter()
        .find(|b| b.label_name() == Some(label))
}

/// First heading block with the given slug, in source order.
pub fn find_heading_by_slug<'a>(note: &'a Note, slug: &str) -> Option<&'a Block> {
    note.body
        .blocks
        .iter()
        .find(|b| b.kind == BlockKind::Heading && b.heading_slug.as_deref() == Some(slug))
}

/// Heading scope: from the heading's start to the next heading of the same
/// or higher level, or to end of body.
fn slice_heading(note: &Note, heading: &Block) -> (usize, usize) {
    let Some(level) = heading.heading_level else {
        return (heading.range.start, heading.range.end);
    };

    let mut seen = false;
    for block in &note.body.blocks {
        if !seen {
            seen = std::ptr::eq(block, heading);
            continue;
        }
        if block.kind == BlockKind::Heading {
            if let Some(l) = block.heading_level {
                if l <= level {
                    return (heading.range.start, block.range.start);
                }
            }
        }
    }
    (heading.range.start, note.body.char_len())
}

/// Labelled-block scope: headings get the heading rule, everything else its
/// exact range.
fn slice_block(note: &Note, block: &Block) -> (usize, usize) {
    match block.kind {
        BlockKind::Heading => slice_heading(note, block),
        _ => (block.range.start, block.range.end),
    }
}

/// Resolve an optional anchor to a half-open char range over `body.raw`.
pub fn slice_by_anchor(note: &Note, anchor: Option<&Anchor>) -> (usize, usize) {
    match anchor {
        None => (0, note.body.char_len()),
        Some(Anchor::Block { label }) => match find_label(note, label) {
            Some(block) => slice_block(note, block),
            None => (0, 0),
        },
        Some(Anchor::Heading { slug }) => match find_heading_by_slug(note, slug) {
            Some(block) => slice_heading(note, block),
            None => (0, 0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{Meta, Range};
    use crate::parser;

    fn note(body: &str) -> Note {
        let id = "abcdef012345".to_string();
        Note {
            body: parser::parse(body, &id),
            id,
            meta: Meta::new(),
        }
    }

    #[test]
    fn no_anchor_is_whole_body() {
        let n = note("# A\n\ntext\n");
        assert_eq!(slice_by_anchor(&n, None), (0, n.body.char_len()));
    }

    #[test]
    fn heading_scope_ends_at_same_level() {
        let n = note("# A\n\ntext\n## B\n\nbody\n## C\n\nmore\n");
        let anchor = Anchor::Heading { slug: "b".into() };
        let (start, end) = slice_by_anchor(&n, Some(&anchor));
        assert_eq!(Range::new(start, end).slice(&n.body.raw), "## B\n\nbody\n");
    }

    #[test]
    fn heading_scope_skips_deeper_headings() {
        let n = note("## B\n\n### deeper\n\nx\n## C\n");
        let anchor = Anchor::Heading { slug: "b".into() };
        let (start, end) = slice_by_anchor(&n, Some(&anchor));
        assert_eq!(
            Range::new(start, end).slice(&n.body.raw),
            "## B\n\n### deeper\n\nx\n"
        );
    }

    #[test]
    fn heading_at_eof_without_newline() {
        let n = note("# A\n\ntext\n## Last");
        let anchor = Anchor::Heading { slug: "last".into() };
        let (start, end) = slice_by_anchor(&n, Some(&anchor));
        assert_eq!(end, n.body.char_len());
        assert_eq!(Range::new(start, end).slice(&n.body.raw), "## Last");
    }

    #[test]
    fn labelled_fence_slices_exactly() {
        let n = note("# T\n\n```py ^code\ndef f():\n pass\n```\n\ntail\n");
        let anchor = Anchor::Block {
            label: "code".into(),
        };
        let (start, end) = slice_by_anchor(&n, Some(&anchor));
        assert_eq!(
            Range::new(start, end).slice(&n.body.raw),
            "```py ^code\ndef f():\n pass\n```\n"
        );
    }

    #[test]
    fn labelled_heading_uses_heading_scope() {
        let n = note("## Section ^sec\n\nbody\n## Next\n");
        let anchor = Anchor::Block { label: "sec".into() };
        let (start, end) = slice_by_anchor(&n, Some(&anchor));
        assert_eq!(
            Range::new(start, end).slice(&n.body.raw),
            "## Section ^sec\n\nbody\n"
        );
    }

    #[test]
    fn missing_anchor_is_empty_sentinel() {
        let n = note("# A\n\ntext\n");
        let anchor = Anchor::Block {
            label: "nope".into(),
        };
        assert_eq!(slice_by_anchor(&n, Some(&anchor)), (0, 0));
        let anchor = Anchor::Heading { slug: "nope".into() };
        assert_eq!(slice_by_anchor(&n, Some(&anchor)), (0, 0));
    }

    #[test]
    fn duplicate_label_resolves_to_first() {
        let n = note("```x ^dup\na\n```\n\n```y ^dup\nb\n```\n");
        let anchor = Anchor::Block { label: "dup".into() };
        let (start, end) = slice_by_anchor(&n, Some(&anchor));
        assert!(Range::new(start, end).slice(&n.body.raw).contains("```x ^dup"));
    }
}
