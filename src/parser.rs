//! Single-pass body parser: blocks, links, transclusions.
//!
//! Emitted ranges are character offsets into the body (post-header). The
//! byte offsets produced by line scanning and regex matching are translated
//! through a per-parse `CharMap` before anything leaves this module.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::note::{
    Anchor, Block, BlockKind, BlockLabel, Link, LinkTarget, NoteBody, NoteId, Range, Transclusion,
};
use crate::slug::slugify;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("heading regex"));
static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\^[A-Za-z0-9_-]+$").expect("label regex"));
// One scan finds both forms; the optional `!` decides which list the match
// lands in, so `![[x]]` is never double-counted as a link.
static WIKIREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(!?)\[\[([^\[\]]+?)\]\]").expect("wikiref regex"));

/// Byte offset → char offset translation for one body.
struct CharMap {
    starts: Vec<usize>,
}

impl CharMap {
    fn new(text: &str) -> Self {
        CharMap {
            starts: text.char_indices().map(|(b, _)| b).collect(),
        }
    }

    /// Char offset of a byte position lying on a char boundary (or EOF).
    fn char_at(&self, byte: usize) -> usize {
        self.starts.partition_point(|&b| b < byte)
    }
}

/// Parse body text into blocks, links and transclusions, in source order.
pub fn parse(text: &str, id: &NoteId) -> NoteBody {
    let map = CharMap::new(text);

    let mut body = NoteBody {
        raw: text.to_string(),
        ..Default::default()
    };

    scan_blocks(text, &map, &mut body.blocks);
    scan_refs(text, &map, id, &mut body.links, &mut body.transclusions);
    body
}

struct OpenFence {
    byte_start: usize,
    info: String,
    label: Option<BlockLabel>,
}

fn scan_blocks(text: &str, map: &CharMap, blocks: &mut Vec<Block>) {
    let mut offset = 0usize;
    let mut fence: Option<OpenFence> = None;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let lead = content.trim_start();

        if lead.starts_with("```") {
            match fence.take() {
                Some(open) => {
                    blocks.push(fence_block(&open, map, offset + line.len()));
                }
                None => {
                    let info = lead.trim_start_matches('`').trim().to_string();
                    let label = fence_label(&info);
                    fence = Some(OpenFence {
                        byte_start: offset,
                        info,
                        label,
                    });
                }
            }
        } else if fence.is_none() {
            if let Some(caps) = HEADING_RE.captures(content) {
                blocks.push(heading_block(&caps, map, offset, offset + line.len()));
            }
        }

        offset += line.len();
    }
    // An unterminated fence never becomes a block; the lines it swallowed
    // stay structureless.
}

fn fence_block(open: &OpenFence, map: &CharMap, byte_end: usize) -> Block {
    Block {
        kind: BlockKind::Fence,
        range: Range::new(map.char_at(open.byte_start), map.char_at(byte_end)),
        label: open.label.clone(),
        heading_text: None,
        heading_level: None,
        heading_slug: None,
        fence_info: Some(open.info.clone()),
    }
}

/// First whitespace-delimited `^token` in the info string names the fence.
fn fence_label(info: &str) -> Option<BlockLabel> {
    info.split_whitespace()
        .find(|tok| LABEL_RE.is_match(tok))
        .map(|tok| BlockLabel {
            name: tok[1..].to_string(),
        })
}

fn heading_block(caps: &regex::Captures<'_>, map: &CharMap, byte_start: usize, byte_end: usize) -> Block {
    let level = caps[1].len() as u8;
    let mut text = caps[2].trim_end().to_string();

    // A trailing whitespace-delimited `^label` token labels the heading and
    // is not part of the slugged text.
    let mut label = None;
    if let Some(tail) = text.split_whitespace().last() {
        if LABEL_RE.is_match(tail) {
            label = Some(BlockLabel {
                name: tail[1..].to_string(),
            });
            text = text[..text.len() - tail.len()].trim_end().to_string();
        }
    }

    let slug = slugify(&text);
    Block {
        kind: BlockKind::Heading,
        range: Range::new(map.char_at(byte_start), map.char_at(byte_end)),
        label,
        heading_text: Some(text),
        heading_level: Some(level),
        heading_slug: Some(slug),
        fence_info: None,
    }
}

fn scan_refs(
    text: &str,
    map: &CharMap,
    id: &NoteId,
    links: &mut Vec<Link>,
    transclusions: &mut Vec<Transclusion>,
) {
    for caps in WIKIREF_RE.captures_iter(text) {
        let whole = caps.get(0).expect("match");
        let range = Range::new(map.char_at(whole.start()), map.char_at(whole.end()));
        let target = parse_target(&caps[2]);

        if caps[1].is_empty() {
            links.push(Link {
                source: id.clone(),
                target,
                range,
            });
        } else {
            transclusions.push(Transclusion { target, range });
        }
    }
}

/// Parse the inner spec of a wiki reference.
///
/// Grammar: `rel:<r>|<id>|<title>`, `<id>|<title>`, or bare `<id>`, where
/// `<id>` may carry `#slug` or `#^label`.
pub fn parse_target(spec: &str) -> LinkTarget {
    let spec = spec.trim();

    let (rel, core, title) = if let Some(rest) = spec.strip_prefix("rel:") {
        let mut parts = rest.splitn(3, '|');
        let rel = parts.next().unwrap_or_default().trim().to_string();
        match (parts.next(), parts.next()) {
            (Some(core), title) => (Some(rel), core, title),
            // `rel:` with no target part; treat the whole spec as an id.
            (None, _) => (None, spec, None),
        }
    } else {
        let mut parts = spec.splitn(2, '|');
        let core = parts.next().unwrap_or_default();
        (None, core, parts.next())
    };

    let core = core.trim();
    let (id, anchor) = if let Some((id, label)) = core.split_once("#^") {
        (
            id.trim(),
            Some(Anchor::Block {
                label: label.trim().to_string(),
            }),
        )
    } else if let Some((id, slug)) = core.split_once('#') {
        (
            id.trim(),
            Some(Anchor::Heading {
                slug: slug.trim().to_string(),
            }),
        )
    } else {
        (core, None)
    };

    LinkTarget {
        id: id.to_string(),
        anchor,
        rel,
        title_text: title.map(|t| t.trim().to_string()),
    }
}
