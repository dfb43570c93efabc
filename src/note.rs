//! Note model: blocks, anchors, links, transclusions.
//!
//! All offsets are **character** offsets into the post-header body. Byte
//! positions exist only transiently inside the parser and at slicing
//! boundaries (`Range::slice`).

use serde::{Deserialize, Serialize};

/// Opaque note identifier; the filename stem is authoritative.
pub type NoteId = String;

/// Half-open character range into a note body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Range { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Extract the substring this character range covers.
    ///
    /// This is the one place char offsets meet the underlying UTF-8 buffer;
    /// everything else stays in character space.
    pub fn slice<'a>(&self, raw: &'a str) -> &'a str {
        if self.is_empty() {
            return "";
        }
        let mut byte_start = raw.len();
        let mut byte_end = raw.len();
        for (chars, (bytes, _)) in raw.char_indices().enumerate() {
            if chars == self.start {
                byte_start = bytes;
            }
            if chars == self.end {
                byte_end = bytes;
                break;
            }
        }
        if self.start == 0 {
            byte_start = 0;
        }
        &raw[byte_start..byte_end]
    }
}

/// Addressable sub-span of a note: a heading slug or a block label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Anchor {
    Heading { slug: String },
    Block { label: String },
}

impl Anchor {
    /// Parse the `#`-suffix of a note reference: `^label` is a block
    /// anchor, anything else a heading slug.
    pub fn from_ref(s: &str) -> Anchor {
        match s.strip_prefix('^') {
            Some(label) => Anchor::Block {
                label: label.to_string(),
            },
            None => Anchor::Heading {
                slug: s.to_string(),
            },
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Anchor::Heading { slug } => slug,
            Anchor::Block { label } => label,
        }
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anchor::Heading { slug } => write!(f, "{slug}"),
            Anchor::Block { label } => write!(f, "^{label}"),
        }
    }
}

/// Label attached to a block via a `^name` token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLabel {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading,
    Fence,
    Paragraph,
    List,
    Media,
    Other,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Heading => "heading",
            BlockKind::Fence => "fence",
            BlockKind::Paragraph => "paragraph",
            BlockKind::List => "list",
            BlockKind::Media => "media",
            BlockKind::Other => "other",
        }
    }
}

impl std::str::FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heading" => Ok(BlockKind::Heading),
            "fence" => Ok(BlockKind::Fence),
            "paragraph" => Ok(BlockKind::Paragraph),
            "list" => Ok(BlockKind::List),
            "media" => Ok(BlockKind::Media),
            "other" => Ok(BlockKind::Other),
            other => Err(format!("unknown block kind '{other}'")),
        }
    }
}

/// Structural span of the body.
///
/// For headings `heading_level` is 1..=6 and `heading_slug` is the slug of
/// `heading_text` (label token already stripped). For fences `fence_info`
/// carries the opening line's text after the backticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub range: Range,
    pub label: Option<BlockLabel>,
    pub heading_text: Option<String>,
    pub heading_level: Option<u8>,
    pub heading_slug: Option<String>,
    pub fence_info: Option<String>,
}

impl Block {
    pub fn label_name(&self) -> Option<&str> {
        self.label.as_ref().map(|l| l.name.as_str())
    }
}

/// Target of a link or transclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub id: NoteId,
    pub anchor: Option<Anchor>,
    /// Purely descriptive relation tag (`[[rel:r|id|Title]]`).
    pub rel: Option<String>,
    pub title_text: Option<String>,
}

impl LinkTarget {
    pub fn to_id(id: impl Into<NoteId>) -> Self {
        LinkTarget {
            id: id.into(),
            anchor: None,
            rel: None,
            title_text: None,
        }
    }
}

/// Wiki-style reference from one note to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: NoteId,
    pub target: LinkTarget,
    pub range: Range,
}

/// `![[...]]` reference that substitutes the target's slice in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transclusion {
    pub target: LinkTarget,
    pub range: Range,
}

/// Parsed body: raw text (post-header) plus derived structure, all in
/// source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteBody {
    pub raw: String,
    pub blocks: Vec<Block>,
    pub links: Vec<Link>,
    pub transclusions: Vec<Transclusion>,
}

impl NoteBody {
    /// Body length in characters; the unit every `Range` is measured in.
    pub fn char_len(&self) -> usize {
        self.raw.chars().count()
    }
}

/// Header metadata: ordered, namespaced keys (`core/title`, `core/aliases`).
///
/// Iteration order is insertion order so re-encoding a note does not churn
/// the header.
pub type Meta = serde_yaml::Mapping;

/// One note: id, header metadata, parsed body.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: NoteId,
    pub meta: Meta,
    pub body: NoteBody,
}

impl Note {
    /// String lookup in the header, `None` for absent or non-string values.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| v.as_str())
    }

    /// The `core/aliases` list, if present and list-typed.
    pub fn aliases(&self) -> Vec<String> {
        match self.meta.get("core/aliases") {
            Some(serde_yaml::Value::Sequence(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}
