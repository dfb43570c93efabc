//! Text hygiene for note files: link syntax normalization, line-ending
//! cleanup, canonical header ordering.
//!
//! Everything here is a pure `String -> String` transformation; the CLI
//! decides whether to write the result back.

use crate::error::Result;
use crate::header;
use crate::note::Meta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Lf,
    Crlf,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextOptions {
    /// Wrap paragraph text at this column; 0 disables.
    pub wrap: usize,
    pub eol: Option<Eol>,
    pub strip_trailing: bool,
    pub ensure_final_eol: bool,
}

/// Normalize the inside of every `[[...]]` / `![[...]]`: trim whitespace
/// around the id, anchor and title parts. With `ids_only`, a title equal to
/// the bare id is dropped (`[[x|x]]` → `[[x]]`). Fenced and inline code
/// regions pass through untouched.
pub fn normalize_links(text: &str, ids_only: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if text[i..].starts_with("```") {
            let end = skip_fence(text, i);
            out.push_str(&text[i..end]);
            i = end;
        } else if bytes[i] == b'`' {
            let end = skip_inline_code(text, i);
            out.push_str(&text[i..end]);
            i = end;
        } else if text[i..].starts_with("![[") || text[i..].starts_with("[[") {
            let bang = text[i..].starts_with('!');
            let open = i + if bang { 3 } else { 2 };
            match text[open..].find("]]") {
                Some(rel_close) => {
                    let inner = &text[open..open + rel_close];
                    if bang {
                        out.push('!');
                    }
                    out.push_str("[[");
                    out.push_str(&normalize_inner(inner, ids_only));
                    out.push_str("]]");
                    i = open + rel_close + 2;
                }
                None => {
                    // Unclosed reference; emit the rest verbatim.
                    out.push_str(&text[i..]);
                    break;
                }
            }
        } else {
            let ch = text[i..].chars().next().expect("char at boundary");
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

/// Byte index just past a fenced code region starting at `start`.
fn skip_fence(text: &str, start: usize) -> usize {
    let mut i = start;
    let mut line_no = 0;
    while i < text.len() {
        let line_end = text[i..]
            .find('\n')
            .map(|n| i + n + 1)
            .unwrap_or(text.len());
        let line = &text[i..line_end];
        if line_no > 0 && line.trim_start().starts_with("```") {
            return line_end;
        }
        line_no += 1;
        i = line_end;
    }
    text.len()
}

/// Byte index just past an inline code span (matching backtick run).
fn skip_inline_code(text: &str, start: usize) -> usize {
    let open_len = text[start..].chars().take_while(|&c| c == '`').count();
    let mut i = start + open_len;
    while i < text.len() {
        if text[i..].starts_with('`') {
            let run = text[i..].chars().take_while(|&c| c == '`').count();
            i += run;
            if run == open_len {
                return i;
            }
        } else {
            i += text[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        }
    }
    text.len()
}

fn normalize_inner(inner: &str, ids_only: bool) -> String {
    let inner = inner.trim();

    let (rel_prefix, rest) = match inner.strip_prefix("rel:") {
        Some(rest) => match rest.split_once('|') {
            Some((rel, tail)) => (format!("rel:{}|", rel.trim()), tail),
            None => (String::new(), inner),
        },
        None => (String::new(), inner),
    };

    match rest.split_once('|') {
        None => format!("{rel_prefix}{}", clean_id_part(rest)),
        Some((id_part, title)) => {
            let id_part = clean_id_part(id_part);
            let title = title.trim();
            let bare_id = id_part.split('#').next().unwrap_or(&id_part);
            if ids_only && title == bare_id {
                format!("{rel_prefix}{id_part}")
            } else {
                format!("{rel_prefix}{id_part}|{title}")
            }
        }
    }
}

/// Trim whitespace around the id and anchor while keeping the `#` / `#^`
/// structure intact.
fn clean_id_part(id_part: &str) -> String {
    if let Some((id, label)) = id_part.split_once("#^") {
        format!("{}#^{}", id.trim(), label.trim())
    } else if let Some((id, slug)) = id_part.split_once('#') {
        format!("{}#{}", id.trim(), slug.trim())
    } else {
        id_part.trim().to_string()
    }
}

/// Line-level hygiene: EOL style, trailing whitespace, final newline,
/// optional paragraph wrap (fences, headings, lists, quotes, rules and
/// `$$` math blocks are never wrapped).
pub fn normalize_text(text: &str, opts: &TextOptions) -> String {
    let mut result = text.to_string();

    if opts.wrap > 0 {
        result = wrap_paragraphs(&result, opts.wrap);
    }

    if opts.eol.is_some() || opts.strip_trailing {
        let unix = result.replace("\r\n", "\n").replace('\r', "\n");
        let mut lines: Vec<String> = unix.split('\n').map(str::to_string).collect();
        if opts.strip_trailing {
            for line in &mut lines {
                *line = line.trim_end().to_string();
            }
        }
        result = lines.join("\n");
        if opts.eol == Some(Eol::Crlf) {
            result = result.replace('\n', "\r\n");
        }
    }

    if opts.ensure_final_eol && !result.is_empty() {
        let eol = if opts.eol == Some(Eol::Crlf) { "\r\n" } else { "\n" };
        if !result.ends_with('\n') {
            result.push_str(eol);
        }
    }
    result
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

fn is_unwrappable(line: &str) -> bool {
    let t = line.trim_start();
    t.is_empty()
        || t.starts_with("```")
        || t.starts_with('>')
        || t.starts_with("$$")
        || is_heading(line)
        || t.starts_with("- ")
        || t.starts_with("* ")
        || t.starts_with("+ ")
        || t.split_once('.')
            .is_some_and(|(n, rest)| n.chars().all(|c| c.is_ascii_digit()) && rest.starts_with(' '))
        || t.chars().all(|c| "-*_".contains(c)) && t.len() >= 3
}

fn wrap_paragraphs(text: &str, width: usize) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < lines.len() {
        let stripped = lines[i].trim_end_matches(['\n', '\r']);

        if stripped.trim_start().starts_with("```") {
            out.push_str(lines[i]);
            i += 1;
            while i < lines.len() {
                out.push_str(lines[i]);
                let done = lines[i].trim_start().starts_with("```");
                i += 1;
                if done {
                    break;
                }
            }
            continue;
        }
        if stripped.trim_start().starts_with("$$") {
            out.push_str(lines[i]);
            i += 1;
            while i < lines.len() {
                out.push_str(lines[i]);
                let done = lines[i].trim_start().starts_with("$$");
                i += 1;
                if done {
                    break;
                }
            }
            continue;
        }
        if is_unwrappable(stripped) {
            out.push_str(lines[i]);
            i += 1;
            continue;
        }

        // Paragraph: gather consecutive plain lines and refill.
        let mut words: Vec<&str> = Vec::new();
        while i < lines.len() {
            let s = lines[i].trim_end_matches(['\n', '\r']);
            if is_unwrappable(s) {
                break;
            }
            words.extend(s.split_whitespace());
            i += 1;
        }
        out.push_str(&fill(&words, width));
        out.push('\n');
    }
    out
}

/// Greedy fill; a word longer than the width gets its own line.
fn fill(words: &[&str], width: usize) -> String {
    let mut out = String::new();
    let mut col = 0;
    for word in words {
        if col == 0 {
            out.push_str(word);
            col = word.len();
        } else if col + 1 + word.len() <= width {
            out.push(' ');
            out.push_str(word);
            col += 1 + word.len();
        } else {
            out.push('\n');
            out.push_str(word);
            col = word.len();
        }
    }
    out
}

/// Rewrite the header with the id enforced from the filename and keys in
/// canonical order: `id`, `core/title`, `core/aliases`, then the rest in
/// original order. Bodies without a header gain one.
pub fn normalize_header(raw: &str, note_id: &str) -> Result<String> {
    let (meta, body) = header::decode(raw)?;

    let mut ordered = Meta::new();
    ordered.insert("id".into(), note_id.into());
    for key in ["core/title", "core/aliases"] {
        if let Some(v) = meta.get(key) {
            ordered.insert(key.into(), v.clone());
        }
    }
    for (k, v) in &meta {
        if ordered.contains_key(k) {
            continue;
        }
        ordered.insert(k.clone(), v.clone());
    }

    header::encode(&ordered, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_trimmed() {
        assert_eq!(normalize_links("[[ abc123 ]]", false), "[[abc123]]");
        assert_eq!(
            normalize_links("[[ abc123 # sec | Title ]]", false),
            "[[abc123#sec|Title]]"
        );
        assert_eq!(
            normalize_links("![[ abc123 #^ lem ]]", false),
            "![[abc123#^lem]]"
        );
    }

    #[test]
    fn ids_only_collapses_self_title() {
        assert_eq!(normalize_links("[[abc123|abc123]]", true), "[[abc123]]");
        assert_eq!(
            normalize_links("[[abc123|Other]]", true),
            "[[abc123|Other]]"
        );
    }

    #[test]
    fn code_regions_left_alone() {
        let text = "```\n[[ keep me ]]\n```\nand `[[ inline ]]` too [[ fix ]]\n";
        let out = normalize_links(text, false);
        assert!(out.contains("[[ keep me ]]"));
        assert!(out.contains("`[[ inline ]]`"));
        assert!(out.contains("[[fix]]"));
    }

    #[test]
    fn rel_prefix_preserved() {
        assert_eq!(
            normalize_links("[[rel: supports | abc123 | T ]]", false),
            "[[rel:supports|abc123|T]]"
        );
    }

    #[test]
    fn text_hygiene() {
        let opts = TextOptions {
            eol: Some(Eol::Lf),
            strip_trailing: true,
            ensure_final_eol: true,
            ..Default::default()
        };
        assert_eq!(normalize_text("a  \r\nb\r\nc", &opts), "a\nb\nc\n");
    }

    #[test]
    fn wrap_leaves_structure_alone() {
        let opts = TextOptions {
            wrap: 20,
            ..Default::default()
        };
        let text = "# A long heading that stays\n\nshort words that will need to wrap at twenty cols\n\n- a list item stays untouched as well\n";
        let out = normalize_text(text, &opts);
        assert!(out.contains("# A long heading that stays\n"));
        assert!(out.contains("- a list item stays untouched as well\n"));
        assert!(out
            .lines()
            .filter(|l| !l.starts_with(['#', '-']))
            .all(|l| l.len() <= 20));
    }

    #[test]
    fn header_canonical_order() {
        let raw = "---\nuser/topic: math\ncore/title: T\n---\nbody\n";
        let out = normalize_header(raw, "abc123").unwrap();
        let (meta, body) = crate::header::decode(&out).unwrap();
        let keys: Vec<_> = meta.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "core/title", "user/topic"]);
        assert_eq!(body, "body\n");
    }
}
