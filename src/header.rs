//! Header codec: the optional `---`-delimited YAML block at the top of a
//! note file.
//!
//! Decoding never requires a schema; whatever keys the user wrote are
//! mirrored back on encode, in insertion order.

use crate::error::{Error, Result};
use crate::note::Meta;

/// Split a note file into `(meta, body)`.
///
/// No opening `---` on the first line means an empty header and the whole
/// text as body. An opening delimiter without a closing one is
/// `MalformedHeader`; a header region that is not a YAML mapping is
/// `InvalidHeaderValue`. The closing delimiter line and its newline belong
/// to neither half.
pub fn decode(text: &str) -> Result<(Meta, String)> {
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok((Meta::new(), String::new()));
    };
    if first.trim() != "---" {
        return Ok((Meta::new(), text.to_string()));
    }

    let mut offset = first.len();
    let mut header_end = None;
    for line in lines {
        if line.trim() == "---" {
            header_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let Some((header_end, body_start)) = header_end else {
        return Err(Error::MalformedHeader);
    };

    let header_region = &text[first.len()..header_end];
    let meta = parse_header(header_region)?;
    Ok((meta, text[body_start..].to_string()))
}

fn parse_header(region: &str) -> Result<Meta> {
    if region.trim().is_empty() {
        return Ok(Meta::new());
    }
    match serde_yaml::from_str::<serde_yaml::Value>(region) {
        Ok(serde_yaml::Value::Mapping(m)) => Ok(m),
        Ok(serde_yaml::Value::Null) => Ok(Meta::new()),
        Ok(other) => Err(Error::InvalidHeaderValue(format!(
            "expected a mapping, got {}",
            value_kind(&other)
        ))),
        Err(e) => Err(Error::InvalidHeaderValue(e.to_string())),
    }
}

fn value_kind(v: &serde_yaml::Value) -> &'static str {
    match v {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a bool",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

/// Inverse of [`decode`]: header (if any) followed by the body, key order
/// preserved.
pub fn encode(meta: &Meta, body: &str) -> Result<String> {
    if meta.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(meta).map_err(|e| Error::InvalidHeaderValue(e.to_string()))?;
    Ok(format!("---\n{yaml}---\n{body}"))
}
