//! Front matter: the optional metadata block at the top of a document.
//!
//! Two fences are recognised, both of which must open on the first line:
//!
//! ```text
//! ---                      +++
//! title: Hello             title = "Hello"
//! date: 2021-03-01         date = 2021-03-01
//! tags: [rust, notes]      [taxonomies]
//! ---                      tags = ["rust", "notes"]
//!                          +++
//! ```
//!
//! The TOML form also accepts a top-level `tags` array. Parsing is
//! best-effort: a block that does not decode yields no metadata.

use serde::{Deserialize, Serialize};

/// Metadata carried alongside a document. Passed through, never interpreted
/// by the reconciliation engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Which fence opened the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fence {
    Yaml,
    Toml,
}

impl Fence {
    fn marker(self) -> &'static str {
        match self {
            Fence::Yaml => "---",
            Fence::Toml => "+++",
        }
    }
}

/// A document split at its front-matter fence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<'a> {
    /// Decoded metadata; `None` when there is no block or it is malformed.
    pub front_matter: Option<FrontMatter>,
    /// Text after the closing fence, or the whole input when there is no block.
    pub body: &'a str,
}

/// Split `text` into metadata and body.
pub fn parse(text: &str) -> Parsed<'_> {
    let Some((fence, block, body)) = split(text) else {
        return Parsed {
            front_matter: None,
            body: text,
        };
    };

    let front_matter = match fence {
        Fence::Yaml => decode_yaml(block),
        Fence::Toml => decode_toml(block),
    };
    if front_matter.is_none() {
        tracing::debug!(fence = fence.marker(), "ignoring undecodable front matter");
    }

    Parsed { front_matter, body }
}

/// Locate a fenced block at the start of `text`.
///
/// Returns the fence kind, the raw block between the fences, and the rest of
/// the document. An opening fence with no closing fence is not a block.
pub fn split(text: &str) -> Option<(Fence, &str, &str)> {
    let text_start = text.strip_prefix('\u{feff}').unwrap_or(text);
    let offset = text.len() - text_start.len();

    let mut lines = text_start.split_inclusive('\n');
    let first = lines.next()?;
    let fence = match first.trim_end() {
        "---" => Fence::Yaml,
        "+++" => Fence::Toml,
        _ => return None,
    };

    let block_start = offset + first.len();
    let mut cursor = block_start;
    for line in lines {
        if line.trim_end() == fence.marker() {
            let block = &text[block_start..cursor];
            let body = &text[cursor + line.len()..];
            return Some((fence, block, body));
        }
        cursor += line.len();
    }
    None
}

fn decode_yaml(block: &str) -> Option<FrontMatter> {
    let value: serde_yaml::Value = serde_yaml::from_str(block).ok()?;
    let map = value.as_mapping()?;

    let field = |name: &str| map.get(name);
    let title = field("title").and_then(yaml_scalar);
    let date = field("date").and_then(yaml_scalar);
    let tags = match field("tags") {
        Some(serde_yaml::Value::Sequence(items)) => items.iter().filter_map(yaml_scalar).collect(),
        Some(single) => yaml_scalar(single).into_iter().collect(),
        None => Vec::new(),
    };

    Some(FrontMatter { title, date, tags })
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decode_toml(block: &str) -> Option<FrontMatter> {
    let table: toml::Table = block.parse().ok()?;

    let title = table.get("title").and_then(toml_scalar);
    let date = table.get("date").and_then(toml_scalar);
    let tags = table
        .get("tags")
        .or_else(|| table.get("taxonomies").and_then(|t| t.get("tags")))
        .and_then(toml::Value::as_array)
        .map(|items| items.iter().filter_map(toml_scalar).collect())
        .unwrap_or_default();

    Some(FrontMatter { title, date, tags })
}

fn toml_scalar(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(dt) => Some(dt.to_string()),
        _ => None,
    }
}
