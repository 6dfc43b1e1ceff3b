//! Element selectors
//!
//! The subset of CSS selectors used for element discovery: compound
//! selectors built from tag, `#id`, `.class`, `[attr]` and `*`, optionally
//! grouped with commas. Combinators are not supported.

use crate::ElementData;

/// Simple selector for matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Tag(String),
    Class(String),
    Id(String),
    Attribute(String),
    Universal,
}

impl SimpleSelector {
    pub fn matches(&self, element: &ElementData) -> bool {
        match self {
            Self::Universal => true,
            Self::Tag(tag) => element.tag.eq_ignore_ascii_case(tag),
            Self::Id(id) => element.id() == Some(id.as_str()),
            Self::Class(class) => element.has_class(class),
            Self::Attribute(name) => element.attrs.has_attribute(name),
        }
    }
}

/// Compound selector: every part must match the same element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundSelector {
    parts: Vec<SimpleSelector>,
}

impl CompoundSelector {
    /// `.name`
    pub fn class(name: &str) -> Self {
        Self {
            parts: vec![SimpleSelector::Class(name.to_string())],
        }
    }

    /// Parse one compound selector such as `img.lazy-load[data-src]`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.contains(char::is_whitespace) {
            return None;
        }

        let mut parts = Vec::new();
        let mut rest = s;
        while !rest.is_empty() {
            let (part, tail) = if let Some(tail) = rest.strip_prefix('*') {
                (SimpleSelector::Universal, tail)
            } else if let Some(tail) = rest.strip_prefix('.') {
                let (name, tail) = split_ident(tail)?;
                (SimpleSelector::Class(name.to_string()), tail)
            } else if let Some(tail) = rest.strip_prefix('#') {
                let (name, tail) = split_ident(tail)?;
                (SimpleSelector::Id(name.to_string()), tail)
            } else if let Some(tail) = rest.strip_prefix('[') {
                let end = tail.find(']')?;
                let name = tail[..end].trim();
                if name.is_empty() {
                    return None;
                }
                (SimpleSelector::Attribute(name.to_ascii_lowercase()), &tail[end + 1..])
            } else if parts.is_empty() {
                let (name, tail) = split_ident(rest)?;
                (SimpleSelector::Tag(name.to_ascii_lowercase()), tail)
            } else {
                return None;
            };
            parts.push(part);
            rest = tail;
        }

        Some(Self { parts })
    }

    /// Parse a comma-separated selector list
    pub fn parse_list(s: &str) -> Option<Vec<Self>> {
        s.split(',').map(Self::parse).collect()
    }

    pub fn matches(&self, element: &ElementData) -> bool {
        self.parts.iter().all(|p| p.matches(element))
    }

    pub fn parts(&self) -> &[SimpleSelector] {
        &self.parts
    }
}

fn split_ident(s: &str) -> Option<(&str, &str)> {
    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some((&s[..end], &s[end..]))
    }
}
