//! `$name` substitution templates

use std::collections::{BTreeSet, HashMap};

/// Slot filled with the variable that receives a statement template's result
pub const TARGET_SLOT: &str = "target";

/// Source-code template with `$name` slots
///
/// `$$` renders a literal dollar sign. A template that uses `$target` is a
/// statement block that assigns the node's variable itself; any other
/// template is an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionTemplate {
    text: String,
    slots: BTreeSet<String>,
}

enum Piece<'a> {
    Text(&'a str),
    Slot(&'a str),
    Dollar,
}

fn pieces(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        if i > start {
            pieces.push(Piece::Text(&text[start..i]));
        }
        if bytes.get(i + 1) == Some(&b'$') {
            pieces.push(Piece::Dollar);
            i += 2;
            start = i;
            continue;
        }
        let name_start = i + 1;
        let mut end = name_start;
        while end < bytes.len()
            && (bytes[end] == b'_'
                || bytes[end].is_ascii_alphanumeric() && (end > name_start || !bytes[end].is_ascii_digit()))
        {
            end += 1;
        }
        if end == name_start {
            pieces.push(Piece::Dollar);
        } else {
            pieces.push(Piece::Slot(&text[name_start..end]));
        }
        i = end.max(name_start);
        start = i;
    }
    if start < bytes.len() {
        pieces.push(Piece::Text(&text[start..]));
    }
    pieces
}

impl SubstitutionTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let slots = pieces(&text)
            .into_iter()
            .filter_map(|piece| match piece {
                Piece::Slot(name) => Some(name.to_string()),
                _ => None,
            })
            .collect();
        Self { text, slots }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Names of every slot used by the template
    pub fn slots(&self) -> &BTreeSet<String> {
        &self.slots
    }

    pub fn is_statement(&self) -> bool {
        self.slots.contains(TARGET_SLOT)
    }

    /// Slots that no name in `known` accounts for
    pub fn free_slots<'a>(&'a self, known: &BTreeSet<&str>) -> Vec<&'a str> {
        self.slots
            .iter()
            .map(String::as_str)
            .filter(|slot| *slot != TARGET_SLOT && !known.contains(slot))
            .collect()
    }

    /// Fills every slot; fails with the first slot that has no value
    pub fn render(&self, values: &HashMap<&str, String>) -> Result<String, String> {
        let mut out = String::with_capacity(self.text.len());
        for piece in pieces(&self.text) {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Dollar => out.push('$'),
                Piece::Slot(name) => {
                    let value = values
                        .get(name)
                        .ok_or_else(|| format!("no value for slot '${}'", name))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
