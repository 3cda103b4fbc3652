//! Colour indices of node-pack categories

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ValidationError;
use crate::literal::Value;

/// Maps `(pack, category)` to a colour index in `[0, size)`
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPalette {
    size: usize,
    indices: BTreeMap<(String, String), usize>,
}

impl CategoryPalette {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            indices: BTreeMap::new(),
        }
    }

    /// Reads the `category_index_map` of a document
    pub fn from_value(size: usize, value: &Value) -> Result<Self, ValidationError> {
        let mut palette = Self::new(size);
        let malformed = |reason: String| ValidationError::MalformedDocument(format!("category_index_map: {}", reason));
        let items = value
            .as_mapping()
            .ok_or_else(|| malformed(format!("expected a dict, got {}", value.type_name())))?;

        for (key, index) in items {
            let (pack, category) = match key.as_sequence() {
                Some([Value::Str(pack), Value::Str(category)]) => (pack.clone(), category.clone()),
                _ => return Err(malformed(format!("key {} is not a (pack, category) pair", key.repr()))),
            };
            let index = match index {
                Value::Int(i) if *i >= 0 && (*i as usize) < palette.size => *i as usize,
                other => {
                    return Err(malformed(format!(
                        "index {} of {} is outside [0, {})",
                        other.repr(),
                        key.repr(),
                        palette.size
                    )))
                }
            };
            palette.indices.insert((pack, category), index);
        }
        Ok(palette)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, pack: &str, category: &str) -> Option<usize> {
        self.indices
            .get(&(pack.to_string(), category.to_string()))
            .copied()
    }

    /// Index of a category, assigning one on first use: the smallest unused
    /// index, or wrapping around once every index is taken
    pub fn index_of(&mut self, pack: &str, category: &str) -> usize {
        if let Some(index) = self.get(pack, category) {
            return index;
        }
        let used: BTreeSet<usize> = self.indices.values().copied().collect();
        let index = (0..self.size)
            .find(|index| !used.contains(index))
            .unwrap_or(self.indices.len() % self.size);
        self.indices.insert((pack.to_string(), category.to_string()), index);
        index
    }

    /// Renames the pack part of every key
    pub fn rename_pack(&mut self, old: &str, new: &str) {
        self.indices = std::mem::take(&mut self.indices)
            .into_iter()
            .map(|((pack, category), index)| {
                let pack = if pack == old { new.to_string() } else { pack };
                ((pack, category), index)
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Document form: `{(pack, category): index}`
    pub fn to_value(&self) -> Value {
        Value::Dict(
            self.indices
                .iter()
                .map(|((pack, category), index)| {
                    (
                        Value::Tuple(vec![Value::str(pack.as_str()), Value::str(category.as_str())]),
                        Value::Int(*index as i64),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::parse_literal;

    #[test]
    fn test_next_free_index_wraps() {
        let mut palette = CategoryPalette::new(2);
        assert_eq!(palette.index_of("p", "a"), 0);
        assert_eq!(palette.index_of("p", "b"), 1);
        assert_eq!(palette.index_of("p", "a"), 0);
        assert_eq!(palette.index_of("p", "c"), 0);
        assert_eq!(palette.len(), 3);
    }

    #[test]
    fn test_document_indices_are_kept() {
        let value = parse_literal("{('p', 'a'): 3, ('q', 'b'): 0}").unwrap();
        let mut palette = CategoryPalette::from_value(4, &value).unwrap();
        assert_eq!(palette.get("p", "a"), Some(3));
        assert_eq!(palette.index_of("r", "c"), 1);
        palette.rename_pack("p", "renamed");
        assert_eq!(palette.get("renamed", "a"), Some(3));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let value = parse_literal("{('p', 'a'): 4}").unwrap();
        assert!(matches!(
            CategoryPalette::from_value(4, &value),
            Err(ValidationError::MalformedDocument(_))
        ));
        let value = parse_literal("{'p': 0}").unwrap();
        assert!(CategoryPalette::from_value(4, &value).is_err());
    }
}
