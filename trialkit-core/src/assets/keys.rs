//! Typed asset keys.
//!
//! Media assets are looked up by a camel-cased key derived from the file
//! reference found in the item bank. The key for every referencing field is
//! computed once when an item is loaded and stored in [`AssetRefs`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Camel-cased lookup key of a media asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    /// Derive the key for a raw file reference (`"vocab-item_01"` -> `"vocabItem01"`).
    pub fn from_reference(raw: &str) -> Self {
        Self(camelize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join dash, underscore and whitespace separated words into camelCase.
pub fn camelize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let words = raw
        .trim()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty());

    for (idx, word) in words.enumerate() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if idx == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }

    out
}

/// Item fields that may reference media assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Item,
    Image,
    AudioFile,
    Answer,
    Distractors,
}

/// Kind of media an asset key resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Audio,
}

/// Asset keys referenced by one item, per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetRefs {
    by_field: BTreeMap<ItemField, Vec<AssetKey>>,
}

impl AssetRefs {
    /// Record the references found in a field. Empty references are ignored.
    pub fn insert<'a>(&mut self, field: ItemField, refs: impl IntoIterator<Item = &'a str>) {
        let keys: Vec<AssetKey> = refs
            .into_iter()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(AssetKey::from_reference)
            .collect();
        if !keys.is_empty() {
            self.by_field.entry(field).or_default().extend(keys);
        }
    }

    /// Keys referenced by a single field.
    pub fn field(&self, field: ItemField) -> &[AssetKey] {
        self.by_field.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys referenced by any of the given fields, in field order.
    pub fn collect(&self, fields: &[ItemField]) -> impl Iterator<Item = &AssetKey> {
        fields.iter().flat_map(|f| self.field(*f).iter())
    }

    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("test-dimensions"), "testDimensions");
        assert_eq!(camelize("vocab_item_01"), "vocabItem01");
        assert_eq!(camelize("Red Circle"), "redCircle");
        assert_eq!(camelize("already"), "already");
        assert_eq!(camelize("  -leading-dash"), "leadingDash");
        assert_eq!(camelize(""), "");
    }

    #[test]
    fn test_asset_refs_skip_empty_references() {
        let mut refs = AssetRefs::default();
        refs.insert(ItemField::Distractors, ["red-circle", "", " blue-square "]);
        refs.insert(ItemField::Image, [""]);

        assert_eq!(
            refs.field(ItemField::Distractors),
            &[
                AssetKey::from_reference("redCircle"),
                AssetKey::from_reference("blueSquare")
            ]
        );
        assert!(refs.field(ItemField::Image).is_empty());
    }

    #[test]
    fn test_collect_follows_field_order() {
        let mut refs = AssetRefs::default();
        refs.insert(ItemField::Image, ["cat"]);
        refs.insert(ItemField::AudioFile, ["cat-prompt"]);

        let keys: Vec<&str> = refs
            .collect(&[ItemField::AudioFile, ItemField::Image])
            .map(AssetKey::as_str)
            .collect();
        assert_eq!(keys, vec!["catPrompt", "cat"]);
    }
}
