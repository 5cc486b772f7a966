use std::fmt;

use string_cache::DefaultAtom as Atom;

use crate::trial::ValueSource;

/// Identifier of a stimulus element within a trial ("mask1", "prime", "target").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(Atom);

impl ElementId {
    pub fn new(name: &str) -> Self {
        Self(Atom::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a key or button a participant can press.
///
/// Single characters are case-folded to upper case, so `"f"` and `"F"` name
/// the same key. A lone space is spelled `SPACE`; named keys (`ENTER`,
/// `SPACE`) are upper-cased as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId(Atom);

impl KeyId {
    pub fn new(name: &str) -> Self {
        let normalized = match name {
            " " => "SPACE".to_owned(),
            other => other.trim().to_uppercase(),
        };
        Self(Atom::from(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<char> for KeyId {
    fn from(c: char) -> Self {
        let mut buf = [0u8; 4];
        Self::new(c.encode_utf8(&mut buf))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The keys an input step accepts, in declaration order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet(Vec<KeyId>);

impl KeySet {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyId>,
    {
        let mut set = Self::default();
        for key in keys {
            set.insert(key.into());
        }
        set
    }

    /// Every character of `chars` becomes one key, so `"FJ"` yields `{F, J}`.
    pub fn from_chars(chars: &str) -> Self {
        Self::new(chars.chars())
    }

    pub fn insert(&mut self, key: KeyId) {
        if !self.0.contains(&key) {
            self.0.push(key);
        }
    }

    pub fn contains(&self, key: &KeyId) -> bool {
        self.0.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyId> {
        self.0.iter()
    }
}

impl fmt::Display for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Text,
    /// Non-word placeholder separating successive stimuli.
    Mask,
    Button,
}

/// A displayable unit with a show/hide lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub content: ValueSource,
}

impl Element {
    pub fn text(id: &str, content: impl Into<ValueSource>) -> Self {
        Self {
            id: ElementId::new(id),
            kind: ElementKind::Text,
            content: content.into(),
        }
    }

    pub fn mask(id: &str, pattern: &str) -> Self {
        Self {
            id: ElementId::new(id),
            kind: ElementKind::Mask,
            content: ValueSource::literal(pattern),
        }
    }

    pub fn button(id: &str, label: &str) -> Self {
        Self {
            id: ElementId::new(id),
            kind: ElementKind::Button,
            content: ValueSource::literal(label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ids_fold_case_and_name_space() {
        assert_eq!(KeyId::new("f"), KeyId::new("F"));
        assert_eq!(KeyId::new(" ").as_str(), "SPACE");
        assert_eq!(KeyId::new("enter").as_str(), "ENTER");
        assert_eq!(KeyId::from('j'), KeyId::new("J"));
    }

    #[test]
    fn key_set_from_chars_dedups() {
        let keys = KeySet::from_chars("FJf");
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&KeyId::new("j")));
        assert!(!keys.contains(&KeyId::new("K")));
        assert_eq!(keys.to_string(), "{F, J}");
    }
}
