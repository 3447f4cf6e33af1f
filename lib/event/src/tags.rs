use std::collections::BTreeSet;
use std::collections::btree_set::Iter;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ByteSizeOf;

/// Tags attached to metrics and service checks.
///
/// A tag is a free-form string, conventionally `key:value` but bare values
/// like `foo` are allowed too. Tags are kept ordered and deduplicated, so two
/// sets built in a different order compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeSet<String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw tag, returns false if it was already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    /// Insert a `key:value` tag.
    pub fn insert_pair(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> bool {
        self.0
            .insert(format!("{}:{}", key.as_ref(), value.as_ref()))
    }

    /// Returns a copy of these tags with an extra `key:value` tag.
    pub fn with_pair(&self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let mut tags = self.clone();
        tags.insert_pair(key, value);
        tags
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Returns the value of the first tag named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find_map(|tag| {
            tag.split_once(':')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String> {
        self.0.iter()
    }
}

impl ByteSizeOf for Tags {
    fn allocated_bytes(&self) -> usize {
        self.0.iter().fold(0, |acc, tag| acc + tag.size_of())
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for Tags {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().map(Into::into))
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a String;
    type IntoIter = Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(tag)?;
        }

        Ok(())
    }
}
