use std::fmt;

use super::StoreError;

/// Characters the hosted store refuses inside a key.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// A `/`-separated address into the document tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath(Vec<String>);

impl DocPath {
    /// The tree root.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a path; empty segments from leading, trailing or doubled `/`
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] if a segment contains one of
    /// `. # $ [ ]` or a control character.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            validate_segment(raw, segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    /// Append one key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] for an empty or forbidden key.
    pub fn child(&self, key: &str) -> Result<Self, StoreError> {
        if key.is_empty() || key.contains('/') {
            return Err(StoreError::InvalidPath {
                path: format!("{self}/{key}"),
                reason: "key must be a single non-empty segment",
            });
        }
        validate_segment(key, key)?;
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Ok(Self(segments))
    }

    /// Append a relative path.
    #[must_use]
    pub fn join(&self, relative: &Self) -> Self {
        let mut segments = self.0.clone();
        segments.extend(relative.0.iter().cloned());
        Self(segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` when `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Path made of the first `depth` segments.
    #[must_use]
    pub fn prefix(&self, depth: usize) -> Self {
        Self(self.0.iter().take(depth).cloned().collect())
    }

    /// Segments after the first `depth`.
    #[must_use]
    pub fn suffix(&self, depth: usize) -> Self {
        Self(self.0.iter().skip(depth).cloned().collect())
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.0.split_last()?;
        Some(Self(head.to_vec()))
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

fn validate_segment(raw: &str, segment: &str) -> Result<(), StoreError> {
    if segment.contains(FORBIDDEN) || segment.chars().any(char::is_control) {
        return Err(StoreError::InvalidPath {
            path: raw.to_string(),
            reason: "segments may not contain . # $ [ ] or control characters",
        });
    }
    Ok(())
}
